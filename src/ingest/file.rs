//! Uploaded video file source.
//!
//! `FileSource` reads frames from a local video file. Only local paths with an
//! accepted upload extension are opened; `stub://` paths produce a finite
//! synthetic clip.

use std::path::Path;

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::{SyntheticSource, STUB_SCHEME};
use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Extensions accepted for uploaded videos (compared case-insensitively).
pub const UPLOAD_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];

/// Length of a synthetic clip when the stub path does not say otherwise.
const DEFAULT_SYNTHETIC_FRAMES: u64 = 100;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "recorded_videos/drive.mp4").
    pub path: String,
    /// Frame size for synthetic clips. Decoded files keep their own size.
    pub width: u32,
    pub height: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            width: 640,
            height: 480,
        }
    }
}

impl FileConfig {
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!("file ingestion only supports local paths (no URL schemes)"));
        }
        if config.path.starts_with(STUB_SCHEME) {
            return Ok(Self {
                backend: FileBackend::Synthetic(SyntheticSource::new(
                    &config.path,
                    config.width,
                    config.height,
                    Some(DEFAULT_SYNTHETIC_FRAMES),
                )?),
            });
        }
        if !has_upload_extension(Path::new(&config.path)) {
            return Err(anyhow!(
                "unsupported video type '{}' (expected one of: {})",
                config.path,
                UPLOAD_EXTENSIONS.join(", ")
            ));
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!("file ingestion requires the ingest-file-ffmpeg feature"))
        }
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.stats().location)
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect("FileSource"),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

/// True when the path ends in one of [`UPLOAD_EXTENSIONS`].
pub fn has_upload_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            UPLOAD_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_and_empty_paths_are_rejected() {
        assert!(FileSource::new(FileConfig::for_path("https://example.com/a.mp4")).is_err());
        assert!(FileSource::new(FileConfig::for_path("  ")).is_err());
    }

    #[test]
    fn unsupported_extensions_are_rejected() {
        assert!(FileSource::new(FileConfig::for_path("drive.mkv")).is_err());
        assert!(FileSource::new(FileConfig::for_path("notes.txt")).is_err());
    }

    #[test]
    fn upload_extensions_ignore_case() {
        assert!(has_upload_extension(Path::new("a.mp4")));
        assert!(has_upload_extension(Path::new("b.AVI")));
        assert!(has_upload_extension(Path::new("c.Mov")));
        assert!(!has_upload_extension(Path::new("d")));
        assert!(!has_upload_extension(Path::new("e.webm")));
    }

    #[test]
    fn synthetic_clip_ends() -> Result<()> {
        let mut source = FileSource::new(FileConfig {
            path: "stub://clip?frames=2".to_string(),
            width: 8,
            height: 6,
        })?;
        source.connect()?;
        let frame = source.next_frame()?.expect("first frame");
        assert_eq!((frame.width, frame.height, frame.index), (8, 6, 0));
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn synthetic_clip_defaults_to_finite_length() -> Result<()> {
        let mut source = FileSource::new(FileConfig {
            path: "stub://clip".to_string(),
            width: 2,
            height: 2,
        })?;
        source.connect()?;
        let mut count = 0;
        while source.next_frame()?.is_some() {
            count += 1;
        }
        assert_eq!(count, DEFAULT_SYNTHETIC_FRAMES);
        Ok(())
    }
}
