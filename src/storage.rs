//! Flat on-disk library of uploaded videos.
//!
//! Uploads keep their original filename. Listing only reports the playable
//! extensions in [`SAVED_EXTENSIONS`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::ingest::file::has_upload_extension;

pub const DEFAULT_SAVE_DIR: &str = "recorded_videos";

/// Extensions reported by [`VideoLibrary::list_saved`].
pub const SAVED_EXTENSIONS: [&str; 2] = ["avi", "mp4"];

pub struct VideoLibrary {
    dir: PathBuf,
}

impl VideoLibrary {
    /// Open the library, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create video dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store uploaded bytes under `name`, replacing any file of the same name.
    pub fn store_upload(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        validate_video_name(name)?;
        if !has_upload_extension(Path::new(name)) {
            return Err(anyhow!("unsupported upload type: {}", name));
        }
        let path = self.dir.join(name);
        fs::write(&path, bytes)
            .with_context(|| format!("failed to write upload {}", path.display()))?;
        log::info!("stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Copy a local file into the library under its own filename.
    pub fn import_file(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("{} has no usable file name", source.display()))?;
        let bytes =
            fs::read(source).with_context(|| format!("failed to read {}", source.display()))?;
        self.store_upload(name, &bytes)
    }

    /// Saved video names, sorted.
    pub fn list_saved(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_saved_video(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolve a saved video by name.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_video_name(name)?;
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(anyhow!("no saved video named {}", name));
        }
        Ok(path)
    }
}

fn is_saved_video(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SAVED_EXTENSIONS.contains(&ext))
}

/// Names must be a single path component.
fn validate_video_name(name: &str) -> Result<()> {
    if name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(anyhow!("invalid video name '{}'", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_keep_their_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let library = VideoLibrary::open(dir.path().join("videos"))?;
        let path = library.store_upload("drive 01.mp4", b"not really a video")?;
        assert_eq!(path, dir.path().join("videos").join("drive 01.mp4"));
        assert_eq!(fs::read(&path)?, b"not really a video");
        assert_eq!(library.path_of("drive 01.mp4")?, path);
        Ok(())
    }

    #[test]
    fn unsafe_names_are_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let library = VideoLibrary::open(dir.path())?;
        for name in ["", "..", "../escape.mp4", "a/b.mp4", "a\\b.mp4"] {
            assert!(library.store_upload(name, b"x").is_err(), "{:?}", name);
        }
        assert!(library.store_upload("clip.mkv", b"x").is_err());
        assert!(library.path_of("missing.mp4").is_err());
        Ok(())
    }

    #[test]
    fn listing_filters_and_sorts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let library = VideoLibrary::open(dir.path())?;
        library.store_upload("b.mp4", b"x")?;
        library.store_upload("a.avi", b"x")?;
        library.store_upload("c.mov", b"x")?;
        fs::write(dir.path().join("notes.txt"), b"x")?;
        fs::create_dir(dir.path().join("nested.mp4"))?;
        assert_eq!(library.list_saved()?, vec!["a.avi", "b.mp4"]);
        Ok(())
    }

    #[test]
    fn import_copies_under_source_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("dashcam.avi");
        fs::write(&source, b"frames")?;
        let library = VideoLibrary::open(dir.path().join("lib"))?;
        let stored = library.import_file(&source)?;
        assert_eq!(stored.file_name().unwrap(), "dashcam.avi");
        assert_eq!(fs::read(stored)?, b"frames");
        Ok(())
    }
}
