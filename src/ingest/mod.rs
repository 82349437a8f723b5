//! Frame sources.
//!
//! - Uploaded video files (`FileSource`; FFmpeg decoding behind `ingest-file-ffmpeg`)
//! - Live cameras by device index (`CameraSource`; V4L2 behind `ingest-v4l2`)
//! - `stub://` synthetic variants of both, for tests and demos
//!
//! Every source numbers its frames from 0 and reports end of stream as
//! `Ok(None)`. An `Err` from `next_frame` is a read failure.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(any(feature = "ingest-v4l2", test))]
mod normalize;
mod synthetic;

pub use camera::{CameraConfig, CameraSource};
pub use file::{FileConfig, FileSource, UPLOAD_EXTENSIONS};

use anyhow::Result;

use crate::frame::Frame;

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub location: String,
}

/// A video source the session loop pulls frames from.
pub trait FrameSource {
    /// Human-readable location, used in logs.
    fn describe(&self) -> String;

    /// Open the underlying device or file. Failure means the source is unavailable.
    fn connect(&mut self) -> Result<()>;

    /// Read the next frame. `Ok(None)` is a clean end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}
