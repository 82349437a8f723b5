use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::FrameView;

/// Detector backend trait.
///
/// A backend turns one frame into an ordered list of detections. The order is
/// significant: the alert policy evaluates detections in exactly the order a
/// backend returns them. Backends carry no alert state across calls.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: FrameView<'_>) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: FrameView<'_>) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
