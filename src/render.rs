//! Detection overlays and frame sinks.
//!
//! `draw_detections` paints box outlines straight into the RGB buffer. Labels
//! are not rasterized: snapshots show boxes only, and captions such as
//! `Stop 0.91` go to the log and the console progress line. A `FrameSink`
//! receives every frame of a session, annotated or not.

#[cfg(feature = "snapshots")]
use std::path::PathBuf;

use anyhow::Result;

use crate::detect::Detection;
use crate::frame::{Frame, RGB_CHANNELS};

/// Box outline colour (magenta).
pub const BOX_COLOUR: [u8; 3] = [255, 0, 255];
/// Box outline thickness in pixels.
pub const BOX_THICKNESS: u32 = 3;

/// Draw an outline for each detection. Boxes are clipped to the frame.
pub fn draw_detections(frame: &mut Frame, detections: &[Detection]) {
    for det in detections {
        draw_box(frame, det, BOX_COLOUR, BOX_THICKNESS);
    }
}

fn draw_box(frame: &mut Frame, det: &Detection, colour: [u8; 3], thickness: u32) {
    let (w, h) = (frame.width, frame.height);
    if w == 0 || h == 0 {
        return;
    }
    let clamp_x = |v: f32| (v.max(0.0) as u32).min(w - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(h - 1);
    let (x1, y1) = (clamp_x(det.bbox.x1), clamp_y(det.bbox.y1));
    let (x2, y2) = (clamp_x(det.bbox.x2), clamp_y(det.bbox.y2));

    let width = w as usize;
    let pixels = frame.pixels_mut();
    let mut put = |x: u32, y: u32| {
        let offset = (y as usize * width + x as usize) * RGB_CHANNELS;
        pixels[offset..offset + RGB_CHANNELS].copy_from_slice(&colour);
    };

    for t in 0..thickness {
        let top = y1.saturating_add(t).min(y2);
        let bottom = y2.saturating_sub(t).max(y1);
        for x in x1..=x2 {
            put(x, top);
            put(x, bottom);
        }
        let left = x1.saturating_add(t).min(x2);
        let right = x2.saturating_sub(t).max(x1);
        for y in y1..=y2 {
            put(left, y);
            put(right, y);
        }
    }
}

/// Destination for processed frames (a display, a recorder, nothing).
pub trait FrameSink {
    /// `detections` is empty for frames the sampler skipped.
    fn show(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()>;
}

/// Discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn show(&mut self, _frame: &Frame, _detections: &[Detection]) -> Result<()> {
        Ok(())
    }
}

/// Writes annotated frames that carry at least one detection as JPEG files.
#[cfg(feature = "snapshots")]
pub struct JpegSnapshotSink {
    dir: PathBuf,
    written: u64,
}

#[cfg(feature = "snapshots")]
impl JpegSnapshotSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        use anyhow::Context;

        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
        Ok(Self { dir, written: 0 })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn path_for(&self, frame: &Frame) -> PathBuf {
        self.dir.join(format!("frame_{:06}.jpg", frame.index))
    }
}

#[cfg(feature = "snapshots")]
impl FrameSink for JpegSnapshotSink {
    fn show(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()> {
        use anyhow::{anyhow, Context};

        if detections.is_empty() {
            return Ok(());
        }
        let image = image::RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame {} has an invalid RGB buffer", frame.index))?;
        let path = self.path_for(frame);
        image
            .save(&path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        self.written += 1;
        log::debug!(
            "snapshot {}: {}",
            path.display(),
            detections
                .iter()
                .map(Detection::caption)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }
}
