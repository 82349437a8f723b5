//! Raster frames pulled from a video source.
//!
//! - `Frame`: RGB24 pixel buffer plus the sequence index assigned by its source.
//! - `FrameView`: read-only view handed to detector backends.

use anyhow::{anyhow, Result};

/// Bytes per pixel for the RGB24 layout every source produces.
pub const RGB_CHANNELS: usize = 3;

/// One decoded frame. Indices are 0-based and increase by one per read.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub index: u64,
}

impl Frame {
    /// Wrap an RGB24 buffer. The buffer length must match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame {}: expected {} RGB bytes for {}x{}, received {}",
                index,
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            index,
        })
    }

    /// Solid-colour frame, mostly useful for synthetic sources and tests.
    pub fn filled(width: u32, height: u32, index: u64, rgb: [u8; 3]) -> Result<Self> {
        let len = rgb_len(width, height)?;
        let data = rgb.iter().copied().cycle().take(len).collect();
        Self::new(data, width, height, index)
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView { frame: self }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel access for overlay rendering.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Read-only frame handed to detectors.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    frame: &'a Frame,
}

impl<'a> FrameView<'a> {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn index(&self) -> u64 {
        self.frame.index
    }

    pub fn pixels(&self) -> &'a [u8] {
        &self.frame.data
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
