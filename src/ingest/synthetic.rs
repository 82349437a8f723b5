//! Synthetic `stub://` sources for tests and demos.
//!
//! Options ride in the query string:
//! - `frames=N`: end of stream after N frames
//! - `fail_after=N`: the read after N frames fails
//! - `unavailable=1`: `connect` fails

use anyhow::{anyhow, bail, Result};

use super::SourceStats;
use crate::frame::Frame;

pub(crate) const STUB_SCHEME: &str = "stub://";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SyntheticOptions {
    pub frames: Option<u64>,
    pub fail_after: Option<u64>,
    pub unavailable: bool,
}

impl SyntheticOptions {
    pub(crate) fn parse(location: &str) -> Result<Self> {
        let rest = location
            .strip_prefix(STUB_SCHEME)
            .ok_or_else(|| anyhow!("'{}' is not a stub:// location", location))?;
        let mut options = Self::default();
        let Some((_, query)) = rest.split_once('?') else {
            return Ok(options);
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "frames" => options.frames = Some(parse_count(key, value)?),
                "fail_after" => options.fail_after = Some(parse_count(key, value)?),
                "unavailable" => options.unavailable = value != "0",
                other => bail!("unknown stub option '{}' in {}", other, location),
            }
        }
        Ok(options)
    }
}

fn parse_count(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| anyhow!("stub option {} must be an integer, got '{}'", key, value))
}

pub(crate) struct SyntheticSource {
    location: String,
    width: u32,
    height: u32,
    options: SyntheticOptions,
    frame_count: u64,
    scene_state: u8,
    connected: bool,
    failed: bool,
}

impl SyntheticSource {
    pub(crate) fn new(
        location: &str,
        width: u32,
        height: u32,
        default_frames: Option<u64>,
    ) -> Result<Self> {
        let mut options = SyntheticOptions::parse(location)?;
        if options.frames.is_none() {
            options.frames = default_frames;
        }
        Ok(Self {
            location: location.to_string(),
            width,
            height,
            options,
            frame_count: 0,
            scene_state: 0,
            connected: false,
            failed: false,
        })
    }

    pub(crate) fn connect(&mut self, kind: &str) -> Result<()> {
        if self.options.unavailable {
            bail!("{} {} is unavailable", kind, self.location);
        }
        self.connected = true;
        log::info!("{}: connected to {} (synthetic)", kind, self.location);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            bail!("{} not connected", self.location);
        }
        if self.options.fail_after == Some(self.frame_count) {
            self.failed = true;
            bail!("synthetic read failure on {}", self.location);
        }
        if self.options.frames.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        let index = self.frame_count;
        let pixels = self.generate_synthetic_pixels();
        self.frame_count += 1;
        Frame::new(pixels, self.width, self.height, index).map(Some)
    }

    /// Slowly shifting gradient; the scene changes every 50 frames.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.connected && !self.failed
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: self.location.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_options() {
        let opts = SyntheticOptions::parse("stub://cam?frames=12&fail_after=4").unwrap();
        assert_eq!(opts.frames, Some(12));
        assert_eq!(opts.fail_after, Some(4));
        assert!(!opts.unavailable);
        assert!(SyntheticOptions::parse("stub://cam?unavailable=1").unwrap().unavailable);
        assert_eq!(SyntheticOptions::parse("stub://cam").unwrap(), SyntheticOptions::default());
    }

    #[test]
    fn rejects_bad_options() {
        assert!(SyntheticOptions::parse("stub://cam?frames=lots").is_err());
        assert!(SyntheticOptions::parse("stub://cam?colour=red").is_err());
        assert!(SyntheticOptions::parse("/dev/video0").is_err());
    }

    #[test]
    fn frames_are_numbered_until_limit() -> Result<()> {
        let mut source = SyntheticSource::new("stub://clip?frames=3", 4, 2, None)?;
        source.connect("test")?;
        let indices: Vec<u64> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|f| f.index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(source.stats().frames_captured, 3);
        Ok(())
    }

    #[test]
    fn fail_after_breaks_the_read() -> Result<()> {
        let mut source = SyntheticSource::new("stub://clip?fail_after=1", 4, 2, None)?;
        source.connect("test")?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame().is_err());
        assert!(!source.is_healthy());
        Ok(())
    }
}
