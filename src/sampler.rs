//! Frame decimation ahead of the detector.

use anyhow::{anyhow, Result};

/// Keep one frame in `interval` when no override is configured.
pub const DEFAULT_FRAME_INTERVAL: u32 = 5;

/// Decides which frames are worth running detection on.
///
/// The counter starts at 0 and advances once per frame read, so positions
/// 0, N, 2N, ... are eligible. One sampler belongs to one session.
#[derive(Clone, Debug)]
pub struct FrameSampler {
    interval: u64,
    counter: u64,
}

impl FrameSampler {
    pub fn new(interval: u32) -> Result<Self> {
        if interval == 0 {
            return Err(anyhow!("frame interval must be >= 1"));
        }
        Ok(Self {
            interval: u64::from(interval),
            counter: 0,
        })
    }

    /// Record one frame read and report whether it is eligible for detection.
    pub fn advance(&mut self) -> bool {
        let eligible = self.counter % self.interval == 0;
        self.counter = self.counter.wrapping_add(1);
        eligible
    }

    /// Frames seen since construction or the last reset.
    pub fn frames_seen(&self) -> u64 {
        self.counter
    }

    pub fn interval(&self) -> u32 {
        self.interval as u32
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self {
            interval: u64::from(DEFAULT_FRAME_INTERVAL),
            counter: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eligible_positions(interval: u32, frames: u64) -> Vec<u64> {
        let mut sampler = FrameSampler::new(interval).unwrap();
        (0..frames).filter(|_| sampler.advance()).collect()
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(FrameSampler::new(0).is_err());
    }

    #[test]
    fn default_keeps_every_fifth_frame() {
        assert_eq!(eligible_positions(DEFAULT_FRAME_INTERVAL, 16), vec![0, 5, 10, 15]);
    }

    #[test]
    fn eligible_positions_are_multiples_of_interval() {
        for interval in 1..=9u32 {
            let positions = eligible_positions(interval, 100);
            let expected: Vec<u64> = (0..100).step_by(interval as usize).collect();
            assert_eq!(positions, expected, "interval {}", interval);
        }
    }

    #[test]
    fn interval_of_one_keeps_everything() {
        assert_eq!(eligible_positions(1, 4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn fresh_runs_are_identical() {
        assert_eq!(eligible_positions(3, 50), eligible_positions(3, 50));
    }

    #[test]
    fn reset_restarts_the_count() {
        let mut sampler = FrameSampler::new(3).unwrap();
        assert!(sampler.advance());
        assert!(!sampler.advance());
        assert_eq!(sampler.frames_seen(), 2);
        sampler.reset();
        assert!(sampler.advance());
    }
}
