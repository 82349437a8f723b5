use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::FrameView;
use crate::signs::SignClass;

/// Backend that replays a fixed script of detections, one entry per call.
///
/// Used by tests and the synthetic demo. Once the script runs out every call
/// returns no detections, unless the backend was built with `looping()`.
pub struct ScriptedBackend {
    script: VecDeque<Vec<Detection>>,
    looping: bool,
    calls: u64,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: script.into(),
            looping: false,
            calls: 0,
        }
    }

    /// Restart the script from the top once it is exhausted.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// A short drive past a few signs: a stop sign seen over several
    /// frames, an empty stretch, a low-confidence give-way, then a school zone.
    pub fn demo() -> Self {
        let bbox = BoundingBox {
            x1: 40.0,
            y1: 30.0,
            x2: 120.0,
            y2: 110.0,
        };
        let det = |sign, confidence| Detection {
            sign,
            confidence,
            bbox,
        };
        Self::new(vec![
            vec![det(SignClass::Stop, 0.91)],
            vec![det(SignClass::Stop, 0.88)],
            vec![],
            vec![det(SignClass::GiveWay, 0.64)],
            vec![
                det(SignClass::SchoolAhead, 0.86),
                det(SignClass::PedestrianCrossing, 0.83),
            ],
            vec![],
        ])
        .looping()
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: FrameView<'_>) -> Result<Vec<Detection>> {
        self.calls += 1;
        let Some(next) = self.script.pop_front() else {
            return Ok(Vec::new());
        };
        if self.looping {
            self.script.push_back(next.clone());
        }
        Ok(next)
    }
}
