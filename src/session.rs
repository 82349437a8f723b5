//! Session loop.
//!
//! A `Session` owns everything one run needs: the frame source, the detector,
//! the sampler and alert policy state, and the sink. Nothing is shared between
//! sessions except the announcer, which is only ever handed text.
//!
//! The loop is synchronous. The announcer is the only asynchronous boundary.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::alert::{AlertMode, AlertPolicy};
use crate::announce::Announcer;
use crate::detect::{Detection, DetectorBackend};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::render::{draw_detections, FrameSink, NullSink};
use crate::sampler::{FrameSampler, DEFAULT_FRAME_INTERVAL};
use crate::signs::SignClass;

/// What a session reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionKind {
    /// Live camera, runs until stopped.
    Live,
    /// Uploaded file, runs to end of stream.
    Upload,
}

/// What to do when the detector returns an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorErrorPolicy {
    /// End the session and return the error.
    #[default]
    Abort,
    /// Log it and move on to the next frame.
    Skip,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionSettings {
    pub frame_interval: u32,
    pub mode: AlertMode,
    pub on_detector_error: DetectorErrorPolicy,
}

impl SessionSettings {
    /// Defaults per kind: live sessions announce everything, uploads are throttled.
    pub fn for_kind(kind: SessionKind) -> Self {
        let mode = match kind {
            SessionKind::Live => AlertMode::Unthrottled,
            SessionKind::Upload => AlertMode::throttled(),
        };
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            mode,
            on_detector_error: DetectorErrorPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    EndOfStream,
    Stopped,
    /// A live source stopped delivering frames.
    SourceFailed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub frames_read: u64,
    pub frames_sampled: u64,
    pub detections: u64,
    pub detector_failures: u64,
    /// Signs handed to the announcer, in order.
    pub alerts: Vec<SignClass>,
    pub last_spoken: Option<SignClass>,
    pub end: SessionEnd,
    /// `FrameSource::is_healthy` when the loop finished.
    pub source_healthy: bool,
}

pub struct Session<'a> {
    kind: SessionKind,
    source: Box<dyn FrameSource + 'a>,
    detector: Box<dyn DetectorBackend + 'a>,
    announcer: &'a dyn Announcer,
    sink: Box<dyn FrameSink + 'a>,
    sampler: FrameSampler,
    policy: AlertPolicy,
    on_detector_error: DetectorErrorPolicy,
}

impl<'a> Session<'a> {
    pub fn new(
        kind: SessionKind,
        settings: SessionSettings,
        source: Box<dyn FrameSource + 'a>,
        detector: Box<dyn DetectorBackend + 'a>,
        announcer: &'a dyn Announcer,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            source,
            detector,
            announcer,
            sink: Box::new(NullSink),
            sampler: FrameSampler::new(settings.frame_interval)?,
            policy: AlertPolicy::new(settings.mode),
            on_detector_error: settings.on_detector_error,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink + 'a>) -> Self {
        self.sink = sink;
        self
    }

    /// Run until end of stream, a stop request, or a source failure.
    ///
    /// Returns `Err` when the source cannot be opened, or when the detector
    /// fails under [`DetectorErrorPolicy::Abort`]. The source is released when
    /// this returns, whatever the outcome.
    pub fn run(mut self, stop: &AtomicBool) -> Result<SessionSummary> {
        let description = self.source.describe();
        self.source
            .connect()
            .with_context(|| format!("source unavailable: {}", description))?;
        self.detector
            .warm_up()
            .with_context(|| format!("detector {} failed to warm up", self.detector.name()))?;
        log::info!(
            "{:?} session started on {} (detector={}, every {} frames, {:?})",
            self.kind,
            description,
            self.detector.name(),
            self.sampler.interval(),
            self.policy.mode()
        );

        let mut frames_read = 0u64;
        let mut frames_sampled = 0u64;
        let mut detection_count = 0u64;
        let mut detector_failures = 0u64;
        let mut alerts = Vec::new();

        let end = loop {
            if stop.load(Ordering::SeqCst) {
                break SessionEnd::Stopped;
            }

            let mut frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break SessionEnd::EndOfStream,
                Err(e) => match self.kind {
                    SessionKind::Live => {
                        log::error!("failed to capture video from {}: {:#}", description, e);
                        break SessionEnd::SourceFailed(format!("{:#}", e));
                    }
                    SessionKind::Upload => {
                        log::warn!("read from {} failed, treating as end: {:#}", description, e);
                        break SessionEnd::EndOfStream;
                    }
                },
            };
            frames_read += 1;

            if !self.sampler.advance() {
                self.show(&frame, &[]);
                continue;
            }
            frames_sampled += 1;

            let detections = match self.detector.detect(frame.view()) {
                Ok(detections) => detections,
                Err(e) => match self.on_detector_error {
                    DetectorErrorPolicy::Abort => {
                        return Err(e.context(format!("detector failed on frame {}", frame.index)));
                    }
                    DetectorErrorPolicy::Skip => {
                        detector_failures += 1;
                        log::warn!("detector failed on frame {}: {:#}", frame.index, e);
                        self.show(&frame, &[]);
                        continue;
                    }
                },
            };
            detection_count += detections.len() as u64;
            log::debug!("frame {}: {} detection(s)", frame.index, detections.len());

            for sign in self.policy.evaluate(&detections) {
                log::info!("alert: {} (frame {})", sign, frame.index);
                self.announcer.announce(sign.label());
                alerts.push(sign);
            }

            draw_detections(&mut frame, &detections);
            self.show(&frame, &detections);
        };

        let stats = self.source.stats();
        let source_healthy = self.source.is_healthy();
        log::info!(
            "{:?} session ended ({:?}): {} frames read, {} sampled, {} alert(s)",
            self.kind,
            end,
            stats.frames_captured,
            frames_sampled,
            alerts.len()
        );
        if !source_healthy {
            log::warn!("source {} is unhealthy after session", stats.location);
        }

        Ok(SessionSummary {
            frames_read,
            frames_sampled,
            detections: detection_count,
            detector_failures,
            alerts,
            last_spoken: self.policy.state().last_spoken(),
            end,
            source_healthy,
        })
    }

    fn show(&mut self, frame: &Frame, detections: &[Detection]) {
        if let Err(e) = self.sink.show(frame, detections) {
            log::warn!("frame {} not shown: {:#}", frame.index, e);
        }
    }
}
