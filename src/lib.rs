//! Vision Alert
//!
//! Road-sign detection with spoken alerts for a single local driver.
//!
//! # Architecture
//!
//! Frames flow from a source through a sampler to a detector. The alert
//! policy decides which detected signs are spoken, and the announcer speaks
//! them off the session thread:
//!
//! ```text
//! FrameSource -> FrameSampler -> DetectorBackend -> AlertPolicy -> Announcer
//!                                      \-> draw_detections -> FrameSink
//! ```
//!
//! # Module Structure
//!
//! - `signs`: Class table (`SignClass`, with an explicit `Unknown`)
//! - `frame`: RGB frames and read-only views handed to detectors
//! - `ingest`: Frame sources (camera, uploaded files, `stub://` feeds)
//! - `detect`: Detector boundary, backends and the backend registry
//! - `sampler`: Keeps one frame in N
//! - `alert`: Throttled and unthrottled alert policy
//! - `announce`: Speech engines and the queued announcer
//! - `render`: Box overlays and frame sinks
//! - `storage`: Flat library of saved videos
//! - `session`: The per-run loop tying it all together
//! - `config`: File and environment configuration

pub mod alert;
pub mod announce;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod render;
pub mod sampler;
pub mod session;
pub mod signs;
pub mod storage;

pub use alert::{AlertMode, AlertPolicy, AlertState, DEFAULT_ALERT_THRESHOLD};
pub use announce::{
    Announcer, AnnouncerSettings, AnnouncerStats, CommandEngine, LogEngine, QueuedAnnouncer,
    SpeechEngine,
};
pub use config::VisionAlertConfig;
pub use detect::{BackendRegistry, BoundingBox, Detection, DetectorBackend, ScriptedBackend};
pub use frame::{Frame, FrameView};
pub use ingest::{CameraConfig, CameraSource, FileConfig, FileSource, FrameSource};
pub use render::{draw_detections, FrameSink, NullSink};
pub use sampler::{FrameSampler, DEFAULT_FRAME_INTERVAL};
pub use session::{
    DetectorErrorPolicy, Session, SessionEnd, SessionKind, SessionSettings, SessionSummary,
};
pub use signs::SignClass;
pub use storage::VideoLibrary;
