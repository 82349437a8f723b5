//! Speech announcements.
//!
//! The session loop hands sign labels to an [`Announcer`], which must return
//! immediately. [`QueuedAnnouncer`] does that by queueing text for a pool of
//! worker threads that drive a blocking [`SpeechEngine`].
//!
//! Engine failures never reach the session; they are logged and counted.

mod engine;
mod queue;

pub use engine::{CommandEngine, LogEngine, SpeechEngine, DEFAULT_SPEECH_RATE};
pub use queue::{AnnouncerSettings, AnnouncerStats, QueuedAnnouncer};

/// Fire-and-forget speech boundary.
pub trait Announcer {
    /// Queue `text` for playback without blocking the caller.
    fn announce(&self, text: &str);
}

impl<A: Announcer + ?Sized> Announcer for &A {
    fn announce(&self, text: &str) {
        (**self).announce(text)
    }
}

impl<A: Announcer + ?Sized> Announcer for Box<A> {
    fn announce(&self, text: &str) {
        (**self).announce(text)
    }
}
