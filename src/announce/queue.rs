use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};

use super::engine::SpeechEngine;
use super::Announcer;

/// Worker pool sizing.
///
/// One worker plays announcements strictly in submission order. More workers
/// let playback overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnouncerSettings {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for AnnouncerSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_capacity: 8,
        }
    }
}

/// Counters reported when the announcer shuts down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnnouncerStats {
    /// Every `announce` call, including the ones later counted as dropped.
    pub submitted: u64,
    pub spoken: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    spoken: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> AnnouncerStats {
        AnnouncerStats {
            submitted: self.submitted.load(Ordering::SeqCst),
            spoken: self.spoken.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}

/// Announcer backed by a bounded queue and a fixed set of worker threads.
///
/// `announce` never blocks: when the queue is full the announcement is dropped
/// and counted. Dropping the announcer closes the queue and waits for the
/// workers to finish what is already queued.
pub struct QueuedAnnouncer {
    tx: Option<SyncSender<String>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    engine_name: &'static str,
}

impl QueuedAnnouncer {
    pub fn spawn(engine: Arc<dyn SpeechEngine>, settings: AnnouncerSettings) -> Result<Self> {
        if settings.workers == 0 {
            return Err(anyhow!("announcer needs at least one worker"));
        }
        if settings.queue_capacity == 0 {
            return Err(anyhow!("announcer queue capacity must be >= 1"));
        }

        let (tx, rx) = mpsc::sync_channel::<String>(settings.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());
        let engine_name = engine.name();

        let mut workers = Vec::with_capacity(settings.workers);
        for id in 0..settings.workers {
            let rx = rx.clone();
            let engine = engine.clone();
            let counters = counters.clone();
            let handle = std::thread::Builder::new()
                .name(format!("announcer-{}", id))
                .spawn(move || run_worker(id, rx, engine, counters))?;
            workers.push(handle);
        }

        log::debug!(
            "announcer started: engine={} workers={} capacity={}",
            engine_name,
            settings.workers,
            settings.queue_capacity
        );
        Ok(Self {
            tx: Some(tx),
            workers,
            counters,
            engine_name,
        })
    }

    /// Counters so far. Announcements still queued are not yet spoken.
    pub fn stats(&self) -> AnnouncerStats {
        self.counters.snapshot()
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine_name
    }

    /// Close the queue, let workers drain it, and report final counters.
    pub fn shutdown(mut self) -> AnnouncerStats {
        self.close();
        self.counters.snapshot()
    }

    fn close(&mut self) {
        self.tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("announcer worker panicked");
            }
        }
    }
}

impl Announcer for QueuedAnnouncer {
    fn announce(&self, text: &str) {
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        let Some(tx) = &self.tx else {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            return;
        };
        match tx.try_send(text.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(text)) => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                log::warn!("announcer queue full, dropping '{}'", text);
            }
            Err(TrySendError::Disconnected(text)) => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                log::warn!("announcer workers gone, dropping '{}'", text);
            }
        }
    }
}

impl Drop for QueuedAnnouncer {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(
    id: usize,
    rx: Arc<Mutex<Receiver<String>>>,
    engine: Arc<dyn SpeechEngine>,
    counters: Arc<Counters>,
) {
    loop {
        let next = match rx.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => {
                log::error!("announcer-{}: queue lock poisoned", id);
                break;
            }
        };
        let Ok(text) = next else {
            break;
        };
        match engine.speak(&text) {
            Ok(()) => {
                counters.spoken.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                log::warn!("announcer-{}: speech failed for '{}': {}", id, text, e);
            }
        }
    }
}
