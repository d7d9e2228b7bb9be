//! Background population of the frame cache.
//!
//! An [`ImportJob`] drives the backend's `decode_many` for one section and
//! streams the decoded slots back over a channel. The reader is the only
//! consumer and the only writer of its cache: it drains the channel and adds
//! each slot itself, so the job never touches the cache directly.
//!
//! How the job is run is up to the caller, through [`Scheduler`].

use crate::backend::SharedBackend;
use crossbeam_channel::{Receiver, Sender};
use framewin_core::{FrameSlot, TimeSection, Timestamp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Handle for cancelling an in-flight import.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Import progress information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportProgress {
    /// Frames added to the cache so far.
    pub read: u64,
    /// Frames expected in the section.
    pub total: u64,
}

impl ImportProgress {
    /// Completion fraction (0.0 to 1.0).
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.read as f64 / self.total as f64).min(1.0)
    }
}

/// How an import ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The whole section was decoded.
    Completed,
    /// Cancelled or superseded before the section was exhausted.
    Cancelled,
    /// The backend reported a failure.
    Failed(String),
}

impl ImportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Message from an import job to its reader.
#[derive(Debug)]
pub enum ImportMessage {
    Frame(FrameSlot),
    Finished(ImportOutcome),
}

/// Where a backend's `decode_many` delivers frames.
pub struct ImportSink {
    tx: Sender<ImportMessage>,
    cancel: CancelToken,
    superseded: bool,
    pushed: u64,
}

impl ImportSink {
    /// Create a sink and the receiving end of its channel.
    pub fn channel(cancel: CancelToken) -> (Self, Receiver<ImportMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = Self {
            tx,
            cancel,
            superseded: false,
            pushed: 0,
        };
        (sink, rx)
    }

    /// True once the import should stop: cancelled, or its reader has moved
    /// on to another import.
    pub fn is_cancelled(&self) -> bool {
        self.superseded || self.cancel.is_cancelled()
    }

    /// Hand a decoded frame to the reader. Returns false if the import
    /// should stop; the frame is then discarded.
    pub fn push(&mut self, slot: FrameSlot) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if self.tx.send(ImportMessage::Frame(slot)).is_err() {
            self.superseded = true;
            return false;
        }
        self.pushed += 1;
        true
    }

    /// Frames delivered so far.
    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    fn finish(self, outcome: ImportOutcome) {
        // The reader may already be gone; nothing left to tell it then.
        let _ = self.tx.send(ImportMessage::Finished(outcome));
    }
}

/// A unit of work importing one section into a reader's cache.
pub struct ImportJob {
    backend: SharedBackend,
    section: TimeSection,
    prepend: bool,
    sink: ImportSink,
}

impl ImportJob {
    /// Create a job and the reader-side handle that receives its frames.
    pub(crate) fn new(
        backend: SharedBackend,
        section: TimeSection,
        prepend: bool,
        frame_interval: Timestamp,
    ) -> (Self, ImportHandle) {
        let cancel = CancelToken::new();
        let (sink, rx) = ImportSink::channel(cancel.clone());
        let total = expected_frames(section, frame_interval);
        let job = Self {
            backend,
            section,
            prepend,
            sink,
        };
        let handle = ImportHandle {
            rx,
            cancel,
            section,
            prepend,
            progress: ImportProgress { read: 0, total },
            evictions_at_start: 0,
        };
        (job, handle)
    }

    pub fn section(&self) -> TimeSection {
        self.section
    }

    pub fn prepend(&self) -> bool {
        self.prepend
    }

    /// Run the import to completion on the calling thread.
    pub fn run(self) {
        let Self {
            backend,
            section,
            prepend,
            mut sink,
        } = self;

        debug!("Caching section {}, prepend: {}", section, prepend);
        let result = backend.lock().decode_many(section, &mut sink);

        let outcome = match result {
            Ok(()) if sink.is_cancelled() => {
                debug!("Import of {} stopped after {} frames", section, sink.pushed());
                ImportOutcome::Cancelled
            }
            Ok(()) => ImportOutcome::Completed,
            Err(e) => {
                warn!("Import of {} failed: {}", section, e);
                ImportOutcome::Failed(e.to_string())
            }
        };
        sink.finish(outcome);
    }
}

/// Reader-side end of an in-flight import.
#[derive(Debug)]
pub(crate) struct ImportHandle {
    pub(crate) rx: Receiver<ImportMessage>,
    pub(crate) cancel: CancelToken,
    pub(crate) section: TimeSection,
    pub(crate) prepend: bool,
    pub(crate) progress: ImportProgress,
    /// Cache evictions counted when the import started.
    pub(crate) evictions_at_start: u64,
}

/// Frames expected when importing `section`, counting the frame that
/// straddles its end.
pub fn expected_frames(section: TimeSection, interval: Timestamp) -> u64 {
    if section.is_empty() {
        return 0;
    }
    let interval = interval.max(1);
    ((section.duration() + interval) / interval) as u64
}

/// Runs import jobs. Supplied by the caller of
/// [`crate::VideoReader::update_working_zone`].
pub trait Scheduler {
    fn schedule(&self, job: ImportJob);
}

impl<F> Scheduler for F
where
    F: Fn(ImportJob),
{
    fn schedule(&self, job: ImportJob) {
        self(job);
    }
}

/// Runs each job on its own named thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, job: ImportJob) {
        let spawned = std::thread::Builder::new()
            .name("cache-filling".into())
            .spawn(move || job.run());
        if let Err(e) = spawned {
            // The job was dropped with its sink; the reader sees the import fail.
            error!("Failed to spawn import thread: {}", e);
        }
    }
}

/// Runs each job to completion on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn schedule(&self, job: ImportJob) {
        job.run();
    }
}
