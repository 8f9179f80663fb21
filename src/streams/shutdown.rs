use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use parking_lot::Mutex;
use crate::common::BvrFrame;
use crate::streams::{CaptureExit, CaptureSummary, Mailbox};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    StopRequested,
    AllSourcesFinished,
    Fatal,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::StopRequested => f.write_str("stop requested"),
            ShutdownReason::AllSourcesFinished => f.write_str("all sources finished"),
            ShutdownReason::Fatal => f.write_str("fatal error"),
        }
    }
}

#[derive(Debug, Default)]
struct SignalInner {
    triggered: AtomicBool,
    reason: Mutex<Option<ShutdownReason>>,
}

/// Set-once cancellation token shared by the capture workers and the pipeline thread.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns `true` only for the call that actually set the signal.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let mut slot = self.inner.reason.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        self.inner.triggered.store(true, Ordering::Release);
        log::info!("Shutdown triggered: {}", reason);
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.inner.reason.lock()
    }
}

/// Owns the worker handles and mailboxes so teardown happens in one place and in order.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    signal: ShutdownSignal,
    mailboxes: Vec<Arc<Mailbox<BvrFrame>>>,
    workers: Vec<(usize, JoinHandle<CaptureSummary>)>,
}

impl ShutdownCoordinator {
    pub fn new(signal: ShutdownSignal) -> Self {
        Self {
            signal,
            mailboxes: vec![],
            workers: vec![],
        }
    }

    pub fn signal(&self) -> &ShutdownSignal {
        &self.signal
    }

    pub fn register(&mut self, source_id: usize, mailbox: Arc<Mailbox<BvrFrame>>, worker: JoinHandle<CaptureSummary>) {
        self.mailboxes.push(mailbox);
        self.workers.push((source_id, worker));
    }

    /// Sets the signal (no-op if already set), wakes every mailbox, joins the capture threads and
    /// discards whatever frames were still waiting. Summaries come back in source order.
    pub fn shutdown(self, reason: ShutdownReason) -> Vec<CaptureSummary> {
        if !self.signal.trigger(reason) {
            log::debug!("Shutdown already triggered ({:?}), running teardown", self.signal.reason());
        }

        for mailbox in &self.mailboxes {
            mailbox.abandon();
        }

        let mut summaries = Vec::with_capacity(self.workers.len());
        for (source_id, worker) in self.workers {
            match worker.join() {
                Ok(summary) => summaries.push(summary),
                Err(_) => {
                    log::error!("Capture worker for source {} panicked", source_id);
                    summaries.push(CaptureSummary::new(source_id, 0, CaptureExit::Panicked));
                }
            }
        }

        for (source_id, mailbox) in self.mailboxes.iter().enumerate() {
            if let Some(frame) = mailbox.drain() {
                log::debug!("Discarded frame {} left in mailbox {}", frame.frame_index, source_id);
            }
        }

        summaries
    }
}
