use std::sync::Arc;
use std::thread::{self, JoinHandle};
use anyhow::{Context, Result};
use image::RgbImage;
use crate::common::{BvrFrame, SourceDescriptor};
use crate::streams::{Mailbox, ShutdownSignal};

/// An opened video source. Decoding lives behind this trait.
pub trait CaptureSource: Send {
    /// Next frame, `Ok(None)` at end of stream.
    fn pull_frame(&mut self) -> Result<Option<RgbImage>>;

    fn release(&mut self) {}
}

pub trait CaptureOpener: Send + Sync {
    fn open(&self, source: &SourceDescriptor) -> Result<Box<dyn CaptureSource>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureExit {
    EndOfStream,
    Shutdown,
    OpenFailed,
    ReadFailed,
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub source_id: usize,
    pub frames_pushed: u64,
    pub exit: CaptureExit,
}

impl CaptureSummary {
    pub fn new(source_id: usize, frames_pushed: u64, exit: CaptureExit) -> Self {
        Self {
            source_id,
            frames_pushed,
            exit,
        }
    }
}

/// Pulls frames from one source into its mailbox until the stream ends or shutdown is signalled.
pub struct CaptureWorker {
    source_id: usize,
    descriptor: SourceDescriptor,
    opener: Arc<dyn CaptureOpener>,
    mailbox: Arc<Mailbox<BvrFrame>>,
    shutdown: ShutdownSignal,
}

impl CaptureWorker {
    pub fn new(
        source_id: usize,
        descriptor: SourceDescriptor,
        opener: Arc<dyn CaptureOpener>,
        mailbox: Arc<Mailbox<BvrFrame>>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            source_id,
            descriptor,
            opener,
            mailbox,
            shutdown,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<CaptureSummary>> {
        let name = format!("bvr-capture-{}", self.source_id);
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run())
            .with_context(|| "Failed to spawn capture thread")
    }

    pub fn run(self) -> CaptureSummary {
        let mut capture = match self.opener.open(&self.descriptor) {
            Ok(capture) => capture,
            Err(err) => {
                log::error!("Source {} ({}): failed to open: {:#}", self.source_id, self.descriptor.uri, err);
                self.mailbox.send_end_of_stream();
                return CaptureSummary::new(self.source_id, 0, CaptureExit::OpenFailed);
            }
        };
        log::info!("Source {} ({}): opened, {:?} delivery", self.source_id, self.descriptor.uri, self.mailbox.mode());

        let mut frames_pushed = 0u64;
        let exit = loop {
            if self.shutdown.is_triggered() {
                break CaptureExit::Shutdown;
            }
            match capture.pull_frame() {
                Ok(Some(image)) => {
                    let frame = BvrFrame::new(image, self.source_id, frames_pushed);
                    // an empty frame terminates the stream
                    if frame.is_empty() {
                        log::info!("Source {} ({}): empty frame after {} frames, treating as end of stream",
                            self.source_id, self.descriptor.uri, frames_pushed);
                        break CaptureExit::EndOfStream;
                    }
                    if self.mailbox.send(frame).is_err() {
                        break CaptureExit::Shutdown;
                    }
                    frames_pushed += 1;
                }
                Ok(None) => break CaptureExit::EndOfStream,
                Err(err) => {
                    log::error!("Source {} ({}): read failed after {} frames: {:#}",
                        self.source_id, self.descriptor.uri, frames_pushed, err);
                    break CaptureExit::ReadFailed;
                }
            }
        };

        capture.release();
        if exit != CaptureExit::Shutdown {
            self.mailbox.send_end_of_stream();
        }
        log::info!("Source {}: capture finished ({:?}, {} frames)", self.source_id, exit, frames_pushed);
        CaptureSummary::new(self.source_id, frames_pushed, exit)
    }
}
