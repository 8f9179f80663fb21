mod collector;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use anyhow::{bail, Context, Result};
use crate::common::{BvrFrame, SourceDescriptor};
use crate::data::{PipelineConfig, Stage, TimeCalc};
use crate::detection_runners::InferenceBackend;
use crate::output::{Annotator, DisplaySink, GridLayout, OutputRouter, PersistenceSink, SinkStats, ThreadedSink};
use crate::streams::{
    CaptureOpener, CaptureSummary, CaptureWorker, Mailbox, ShutdownCoordinator, ShutdownReason, ShutdownSignal,
};

pub use collector::{BatchCollector, BatchSlot, TickOutcome};

/// External collaborators a run is built from.
pub struct PipelineParts {
    pub opener: Arc<dyn CaptureOpener>,
    pub backend: Box<dyn InferenceBackend>,
    pub persistence: Box<dyn PersistenceSink>,
    pub display: Box<dyn DisplaySink>,
}

/// Counters and timings of a finished run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub reason: Option<ShutdownReason>,
    pub ticks: u64,
    pub batches: u64,
    pub frames_per_source: Vec<u64>,
    pub detections_per_source: Vec<u64>,
    pub captures: Vec<CaptureSummary>,
    pub sink: SinkStats,
    pub stage_timings: Vec<(Stage, Duration)>,
    pub elapsed: Duration,
}

impl PipelineReport {
    fn new(sources: usize) -> Self {
        Self {
            frames_per_source: vec![0; sources],
            detections_per_source: vec![0; sources],
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: &TickOutcome) {
        self.batches += outcome.batches;
        for routed in &outcome.routed {
            let id = routed.frame.source_id;
            self.frames_per_source[id] += 1;
            self.detections_per_source[id] += routed.detections.len() as u64;
        }
    }
}

/// A running pipeline.
pub struct PipelineHandle {
    shutdown: ShutdownSignal,
    mailboxes: Vec<Arc<Mailbox<BvrFrame>>>,
    thread: Option<JoinHandle<Result<PipelineReport>>>,
}

impl PipelineHandle {
    /// Signals shutdown and wakes the pipeline if it is waiting on a mailbox. Does not wait.
    pub fn request_stop(&self) {
        self.shutdown.trigger(ShutdownReason::StopRequested);
        for mailbox in &self.mailboxes {
            mailbox.abandon();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Waits until the run ends on its own (or after `request_stop`) and returns its report.
    pub fn wait(mut self) -> Result<PipelineReport> {
        match self.thread.take() {
            Some(thread) => match thread.join() {
                Ok(result) => result,
                Err(_) => bail!("Pipeline thread panicked"),
            },
            None => bail!("Pipeline was already joined"),
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.request_stop();
            let _ = thread.join();
        }
    }
}

/// Spawns one capture thread per source and the pipeline thread.
pub fn start(config: PipelineConfig, sources: Vec<SourceDescriptor>, parts: PipelineParts) -> Result<PipelineHandle> {
    config.validate()?;
    if sources.is_empty() {
        bail!("At least one video source is required");
    }

    let layout = GridLayout::new(sources.len(), config.canvas_width, config.canvas_height);
    log::info!(
        "Starting pipeline: {} sources, batch {}, grid {}x{} cells of {}x{}",
        sources.len(), config.batch_size, layout.grid, layout.grid, layout.cell_width, layout.cell_height
    );
    let sink = ThreadedSink::spawn(parts.persistence, config.sink_queue_depth)?;
    let router = OutputRouter::new(layout, Annotator::new(config.label_font_path.as_deref()), sink, parts.display);

    let shutdown = ShutdownSignal::new();
    let mut coordinator = ShutdownCoordinator::new(shutdown.clone());
    let mut mailboxes = Vec::with_capacity(sources.len());
    for (source_id, source) in sources.into_iter().enumerate() {
        let mailbox = Arc::new(Mailbox::new(source.mode));
        let worker = CaptureWorker::new(source_id, source, parts.opener.clone(), mailbox.clone(), shutdown.clone());
        match worker.spawn() {
            Ok(handle) => coordinator.register(source_id, mailbox.clone(), handle),
            Err(err) => {
                coordinator.shutdown(ShutdownReason::Fatal);
                router.finish();
                return Err(err);
            }
        }
        mailboxes.push(mailbox);
    }

    let collector = BatchCollector::new(&config, mailboxes.clone(), parts.backend);
    let profile = config.profile;
    let thread = thread::Builder::new()
        .name("bvr-pipeline".to_string())
        .spawn(move || run(collector, router, coordinator, profile))
        .context("Failed to spawn pipeline thread")?;

    Ok(PipelineHandle {
        shutdown,
        mailboxes,
        thread: Some(thread),
    })
}

/// Requests shutdown and waits for the teardown to complete.
pub fn stop(handle: PipelineHandle) -> Result<PipelineReport> {
    handle.request_stop();
    handle.wait()
}

fn run(
    mut collector: BatchCollector,
    mut router: OutputRouter,
    coordinator: ShutdownCoordinator,
    profile: bool,
) -> Result<PipelineReport> {
    let started = Instant::now();
    let shutdown = coordinator.signal().clone();
    let mut report = PipelineReport::new(router.layout().slots);
    let mut timings = TimeCalc::default();

    let outcome: Result<()> = loop {
        if shutdown.is_triggered() {
            break Ok(());
        }
        if collector.is_exhausted() {
            shutdown.trigger(ShutdownReason::AllSourcesFinished);
            break Ok(());
        }

        let tick = match collector.tick(&shutdown, &mut timings) {
            Ok(Some(tick)) => tick,
            Ok(None) => break Ok(()),
            Err(err) => {
                log::error!("Pipeline failed: {:#}", err);
                shutdown.trigger(ShutdownReason::Fatal);
                break Err(err);
            }
        };

        for source_id in &tick.finished {
            router.source_finished(*source_id);
        }
        report.record(&tick);
        if tick.routed.is_empty() {
            continue;
        }

        let t = Instant::now();
        let keep_going = router.route(tick.routed);
        timings.add(Stage::Render, t.elapsed());
        report.ticks += 1;

        if !keep_going {
            log::info!("Display requested stop");
            shutdown.trigger(ShutdownReason::StopRequested);
            break Ok(());
        }
    };

    let reason = shutdown.reason().unwrap_or(ShutdownReason::StopRequested);
    report.captures = coordinator.shutdown(reason);
    report.sink = router.finish();
    report.reason = shutdown.reason();
    report.stage_timings = timings.summary();
    report.elapsed = started.elapsed();

    if profile {
        log::info!("[Profile] {} ticks | {}", report.ticks, timings);
    }
    log::info!(
        "Pipeline stopped ({}) after {} ticks, {} frames written, {} dropped",
        reason, report.ticks, report.sink.written, report.sink.dropped
    );

    outcome.map(|_| report)
}
