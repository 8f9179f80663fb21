use std::sync::Arc;
use std::time::Instant;
use anyhow::{bail, Context, Result};
use crate::common::BvrFrame;
use crate::data::{PipelineConfig, Stage, TimeCalc};
use crate::detection_runners::{preprocess_batch, ChannelOrder, InferenceBackend, PostProcessor};
use crate::output::RoutedFrame;
use crate::streams::{Mailbox, ShutdownSignal};
use crate::utils;

/// One position of a batch: which source it belongs to and the frame it got this tick, if any.
#[derive(Debug, Default)]
pub struct BatchSlot {
    pub source_id: Option<usize>,
    pub frame: Option<BvrFrame>,
}

/// What a tick produced.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub routed: Vec<RoutedFrame>,
    /// Sources that reported end of stream during this tick.
    pub finished: Vec<usize>,
    pub batches: u64,
}

/// Pulls one frame per live source, runs inference chunk by chunk and post-processes each slot.
///
/// Slot `b` of chunk `k` is always source `k * batch_size + b`.
pub struct BatchCollector {
    mailboxes: Vec<Arc<Mailbox<BvrFrame>>>,
    live: Vec<bool>,
    batch_size: usize,
    model_width: u32,
    model_height: u32,
    fill: u8,
    channel_order: ChannelOrder,
    backend: Box<dyn InferenceBackend>,
    post: PostProcessor,
    profile: bool,
}

impl BatchCollector {
    pub fn new(config: &PipelineConfig, mailboxes: Vec<Arc<Mailbox<BvrFrame>>>, backend: Box<dyn InferenceBackend>) -> Self {
        if let Some((w, h)) = backend.input_size() {
            if (w, h) != (config.model_width, config.model_height) {
                log::warn!(
                    "Backend {} expects {}x{} input, pipeline is configured for {}x{}",
                    backend.name(), w, h, config.model_width, config.model_height
                );
            }
        }
        Self {
            live: vec![true; mailboxes.len()],
            mailboxes,
            batch_size: config.batch_size,
            model_width: config.model_width,
            model_height: config.model_height,
            fill: config.letterbox_fill,
            channel_order: config.channel_order,
            backend,
            post: PostProcessor::from_config(config),
            profile: config.profile,
        }
    }

    pub fn live_sources(&self) -> usize {
        self.live.iter().filter(|l| **l).count()
    }

    pub fn is_exhausted(&self) -> bool {
        self.live_sources() == 0
    }

    /// Runs one tick. `Ok(None)` means shutdown was observed before the tick completed.
    pub fn tick(&mut self, shutdown: &ShutdownSignal, timings: &mut TimeCalc) -> Result<Option<TickOutcome>> {
        let mut outcome = TickOutcome::default();
        let tick_start = Instant::now();

        for chunk_start in (0..self.mailboxes.len()).step_by(self.batch_size) {
            if shutdown.is_triggered() {
                return Ok(None);
            }

            let slots = self.collect_chunk(chunk_start, &mut outcome.finished);
            if shutdown.is_triggered() {
                return Ok(None);
            }
            if slots.iter().all(|s| s.frame.is_none()) {
                continue;
            }

            let t = Instant::now();
            let images: Vec<_> = slots.iter().map(|s| s.frame.as_ref().map(|f| &f.image)).collect();
            let (xs, infos) = preprocess_batch(&images, self.model_width, self.model_height, self.fill, self.channel_order)?;
            timings.add(Stage::Preprocess, utils::trace(self.profile, "TICK", "Preprocess", tick_start, t));

            let t = Instant::now();
            let raws = self
                .backend
                .infer(&xs)
                .with_context(|| format!("Inference failed on backend {}", self.backend.name()))?;
            if raws.len() != self.batch_size {
                bail!(
                    "Backend {} returned {} raw buffers for a batch of {}",
                    self.backend.name(), raws.len(), self.batch_size
                );
            }
            timings.add(Stage::Inference, utils::trace(self.profile, "TICK", "Inference", tick_start, t));
            outcome.batches += 1;

            let t = Instant::now();
            for ((slot, raw), info) in slots.into_iter().zip(raws.iter()).zip(infos.iter()) {
                let Some(frame) = slot.frame else {
                    continue;
                };
                let Some(info) = info else {
                    self.retire(frame.source_id, &mut outcome.finished);
                    continue;
                };
                let detections = self.post.process(raw, info, frame.source_id);
                outcome.routed.push(RoutedFrame { frame, detections });
            }
            timings.add(Stage::Postprocess, utils::trace(self.profile, "TICK", "Postprocess", tick_start, t));
        }

        Ok(Some(outcome))
    }

    fn collect_chunk(&mut self, chunk_start: usize, finished: &mut Vec<usize>) -> Vec<BatchSlot> {
        (0..self.batch_size)
            .map(|b| {
                let source_id = chunk_start + b;
                if source_id >= self.mailboxes.len() {
                    return BatchSlot::default();
                }
                let mut slot = BatchSlot {
                    source_id: Some(source_id),
                    frame: None,
                };
                if !self.live[source_id] {
                    return slot;
                }
                match self.mailboxes[source_id].receive() {
                    Some(frame) => slot.frame = Some(frame),
                    None => {
                        self.live[source_id] = false;
                        finished.push(source_id);
                        log::info!("Source {} finished, {} still live", source_id, self.live_sources());
                    }
                }
                slot
            })
            .collect()
    }

    /// Marks a source permanently inactive after a frame of its could not be used.
    fn retire(&mut self, source_id: usize, finished: &mut Vec<usize>) {
        if let Some(live) = self.live.get_mut(source_id) {
            if *live {
                *live = false;
                finished.push(source_id);
                log::warn!("Source {} dropped after an unusable frame, {} still live", source_id, self.live_sources());
            }
        }
    }
}
