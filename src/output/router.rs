use image::{imageops, RgbImage};
use crate::common::{BvrDetection, BvrFrame};
use crate::detection_runners::resize_rgb;
use crate::output::{Annotator, DisplaySink, GridLayout, SinkStats, ThreadedSink, CANVAS_FILL};

/// One source's result for the current tick.
#[derive(Debug, Clone)]
pub struct RoutedFrame {
    pub frame: BvrFrame,
    pub detections: Vec<BvrDetection>,
}

/// Annotates, scales and composites each tick's frames, then hands them to the sinks.
pub struct OutputRouter {
    layout: GridLayout,
    annotator: Annotator,
    sink: ThreadedSink,
    display: Box<dyn DisplaySink>,
    closed: Vec<bool>,
}

impl OutputRouter {
    pub fn new(layout: GridLayout, annotator: Annotator, sink: ThreadedSink, display: Box<dyn DisplaySink>) -> Self {
        Self {
            closed: vec![false; layout.slots],
            layout,
            annotator,
            sink,
            display,
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Returns `false` when the display asked to stop.
    pub fn route(&mut self, results: Vec<RoutedFrame>) -> bool {
        let mut canvas = RgbImage::from_pixel(self.layout.canvas_width, self.layout.canvas_height, CANVAS_FILL);
        let (cell_w, cell_h) = self.layout.cell_size();

        for result in results {
            let source_id = result.frame.source_id;
            let annotated = self.annotator.annotate(&result.frame, &result.detections);
            let cell = match resize_rgb(&annotated, cell_w, cell_h) {
                Ok(cell) => cell,
                Err(err) => {
                    log::warn!("Source {}: failed to scale frame {}: {:#}", source_id, result.frame.frame_index, err);
                    continue;
                }
            };

            let (x, y) = self.layout.cell_origin(source_id);
            imageops::replace(&mut canvas, &cell, x as i64, y as i64);
            self.sink.submit(source_id, cell);
        }

        match self.display.show(&canvas) {
            Ok(keep_going) => keep_going,
            Err(err) => {
                log::warn!("Display failed: {:#}", err);
                true
            }
        }
    }

    /// Closes the persistence stream of a source that will produce no more frames.
    pub fn source_finished(&mut self, source_id: usize) {
        if let Some(closed) = self.closed.get_mut(source_id) {
            if !*closed {
                *closed = true;
                self.sink.close_source(source_id);
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.sink.dropped()
    }

    /// Closes every stream still open, waits for queued writes and returns the sink counters.
    pub fn finish(mut self) -> SinkStats {
        for source_id in 0..self.closed.len() {
            self.source_finished(source_id);
        }
        self.sink.finish()
    }
}
