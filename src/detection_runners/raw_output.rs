//! Raw per-slot detection buffer: `[count, record0, record1, ...]`, six floats per record.

use std::slice::ChunksExact;

pub const RECORD_STRIDE: usize = 6;
pub const DEFAULT_MAX_RECORDS: usize = 1000;

/// One record in model-input pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawRecord {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl RawRecord {
    pub fn new(center_x: f32, center_y: f32, width: f32, height: f32, confidence: f32, class_id: usize) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
            confidence,
            class_id,
        }
    }

    fn from_chunk(r: &[f32]) -> Self {
        Self::new(r[0], r[1], r[2], r[3], r[4], r[5] as usize)
    }

    fn write_to(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&[
            self.center_x,
            self.center_y,
            self.width,
            self.height,
            self.confidence,
            self.class_id as f32,
        ]);
    }
}

/// Iterator over the records of one buffer, bounded by `max_records` and by the data actually present.
#[derive(Debug, Clone)]
pub struct RawDetections<'a> {
    records: ChunksExact<'a, f32>,
    remaining: usize,
    announced: usize,
}

impl<'a> RawDetections<'a> {
    pub fn parse(buffer: &'a [f32], max_records: usize) -> Self {
        let (announced, body) = match buffer.split_first() {
            // negative and NaN counts saturate to zero
            Some((&count, rest)) => (count as usize, rest),
            None => (0, buffer),
        };
        let available = body.len() / RECORD_STRIDE;
        if announced > max_records {
            log::debug!("Raw buffer announces {} records, keeping the first {}", announced, max_records);
        }
        if announced.min(max_records) > available {
            log::debug!("Raw buffer announces {} records but only holds {}", announced, available);
        }

        Self {
            records: body.chunks_exact(RECORD_STRIDE),
            remaining: announced.min(max_records).min(available),
            announced,
        }
    }

    /// Count written at the head of the buffer, before any truncation.
    pub fn announced(&self) -> usize {
        self.announced
    }
}

impl Iterator for RawDetections<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.records.next().map(RawRecord::from_chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RawDetections<'_> {}

pub fn decode(buffer: &[f32], max_records: usize) -> Vec<RawRecord> {
    RawDetections::parse(buffer, max_records).collect()
}

/// Inverse of [`decode`]: writes at most `max_records` records behind their count.
pub fn encode(records: &[RawRecord], max_records: usize) -> Vec<f32> {
    let n = records.len().min(max_records);
    let mut out = Vec::with_capacity(1 + n * RECORD_STRIDE);
    out.push(n as f32);
    for record in &records[..n] {
        record.write_to(&mut out);
    }
    out
}
