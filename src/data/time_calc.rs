//! File/code adapted from https://github.com/jamjamjon/usls
//!
//! Accumulated per-stage timings for a pipeline run.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preprocess,
    Inference,
    Postprocess,
    Render,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Preprocess, Stage::Inference, Stage::Postprocess, Stage::Render];

    fn index(&self) -> usize {
        match self {
            Stage::Preprocess => 0,
            Stage::Inference => 1,
            Stage::Postprocess => 2,
            Stage::Render => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Inference => "inference",
            Stage::Postprocess => "postprocess",
            Stage::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone)]
pub struct TimeCalc {
    counts: [u32; 4],
    duration: [Duration; 4],
}

impl TimeCalc {
    pub fn add(&mut self, stage: Stage, x: Duration) {
        let i = stage.index();
        self.duration[i] += x;
        self.counts[i] += 1;
    }

    pub fn total(&self) -> Duration {
        self.duration.iter().sum::<Duration>()
    }

    pub fn total_for(&self, stage: Stage) -> Duration {
        self.duration[stage.index()]
    }

    pub fn n(&self, stage: Stage) -> u32 {
        self.counts[stage.index()]
    }

    /// Average time per call for `stage`, zero when it never ran.
    pub fn avg(&self, stage: Stage) -> Duration {
        match self.n(stage) {
            0 => Duration::ZERO,
            n => self.total_for(stage) / n,
        }
    }

    pub fn summary(&self) -> Vec<(Stage, Duration)> {
        Stage::ALL.iter().map(|s| (*s, self.avg(*s))).collect()
    }
}

impl fmt::Display for TimeCalc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .summary()
            .iter()
            .map(|(stage, avg)| format!("{}={:.2?}", stage, avg))
            .collect();
        write!(f, "{} | total={:.2?}", parts.join(" | "), self.total())
    }
}
