//! Options for a pipeline run.

use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use crate::detection_runners::ChannelOrder;
use crate::detection_runners::DEFAULT_MAX_RECORDS;
use crate::utils::file_to_vec;

/// Largest model input side accepted by [`PipelineConfig::validate`].
pub const MAX_MODEL_SIDE: u32 = 8192;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub model_width: u32,
    pub model_height: u32,
    pub letterbox_fill: u8,
    pub channel_order: ChannelOrder,

    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub group_by_class: bool,
    pub max_records: usize,
    pub class_names: Option<Vec<String>>,

    pub canvas_width: u32,
    pub canvas_height: u32,
    pub sink_queue_depth: usize,
    pub label_font_path: Option<PathBuf>,

    pub profile: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            model_width: 608,
            model_height: 608,
            letterbox_fill: 128,
            channel_order: ChannelOrder::Rgb,

            conf_threshold: 0.5,
            iou_threshold: 0.4,
            group_by_class: true,
            max_records: DEFAULT_MAX_RECORDS,
            class_names: None,

            canvas_width: 960,
            canvas_height: 540,
            sink_queue_depth: 8,
            label_font_path: None,

            profile: false,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse pipeline config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values that would make the run meaningless before any thread is started.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.model_width == 0 || self.model_height == 0 {
            bail!("model input size must be non-zero, got {}x{}", self.model_width, self.model_height);
        }
        if self.model_width > MAX_MODEL_SIDE || self.model_height > MAX_MODEL_SIDE {
            bail!(
                "model input size {}x{} exceeds {} per side",
                self.model_width, self.model_height, MAX_MODEL_SIDE
            );
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            bail!("canvas size must be non-zero, got {}x{}", self.canvas_width, self.canvas_height);
        }
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            bail!("conf_threshold must be within [0, 1], got {}", self.conf_threshold);
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            bail!("iou_threshold must be within [0, 1], got {}", self.iou_threshold);
        }
        if self.max_records == 0 {
            bail!("max_records must be at least 1");
        }
        if self.sink_queue_depth == 0 {
            bail!("sink_queue_depth must be at least 1");
        }
        Ok(())
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_model_size(mut self, width: u32, height: u32) -> Self {
        self.model_width = width;
        self.model_height = height;
        self
    }

    pub fn with_letterbox_fill(mut self, x: u8) -> Self {
        self.letterbox_fill = x;
        self
    }

    pub fn with_channel_order(mut self, x: ChannelOrder) -> Self {
        self.channel_order = x;
        self
    }

    pub fn with_conf_threshold(mut self, x: f32) -> Self {
        self.conf_threshold = x;
        self
    }

    pub fn with_iou_threshold(mut self, x: f32) -> Self {
        self.iou_threshold = x;
        self
    }

    pub fn with_group_by_class(mut self, x: bool) -> Self {
        self.group_by_class = x;
        self
    }

    pub fn with_max_records(mut self, n: usize) -> Self {
        self.max_records = n;
        self
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.class_names = Some(names.iter().map(|x| x.to_string()).collect::<Vec<String>>());
        self
    }

    /// Reads class names from a text file, one per line.
    pub fn with_names_file(mut self, path: &Path) -> Result<Self> {
        let names = file_to_vec(path)
            .with_context(|| format!("Failed to read class names from {}", path.display()))?;
        self.class_names = Some(names);
        Ok(self)
    }

    pub fn with_canvas_size(mut self, width: u32, height: u32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    pub fn with_sink_queue_depth(mut self, n: usize) -> Self {
        self.sink_queue_depth = n;
        self
    }

    pub fn with_label_font(mut self, path: &Path) -> Self {
        self.label_font_path = Some(path.to_path_buf());
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }
}
