//! File/code adapted from https://github.com/jamjamjon/usls
//!
//! Options for building the ONNX Runtime backend.

use anyhow::{bail, Result};
use crate::common::InferenceDevice;
use crate::detection_runners::DEFAULT_MAX_RECORDS;

/// Objectness below this is never turned into a record.
pub const DEFAULT_OBJECTNESS_FLOOR: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct ConfigOrt {
    pub onnx_path: String,
    pub device: InferenceDevice,
    pub batch_size: usize,
    pub model_width: u32,
    pub model_height: u32,
    pub num_dry_run: usize,
    pub fp16_input: bool,

    pub max_records: usize,
    pub objectness_floor: f32,
    pub names: Option<Vec<String>>,
}

impl Default for ConfigOrt {
    fn default() -> Self {
        Self {
            onnx_path: String::new(),
            device: InferenceDevice::CPU,
            batch_size: 1,
            model_width: 608,
            model_height: 608,
            num_dry_run: 1,
            fp16_input: false,

            max_records: DEFAULT_MAX_RECORDS,
            objectness_floor: DEFAULT_OBJECTNESS_FLOOR,
            names: None,
        }
    }
}

impl ConfigOrt {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_model(mut self, onnx_path: &str) -> Result<Self> {
        if !std::path::Path::new(onnx_path).is_file() {
            bail!("Model file not found: {}", onnx_path);
        }
        self.onnx_path = onnx_path.to_string();
        Ok(self)
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_model_width(mut self, n: u32) -> Self {
        self.model_width = n;
        self
    }

    pub fn with_model_height(mut self, n: u32) -> Self {
        self.model_height = n;
        self
    }

    pub fn with_dry_run(mut self, n: usize) -> Self {
        self.num_dry_run = n;
        self
    }

    pub fn with_device(mut self, device_type: InferenceDevice) -> Self {
        self.device = device_type;
        self
    }

    pub fn with_fp16_input(mut self, x: bool) -> Self {
        self.fp16_input = x;
        self
    }

    pub fn with_max_records(mut self, n: usize) -> Self {
        self.max_records = n;
        self
    }

    pub fn with_objectness_floor(mut self, x: f32) -> Self {
        self.objectness_floor = x;
        self
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = Some(names.iter().map(|x| x.to_string()).collect::<Vec<String>>());
        self
    }
}
