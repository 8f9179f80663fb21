//! File/code adapted from https://github.com/jamjamjon/usls
//!
//! ONNX Runtime backend producing raw detection buffers from a YOLOv5-style export.

use anyhow::{bail, Context, Result};
use half::f16;
use ndarray::{ArrayViewD, Axis};
use ort::{
    execution_providers::{ExecutionProvider,
                          CUDAExecutionProvider,
                          TensorRTExecutionProvider,
                          CoreMLExecutionProvider},
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::{Session, SessionInputValue},
    value::{DynValue, Value},
};
use regex::Regex;
use crate::common::InferenceDevice;
use crate::data::ConfigOrt;
use crate::detection_runners::{encode, InferenceBackend, RawRecord, X};

/// ONNXRuntime Backend
#[derive(Debug)]
pub struct OrtEngine {
    session: Session,
    device: InferenceDevice,
    input_name: String,
    fp16_input: bool,
    batch_size: usize,
    model_width: u32,
    model_height: u32,
    max_records: usize,
    objectness_floor: f32,
    names: Option<Vec<String>>,
}

impl OrtEngine {
    pub fn new(config: &ConfigOrt) -> Result<Self> {
        let mut builder = Session::builder()?;

        let mut device = config.device;
        let registered = match device {
            InferenceDevice::TensorRT(device_id) => Self::build_trt(&mut builder, device_id, config.fp16_input),
            InferenceDevice::CUDA(device_id) => Self::build_cuda(&mut builder, device_id),
            InferenceDevice::CoreML(_) => Self::build_coreml(&mut builder),
            InferenceDevice::CPU => Ok(()),
        };
        if let Err(err) = registered {
            log::warn!("{err}, Using cpu");
            device = InferenceDevice::CPU;
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&config.onnx_path)
            .with_context(|| format!("Failed to load model {}", config.onnx_path))?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => bail!("Model {} declares no inputs", config.onnx_path),
        };

        let mut engine = Self {
            session,
            device,
            input_name,
            fp16_input: config.fp16_input,
            batch_size: config.batch_size,
            model_width: config.model_width,
            model_height: config.model_height,
            max_records: config.max_records,
            objectness_floor: config.objectness_floor,
            names: config.names.clone(),
        };
        if engine.names.is_none() {
            engine.names = engine.fetch_names();
        }

        log::info!(
            "Backend: ONNXRuntime | Model: {} | Device: {} | Input: {} {}x{} x{} | Classes: {}",
            config.onnx_path,
            engine.device,
            engine.input_name,
            engine.model_width,
            engine.model_height,
            engine.batch_size,
            engine.names.as_ref().map(|n| n.len().to_string()).unwrap_or_else(|| "unknown".into()),
        );
        Ok(engine)
    }

    fn build_trt(builder: &mut SessionBuilder, device_id: usize, fp16_enable: bool) -> Result<()> {
        let trt = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_fp16(fp16_enable)
            .with_engine_cache(true)
            .with_engine_cache_path("trt-cache");
        if trt.is_available()? {
            match trt.register(builder) {
                Ok(_) => { }
                Err(err) => { bail!("TensorRT initialization failed: {:?}", err) }
            }
            log::info!("Initial model serialization with TensorRT may take some time...");
            Ok(())
        } else {
            bail!("TensorRT execution provider not available")
        }
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> Result<()> {
        let ep = CUDAExecutionProvider::default().with_device_id(device_id as i32);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { bail!("CUDA initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            bail!("CUDA execution provider not available")
        }
    }

    fn build_coreml(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CoreMLExecutionProvider::default().with_subgraphs(false);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { bail!("CoreML initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            bail!("CoreML execution provider not available")
        }
    }

    fn to_input(&self, xs: &X) -> Result<DynValue> {
        let value = if self.fp16_input {
            Value::from_array(xs.mapv(f16::from_f32))?.into_dyn()
        } else {
            Value::from_array(xs.0.clone())?.into_dyn()
        };
        Ok(value)
    }

    pub fn try_fetch(&self, key: &str) -> Option<String> {
        match self.session.metadata() {
            Err(_) => None,
            Ok(metadata) => metadata.custom(key).unwrap_or_default(),
        }
    }

    fn fetch_names(&self) -> Option<Vec<String>> {
        // String format: `{0: 'person', 1: 'bicycle', 2: 'sports ball', ..., 27: "yellow_lady's_slipper"}`
        let names = self.try_fetch("names")?;
        let re = Regex::new(r#"(['"])([-()\w '"]+)(['"])"#).ok()?;
        let names_: Vec<String> = re
            .captures_iter(&names)
            .map(|x| x.extract())
            .map(|(_, [_, name, _])| name.to_string())
            .collect();
        Some(names_)
    }

    pub fn names(&self) -> Option<&Vec<String>> {
        self.names.as_ref()
    }

    pub fn device(&self) -> &InferenceDevice {
        &self.device
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Runs `n` zero batches so the first real tick does not pay for lazy initialization.
    pub fn dry_run(&mut self, n: usize) -> Result<()> {
        let xs = X::zeros(&[self.batch_size, 3, self.model_height as usize, self.model_width as usize]);
        for _ in 0..n {
            self.infer(&xs)?;
        }
        if n > 0 {
            log::info!("Dry run finished ({} batches)", n);
        }
        Ok(())
    }
}

impl InferenceBackend for OrtEngine {
    fn name(&self) -> &str {
        "onnxruntime"
    }

    fn input_size(&self) -> Option<(u32, u32)> {
        Some((self.model_width, self.model_height))
    }

    fn infer(&mut self, xs: &X) -> Result<Vec<Vec<f32>>> {
        let input = vec![Into::<SessionInputValue<'_>>::into(self.to_input(xs)?)];
        let outputs = self.session.run(&input[..]).context("ONNX Runtime run failed")?;

        let y = &outputs[0];
        let preds = match y.try_extract_array::<f32>() {
            Ok(view) => view.into_owned(),
            Err(_) => y
                .try_extract_array::<f16>()
                .context("Model output is neither f32 nor f16")?
                .mapv(f16::to_f32),
        };

        pack_yolo_output(preds.view(), self.max_records, self.objectness_floor)
    }
}

/// Packs a `[B, N, 5 + nc]` prediction tensor into one raw buffer per batch entry.
///
/// Rows with objectness below `objectness_floor` are skipped; the class is the argmax of the class
/// scores and the confidence is `objectness * class score`.
pub fn pack_yolo_output(preds: ArrayViewD<'_, f32>, max_records: usize, objectness_floor: f32) -> Result<Vec<Vec<f32>>> {
    if preds.ndim() != 3 {
        bail!("Expected a [batch, anchors, 5 + classes] output, got shape {:?}", preds.shape());
    }
    let stride = preds.shape()[2];
    if stride < 6 {
        bail!("Output rows hold {} values, need at least 6 (box, objectness, one class)", stride);
    }

    let mut buffers = Vec::with_capacity(preds.shape()[0]);
    for batch in preds.axis_iter(Axis(0)) {
        let mut records = Vec::new();
        for row in batch.axis_iter(Axis(0)) {
            if records.len() >= max_records {
                break;
            }
            let objectness = row[4];
            if objectness < objectness_floor {
                continue;
            }
            let (class_id, class_score) = row
                .iter()
                .skip(5)
                .enumerate()
                .fold((0usize, f32::MIN), |best, (i, &p)| if p > best.1 { (i, p) } else { best });
            records.push(RawRecord::new(row[0], row[1], row[2], row[3], objectness * class_score, class_id));
        }
        buffers.push(encode(&records, max_records));
    }
    Ok(buffers)
}
