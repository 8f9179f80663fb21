mod utils;
pub mod common;
pub mod data;
pub mod detection_runners;
pub mod output;
pub mod pipeline;
pub mod streams;

use std::path::Path;
use std::sync::Arc;
use crate::common::{InferenceDevice, SourceDescriptor};
use crate::data::{ConfigOrt, PipelineConfig};
use crate::detection_runners::OrtEngine;
use crate::output::{DisplaySink, ImageDirSink};
use crate::streams::ImageSequenceOpener;

pub use crate::pipeline::{start, stop, PipelineHandle, PipelineParts, PipelineReport};

/// Builds the ONNX Runtime backend for `config` and warms it up.
pub fn init_ort_backend(onnx_path: &str, device: InferenceDevice, config: &PipelineConfig) -> anyhow::Result<OrtEngine> {
    let mut ort_options = ConfigOrt::new()
        .with_model(onnx_path)?
        .with_device(device)
        .with_batch_size(config.batch_size)
        .with_model_width(config.model_width)
        .with_model_height(config.model_height)
        .with_max_records(config.max_records);
    if let Some(names) = &config.class_names {
        let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        ort_options = ort_options.with_names(&names);
    }

    log::info!("Initializing ORT session with ({}) execution provider", device);
    let mut engine = OrtEngine::new(&ort_options)?;
    engine.dry_run(ort_options.num_dry_run)?;
    Ok(engine)
}

/// Image-directory sources, ONNX Runtime inference and annotated output under `out_dir`.
pub fn start_image_dirs(
    config: PipelineConfig,
    sources: Vec<SourceDescriptor>,
    onnx_path: &str,
    device: InferenceDevice,
    out_dir: &Path,
    display: Box<dyn DisplaySink>,
) -> anyhow::Result<PipelineHandle> {
    let backend = init_ort_backend(onnx_path, device, &config)?;
    let parts = PipelineParts {
        opener: Arc::new(ImageSequenceOpener),
        backend: Box::new(backend),
        persistence: Box::new(ImageDirSink::new(out_dir, &sources)),
        display,
    };
    start(config, sources, parts)
}
