extern crate bvr_stream;

use std::str::FromStr;
use bvr_stream::common::{InferenceDevice, SourceDescriptor};
use bvr_stream::data::{PipelineConfig, Stage, TimeCalc, MAX_MODEL_SIDE};
use bvr_stream::detection_runners::ChannelOrder;
use bvr_stream::streams::DeliveryMode;

fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("bvr_stream_{}_{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn defaults_are_valid() {
    let config = PipelineConfig::default();
    config.validate().unwrap();
    assert_eq!(config.batch_size, 1);
    assert_eq!(config.conf_threshold, 0.5);
    assert_eq!(config.iou_threshold, 0.4);
    assert!(config.group_by_class);
    assert_eq!(config.max_records, 1000);
    assert_eq!((config.canvas_width, config.canvas_height), (960, 540));
}

#[test]
fn json_round_trip() {
    let config = PipelineConfig::new()
        .with_batch_size(4)
        .with_channel_order(ChannelOrder::Bgr)
        .with_names(&["person", "car"])
        .with_profile(true);
    let json = config.to_json().unwrap();
    let back: PipelineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn partial_json_uses_defaults() {
    let path = temp_file("partial.json", r#"{ "batch_size": 2, "channel_order": "bgr", "iou_threshold": 0.5 }"#);
    let config = PipelineConfig::from_json_file(&path).unwrap();
    assert_eq!(config.batch_size, 2);
    assert_eq!(config.channel_order, ChannelOrder::Bgr);
    assert_eq!(config.iou_threshold, 0.5);
    assert_eq!(config.model_width, PipelineConfig::default().model_width);
    let _ = std::fs::remove_file(path);

    let path = temp_file("invalid.json", r#"{ "conf_threshold": 1.5 }"#);
    assert!(PipelineConfig::from_json_file(&path).is_err());
    let _ = std::fs::remove_file(path);
}

#[test]
fn validation_rejects_bad_values() {
    assert!(PipelineConfig::new().with_batch_size(0).validate().is_err());
    assert!(PipelineConfig::new().with_conf_threshold(-0.1).validate().is_err());
    assert!(PipelineConfig::new().with_iou_threshold(1.01).validate().is_err());
    assert!(PipelineConfig::new().with_model_size(0, 608).validate().is_err());
    assert!(PipelineConfig::new().with_canvas_size(960, 0).validate().is_err());
    assert!(PipelineConfig::new().with_max_records(0).validate().is_err());
    assert!(PipelineConfig::new().with_sink_queue_depth(0).validate().is_err());
    assert!(PipelineConfig::new().with_model_size(608, MAX_MODEL_SIDE + 1).validate().is_err());
    assert!(PipelineConfig::new().with_model_size(MAX_MODEL_SIDE, 608).validate().is_ok());
    assert!(PipelineConfig::new().with_conf_threshold(1.0).with_iou_threshold(0.0).validate().is_ok());
}

#[test]
fn names_file() {
    let path = temp_file("labels.txt", "person\nbicycle\n\ncar \n");
    let config = PipelineConfig::new().with_names_file(&path).unwrap();
    assert_eq!(config.class_names, Some(vec!["person".to_string(), "bicycle".to_string(), "car".to_string()]));
    let _ = std::fs::remove_file(path);
}

#[test]
fn inference_device_parsing() {
    assert_eq!(InferenceDevice::from_str("cpu").unwrap(), InferenceDevice::CPU);
    assert_eq!(InferenceDevice::from_str("CUDA:1").unwrap(), InferenceDevice::CUDA(1));
    assert_eq!(InferenceDevice::from_str("tensorrt").unwrap(), InferenceDevice::TensorRT(0));
    assert!(InferenceDevice::from_str("gpu").is_err());
    assert!(InferenceDevice::from_str("cuda:x").is_err());
    assert_eq!(InferenceDevice::CUDA(2).to_string(), "CUDA:2");
}

#[test]
fn source_descriptors() {
    let file = SourceDescriptor::from_uri("/videos/parking_lot.mp4");
    assert_eq!(file.mode, DeliveryMode::Blocking);
    assert_eq!(file.output_stem(0), "parking_lot");

    let dir = SourceDescriptor::from_uri("/data/frames/lobby/");
    assert_eq!(dir.output_stem(1), "lobby");

    let live = SourceDescriptor::from_uri("rtsp://192.168.1.20:554/stream");
    assert_eq!(live.mode, DeliveryMode::Overwrite);
    assert_eq!(live.output_stem(3), "stream-3");
}

#[test]
fn stage_timings() {
    let mut t = TimeCalc::default();
    assert_eq!(t.avg(Stage::Inference), std::time::Duration::ZERO);
    t.add(Stage::Inference, std::time::Duration::from_millis(10));
    t.add(Stage::Inference, std::time::Duration::from_millis(30));
    t.add(Stage::Render, std::time::Duration::from_millis(5));
    assert_eq!(t.n(Stage::Inference), 2);
    assert_eq!(t.avg(Stage::Inference), std::time::Duration::from_millis(20));
    assert_eq!(t.total(), std::time::Duration::from_millis(45));
}
