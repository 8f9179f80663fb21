use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Execution provider for the ONNX Runtime backend. The payload is the device id.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceDevice {
    #[default] CPU,
    CUDA(usize),
    TensorRT(usize),
    CoreML(usize),
}

// Storing the "proper" spelling and the lowercase version.
const CPU: [&str; 2] = ["CPU", "cpu"];
const CUDA: [&str; 2] = ["CUDA", "cuda"];
const TENSOR_RT: [&str; 2] = ["TensorRT", "tensorrt"];
const CORE_ML: [&str; 2] = ["CoreML", "coreml"];

impl InferenceDevice {
    pub fn with_id(device: &str, device_id: usize) -> Option<Self> {
        match device.to_lowercase().as_str() {
            "cpu" => Some(InferenceDevice::CPU),
            "cuda" => Some(InferenceDevice::CUDA(device_id)),
            "tensorrt" => Some(InferenceDevice::TensorRT(device_id)),
            "coreml" => Some(InferenceDevice::CoreML(device_id)),
            _ => None,
        }
    }

    fn names(&self) -> &'static [&'static str; 2] {
        match self {
            InferenceDevice::CPU => &CPU,
            InferenceDevice::CUDA(_) => &CUDA,
            InferenceDevice::TensorRT(_) => &TENSOR_RT,
            InferenceDevice::CoreML(_) => &CORE_ML,
        }
    }

    pub fn str(&self) -> &'static str {
        self.names()[0]
    }

    pub fn str_lowercase(&self) -> &'static str {
        self.names()[1]
    }

    pub fn device_id(&self) -> usize {
        match self {
            InferenceDevice::CPU => 0,
            InferenceDevice::CUDA(id) | InferenceDevice::TensorRT(id) | InferenceDevice::CoreML(id) => *id,
        }
    }

    pub fn all_inference_devices() -> Vec<&'static str> {
        vec![CPU[1], CUDA[1], TENSOR_RT[1], CORE_ML[1]]
    }
}

impl fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceDevice::CPU => f.write_str(self.str()),
            _ => write!(f, "{}:{}", self.str(), self.device_id()),
        }
    }
}

/// Accepts `cpu`, `cuda`, `cuda:1`, `tensorrt:0`, ... (case-insensitive).
impl FromStr for InferenceDevice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, id) = match s.split_once(':') {
            Some((name, id)) => (name, id.trim().parse::<usize>()?),
            None => (s, 0),
        };
        InferenceDevice::with_id(name.trim(), id).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown inference device '{}'. Expected one of: {}",
                s,
                InferenceDevice::all_inference_devices().join(", ")
            )
        })
    }
}
