mod image_ops;
mod inference_process;
mod input_wrapper;
mod nms;
mod post_process;
mod raw_output;
pub mod ort_detector;

pub use image_ops::*;
pub use inference_process::InferenceBackend;
pub use input_wrapper::X;
pub use nms::*;
pub use ort_detector::*;
pub use post_process::PostProcessor;
pub use raw_output::*;
