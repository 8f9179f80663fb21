
mod bvr_box;
mod bvr_detection;
mod bvr_frame;
mod inference_device;
mod source_descriptor;

pub use bvr_box::*;
pub use bvr_detection::*;
pub use bvr_frame::*;
pub use inference_device::*;
pub use source_descriptor::*;
