mod config_ort;
mod config_pipeline;
mod filesystem_access;
mod time_calc;

pub use config_ort::*;
pub use config_pipeline::{PipelineConfig, MAX_MODEL_SIDE};
pub use filesystem_access::FsAccess;
pub(crate) use filesystem_access::create_directory;
pub use time_calc::{Stage, TimeCalc};
