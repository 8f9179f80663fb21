mod grid_layout;
mod render;
mod router;
mod sinks;

pub use grid_layout::GridLayout;
pub use render::*;
pub use router::*;
pub use sinks::*;
