mod capture_worker;
mod image_sequence;
mod mailbox;
mod shutdown;

pub use capture_worker::*;
pub use image_sequence::*;
pub use mailbox::*;
pub use shutdown::*;
