mod binary_read_ext;
mod binary_write_ext;

pub use binary_read_ext::BinaryReadExt;
pub use binary_write_ext::{BinaryWriteExt, align_up};
