//! Byte-level access to a container: positioned reads from
//! the underlying file and little-endian decoding of the
//! slices those reads return. Knows nothing about chunks
//! or metadata.

mod reader;
mod cursor;

pub use reader::BinaryReader;
pub use cursor::{ByteCursor, u32_le, u64_le, f64_le, wide_string};
