//! This module contains the container-level structure of an
//! `.nd2` file: the chunk headers, the trailing chunk map,
//! and the table of literal names the format uses. Purely
//! for I/O operations, does not know about images or
//! metadata encodings.

mod constants;
mod chunk;
mod index;

pub use constants::FormatConstants;
pub use chunk::{ChunkHeader, RawChunk, read_chunk, read_chunk_data, CHUNK_HEADER_LEN};
pub use index::{ChunkIndex, ChunkIndexEntry};
