//! # nd2rs
//!
//! Reads Nikon `.nd2` microscopy containers (version 3
//! layout): the chunk map, image attributes, experiment
//! loops, text and picture metadata, binary layer
//! descriptors and the pixel planes of individual frames.
//!
//! Lossy-compressed planes, binary mask pixels and tiled
//! layouts are reported but not decoded.

pub mod binary;
pub mod container;
pub mod data;
pub mod metadata;

mod error;
mod nd2reader;
mod utils;

#[cfg(test)]
mod tests;

use std::path::Path;

pub use error::Nd2Error;
pub use nd2reader::Nd2Reader;
pub use container::FormatConstants;
pub use data::{PixelBuffer, seq_index_from_coords, coords_from_seq_index};
pub use metadata::{
    Attributes,
    BinaryLayerDescriptor,
    Compression,
    Experiment,
    FrameMetadata,
    LoopLevel,
    LoopType,
    MetadataDescription,
    StagePosition,
    TextInfo,
};

/// `open_nd2(filename)` opens a `.nd2` file, parses its
/// chunk map, attributes and experiment loops, and returns
/// an `Nd2Reader` ready to decode frames.
///
/// ## Arguments
///
/// * `filename` - Path to the file to open
///
/// ## Errors
///
/// * `Nd2Error::IOError` - the file cannot be read
/// * `Nd2Error::CorruptContainer` - the file is not an `.nd2` container
/// * `Nd2Error::MissingChunk` - the file has no image attributes
///
/// ## Example
///
/// ```rust, ignore
/// let mut reader = nd2rs::open_nd2("file.nd2")?;
/// for seq in 0..reader.sequence_count()? {
///     let (frame, meta) = reader.decode_frame(seq)?;
///     println!("frame {} at {} ms", seq, meta.relative_time_ms);
/// }
/// ```
pub fn open_nd2<P : AsRef<Path>>(filename : P) -> Result<Nd2Reader, Nd2Error> {
    Nd2Reader::open(filename)
}
