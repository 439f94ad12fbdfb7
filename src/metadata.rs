//! Metadata records of an `.nd2` file. Every record is
//! stored as a tree of named, typed items (see
//! `lite_variant`); the submodules here pick the fields
//! they need out of that tree and return plain typed
//! structs, so nothing downstream ever walks the tree.
//!
//! The image attributes are mandatory. Everything else is
//! optional in the format and decodes to a default when
//! its chunk is absent.

mod lite_variant;
mod attributes;
mod experiment;
mod text_info;
mod picture;
mod binaries;

pub use attributes::{Attributes, Compression, align4};
pub use experiment::{Experiment, LoopLevel, LoopType};
pub use text_info::TextInfo;
pub use picture::{
    FrameMetadata, StagePosition, MetadataDescription, PicturePlane, ImageType, MAX_PICTURE_PLANES,
};
pub use binaries::{BinaryLayerDescriptor, MAX_BINARY_LAYERS};
