//! `Data`
//!
//! Turns what the container and metadata modules read into
//! things a caller works with: frame coordinates and
//! decoded pixel planes.

mod coords;
pub mod image;

pub use coords::{seq_index_from_coords, coords_from_seq_index};
pub use image::PixelBuffer;
