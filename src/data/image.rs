//! `Image`
//!
//! Contains the pixel buffer handed to callers and the
//! decoder that fills it from a frame's data chunk.

mod pixels;
mod decode;

pub use pixels::PixelBuffer;
pub (crate) use decode::FrameSource;
