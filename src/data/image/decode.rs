//! Decoding of individual frames: locating a frame's chunk,
//! splitting off the timestamp that precedes the pixels, and
//! inflating or copying the pixel plane.
//!
//! A frame data chunk looks like
//!
//! ```text
//! [ f64 timestamp (ms) ][ pixel plane, raw or zlib-deflated ]
//! ```
//!
//! and the decoded plane is always `stride * height` bytes.

use std::io::{self, Read, Seek};

use flate2::read::ZlibDecoder;

use crate::{
    binary::{BinaryReader, f64_le},
    container::{ChunkIndex, FormatConstants, read_chunk_data},
    data::image::PixelBuffer,
    error::Nd2Error,
    metadata::{Attributes, Compression, FrameMetadata},
};

/// Output reserved per compressed byte before inflating
const INITIAL_INFLATE_RATIO : u64 = 4;

/// Everything needed to decode a frame, borrowed from an
/// open reader. Holds no file handle, so one `FrameSource`
/// can be shared across threads that each bring their own
/// `BinaryReader`.
#[derive(Clone, Copy)]
pub (crate) struct FrameSource<'a> {
    pub index : &'a ChunkIndex,
    pub attributes : &'a Attributes,
    pub constants : &'a FormatConstants,
}

impl<'a> FrameSource<'a> {
    fn check_index(&self, seq_index : u32) -> Result<(), Nd2Error> {
        if seq_index >= self.attributes.sequence_count {
            return Err(Nd2Error::FrameIndexOutOfRange {
                requested : seq_index,
                sequence_count : self.attributes.sequence_count,
            });
        }
        Ok(())
    }

    /// Decodes the pixels and metadata of frame `seq_index`.
    ///
    /// ## Errors
    ///
    /// * `Nd2Error::FrameIndexOutOfRange` - `seq_index` is past the last frame
    /// * `Nd2Error::MissingFrame` - the frame's chunk is not in the chunk map
    /// * `Nd2Error::UnsupportedCompression` - the file uses the lossy codec
    /// * `Nd2Error::SizeMismatch` - the plane does not decode to `stride * height` bytes
    pub fn decode<R : Read + Seek>(&self, reader : &mut BinaryReader<R>, seq_index : u32)
    -> Result<(PixelBuffer, FrameMetadata), Nd2Error> {
        self.check_index(seq_index)?;

        let (timestamp, pixels) = self.decode_plane(reader, seq_index)?;
        let metadata = self.metadata_or_timestamp(reader, seq_index, Some(timestamp))?;
        Ok((pixels, metadata))
    }

    /// Reads and decodes only the pixel plane, returning it
    /// with the timestamp stored in front of it.
    fn decode_plane<R : Read + Seek>(&self, reader : &mut BinaryReader<R>, seq_index : u32)
    -> Result<(f64, PixelBuffer), Nd2Error> {
        let chunk = self.constants.frame_data_chunk(seq_index);
        let entry = self.index.get(&chunk).ok_or_else(|| Nd2Error::MissingFrame {
            seq_index,
            chunk : chunk.clone(),
        })?;

        let payload = read_chunk_data(reader, entry, self.constants.chunk_magic)?;
        let prefix = self.constants.frame_timestamp_len as usize;
        if payload.len() < prefix {
            return Err(Nd2Error::SizeMismatch {
                chunk,
                expected : self.attributes.frame_bytes().saturating_add(prefix as u64),
                actual : payload.len() as u64,
            });
        }
        let timestamp = f64_le(&payload, 0).map_err(|err| err.in_chunk(&chunk))?;
        let plane = &payload[prefix..];

        let data = match self.attributes.compression {
            Compression::None => plane.to_vec(),
            Compression::Lossless => inflate(plane, self.attributes.frame_bytes(), &chunk)?,
            Compression::Lossy => {
                return Err(Nd2Error::UnsupportedCompression(Compression::Lossy));
            },
        };

        Ok((timestamp, PixelBuffer::from_decoded(self.attributes, data, &chunk)?))
    }

    /// Picture metadata of frame `seq_index`, without touching
    /// its pixels.
    pub fn frame_metadata<R : Read + Seek>(&self, reader : &mut BinaryReader<R>, seq_index : u32)
    -> Result<FrameMetadata, Nd2Error> {
        self.check_index(seq_index)?;
        self.metadata_or_timestamp(reader, seq_index, None)
    }

    /// Uses the frame's picture metadata chunk if there is one.
    /// Otherwise falls back to the timestamp in front of the
    /// pixels, reading it only if the caller does not have it
    /// already.
    fn metadata_or_timestamp<R : Read + Seek>(
        &self,
        reader : &mut BinaryReader<R>,
        seq_index : u32,
        timestamp : Option<f64>,
        ) -> Result<FrameMetadata, Nd2Error> {
        let chunk = self.constants.frame_metadata_chunk(seq_index);
        if let Some(entry) = self.index.get(&chunk) {
            let data = read_chunk_data(reader, entry, self.constants.chunk_magic)?;
            return FrameMetadata::decode(&data).map_err(|err| err.in_chunk(&chunk));
        }

        let timestamp = match timestamp {
            Some(timestamp) => timestamp,
            None => self.read_timestamp(reader, seq_index)?,
        };
        Ok(FrameMetadata::from_timestamp(timestamp))
    }

    /// Reads just the timestamp of a frame data chunk
    fn read_timestamp<R : Read + Seek>(&self, reader : &mut BinaryReader<R>, seq_index : u32)
    -> Result<f64, Nd2Error> {
        let chunk = self.constants.frame_data_chunk(seq_index);
        let entry = self.index.get(&chunk).ok_or_else(|| Nd2Error::MissingFrame {
            seq_index,
            chunk : chunk.clone(),
        })?;
        let payload = read_chunk_data(reader, entry, self.constants.chunk_magic)?;
        f64_le(&payload, 0).map_err(|err| err.in_chunk(&chunk))
    }
}

/// Inflates a zlib stream that must decode to exactly
/// `expected` bytes. Extra output is counted but not kept.
///
/// `expected` comes from the file, so the buffer only grows
/// as the stream actually produces output.
fn inflate(compressed : &[u8], expected : u64, chunk : &str) -> Result<Vec<u8>, Nd2Error> {
    let mut decoder = ZlibDecoder::new(compressed);
    let initial = expected.min(compressed.len() as u64 * INITIAL_INFLATE_RATIO);
    let mut data = Vec::with_capacity(initial as usize);

    let corrupt = |err : io::Error| Nd2Error::FormatError(
        format!("in chunk `{}`: zlib stream is corrupt: {}", chunk, err)
    );

    (&mut decoder).take(expected).read_to_end(&mut data).map_err(corrupt)?;
    let extra = io::copy(&mut decoder, &mut io::sink()).map_err(corrupt)?;

    let actual = data.len() as u64 + extra;
    if actual != expected {
        return Err(Nd2Error::SizeMismatch {
            chunk : chunk.to_string(),
            expected,
            actual,
        });
    }
    Ok(data)
}
