use crate::error::Nd2Error;
use crate::metadata::lite_variant::{decode_record, LvLevel};

const RECORD : &str = "SLxImageAttributes";

/// Rounds `n` up to the next multiple of 4, the row
/// alignment of every stored image.
pub fn align4(n : u64) -> u64 {
    n.saturating_add(3) & !3
}

/// How the pixel planes of a file are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// zlib-deflated planes
    Lossless,
    /// Proprietary lossy codec, not decodable here
    Lossy,
    None,
}

impl Compression {
    fn from_code(code : u32) -> Result<Self, Nd2Error> {
        match code {
            0 => Ok(Compression::Lossless),
            1 => Ok(Compression::Lossy),
            2 => Ok(Compression::None),
            other => Err(Nd2Error::FormatError(
                format!("unknown compression type {}", other)
            )),
        }
    }
}

/// Image geometry shared by every frame of a file. One per
/// file, read when the file is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    pub width_px : u32,
    pub height_px : u32,
    /// Row length as declared by the file
    pub width_bytes : u32,
    pub component_count : u32,
    pub bits_per_component_in_memory : u32,
    pub bits_per_component_significant : u32,
    pub sequence_count : u32,
    pub compression : Compression,
    /// zlib level or lossy quality, as stored
    pub compression_level : f64,
    pub tile_width : Option<u32>,
    pub tile_height : Option<u32>,
}

fn nonzero(level : &LvLevel, name : &str) -> Result<u32, Nd2Error> {
    match level.require_u32(name)? {
        0 => Err(Nd2Error::FormatError(format!("field `{}` is zero", name))),
        v => Ok(v),
    }
}

impl Attributes {
    /// Largest decoded frame a file may declare (1 TiB)
    pub const MAX_FRAME_BYTES : u64 = 1 << 40;

    /// Decodes the payload of the attributes chunk
    pub (crate) fn decode(data : &[u8]) -> Result<Self, Nd2Error> {
        let record = decode_record(data, RECORD)?;

        let attributes = Attributes {
            width_px : nonzero(&record, "uiWidth")?,
            height_px : nonzero(&record, "uiHeight")?,
            width_bytes : record.u32("uiWidthBytes").unwrap_or(0),
            component_count : nonzero(&record, "uiComp")?,
            bits_per_component_in_memory : nonzero(&record, "uiBpcInMemory")?,
            bits_per_component_significant : record.u32("uiBpcSignificant")
                .unwrap_or(0),
            sequence_count : record.require_u32("uiSequenceCount")?,
            compression : Compression::from_code(
                record.u32("eCompression").unwrap_or(2)
            )?,
            compression_level : record.f64("dCompressionParam").unwrap_or(0.0),
            tile_width : record.u32("uiTileWidth").filter(|&w| w != 0),
            tile_height : record.u32("uiTileHeight").filter(|&h| h != 0),
        };

        if attributes.bits_per_component_in_memory > 32 {
            return Err(Nd2Error::FormatError(format!(
                "{} bits per component", attributes.bits_per_component_in_memory
            )));
        }

        let frame_bytes = attributes.checked_frame_bytes()
            .filter(|&bytes| bytes <= Self::MAX_FRAME_BYTES)
            .filter(|&bytes| usize::try_from(bytes).is_ok());
        if frame_bytes.is_none() {
            return Err(Nd2Error::FormatError(format!(
                "{} x {} frames of {} components at {} bits are too large to decode",
                attributes.width_px,
                attributes.height_px,
                attributes.component_count,
                attributes.bits_per_component_in_memory,
            )));
        }

        if attributes.width_bytes != 0
            && attributes.width_bytes as u64 != attributes.stride_bytes() {
            tracing::warn!(
                declared = attributes.width_bytes,
                computed = attributes.stride_bytes(),
                "declared row length differs from the 4-byte aligned row; using the aligned row"
            );
        }
        Ok(attributes)
    }

    /// Whole bytes used to store one component in memory
    pub fn bytes_per_component(&self) -> u32 {
        let bits = self.bits_per_component_in_memory;
        bits / 8 + (bits % 8 != 0) as u32
    }

    /// Bytes from the start of one row to the next:
    /// `width * components * bytes per component`, padded to
    /// a multiple of 4. Saturates rather than wrapping, which
    /// only matters for attributes that did not come from
    /// `decode`.
    pub fn stride_bytes(&self) -> u64 {
        align4(
            (self.width_px as u64 * self.component_count as u64)
                .saturating_mul(self.bytes_per_component() as u64)
        )
    }

    /// Bytes of one decoded frame
    pub fn frame_bytes(&self) -> u64 {
        self.stride_bytes().saturating_mul(self.height_px as u64)
    }

    /// `frame_bytes`, or `None` if any step overflows
    fn checked_frame_bytes(&self) -> Option<u64> {
        (self.width_px as u64 * self.component_count as u64)
            .checked_mul(self.bytes_per_component() as u64)?
            .checked_add(3)
            .map(|row| row & !3)?
            .checked_mul(self.height_px as u64)
    }
}
