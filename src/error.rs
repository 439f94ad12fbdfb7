//! The single error type returned by every fallible
//! operation in the crate. Each variant carries enough
//! context (offsets, chunk names, sizes, dimensions) to
//! diagnose a bad file without stepping through the reader.

use crate::metadata::Compression;

/// Errors that can occur while opening or decoding an `.nd2`
/// container, either from the file system (the `IOError`
/// variant), from the bytes themselves, or from the values
/// of the requested frames and coordinates.
#[derive(Debug)]
pub enum Nd2Error {
    /// File system failure, or a read past the end of the file.
    IOError(std::io::Error),

    /// The file does not look like a container at all:
    /// bad signature, bad magic, or a directory pointing
    /// outside of the file.
    CorruptContainer{offset : u64, reason : String},

    /// A chunk the format declares mandatory is absent.
    MissingChunk{name : String},

    /// The chunk holding a requested frame is absent.
    MissingFrame{seq_index : u32, chunk : String},

    /// A record was truncated or otherwise malformed.
    FormatError(String),

    /// Decoded data disagrees with the size implied by
    /// the file's attributes.
    SizeMismatch{chunk : String, expected : u64, actual : u64},

    /// A loop coordinate was larger than its loop allows.
    /// `dimension` is the index in canonical
    /// (Time, MultiPoint, ZStack, Other) order.
    CoordinateOutOfRange{dimension : usize, requested : u32, max : u32},

    /// A frame index at or past `sequence_count`.
    FrameIndexOutOfRange{requested : u32, sequence_count : u32},

    /// The planes use a codec this crate cannot decode.
    UnsupportedCompression(Compression),

    /// The operation was attempted on a closed reader.
    InvalidState(&'static str),
}

impl Nd2Error {
    /// Prefixes a `FormatError` with the name of the chunk
    /// being decoded. Other variants pass through untouched.
    pub (crate) fn in_chunk(self, chunk : &str) -> Self {
        match self {
            Nd2Error::FormatError(msg) => {
                Nd2Error::FormatError(format!("in chunk `{}`: {}", chunk, msg))
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for Nd2Error {
    fn from(err : std::io::Error) -> Self {
        Nd2Error::IOError(err)
    }
}

impl From<binrw::Error> for Nd2Error {
    fn from(err : binrw::Error) -> Self {
        match err {
            binrw::Error::Io(io_err) => Nd2Error::IOError(io_err),
            binrw::Error::BadMagic { pos, .. } => {
                Nd2Error::CorruptContainer {
                    offset : pos,
                    reason : "bad chunk magic".to_string(),
                }
            },
            binrw::Error::AssertFail { pos, message } => {
                Nd2Error::CorruptContainer { offset : pos, reason : message }
            },
            other => Nd2Error::FormatError(other.to_string()),
        }
    }
}

impl std::error::Error for Nd2Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Nd2Error::IOError(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for Nd2Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Nd2Error::IOError(err) => {
                write!(f, "IOError: {}", err)
            },
            Nd2Error::CorruptContainer{offset, reason} => {
                write!(f, "CorruptContainer at byte {}: {}", offset, reason)
            },
            Nd2Error::MissingChunk{name} => {
                write!(f, "MissingChunk: `{}` not in chunk map", name)
            },
            Nd2Error::MissingFrame{seq_index, chunk} => {
                write!(f, "MissingFrame: frame {} (chunk `{}`) not in chunk map",
                    seq_index, chunk)
            },
            Nd2Error::FormatError(msg) => {
                write!(f, "FormatError: {}", msg)
            },
            Nd2Error::SizeMismatch{chunk, expected, actual} => {
                write!(f, "SizeMismatch in `{}`: expected {} bytes, found {}",
                    chunk, expected, actual)
            },
            Nd2Error::CoordinateOutOfRange{dimension, requested, max} => {
                write!(f, "CoordinateOutOfRange: dimension {} requested {}, max {}",
                    dimension, requested, max)
            },
            Nd2Error::FrameIndexOutOfRange{requested, sequence_count} => {
                write!(f, "FrameIndexOutOfRange: requested {} of {} frames",
                    requested, sequence_count)
            },
            Nd2Error::UnsupportedCompression(compression) => {
                write!(f, "UnsupportedCompression: {:?}", compression)
            },
            Nd2Error::InvalidState(op) => {
                write!(f, "InvalidState: `{}` called on a closed reader", op)
            },
        }
    }
}
