//! The chunk map: a directory of every named chunk in the
//! file, stored as a chunk of its own and located through
//! a footer at the very end of the file.
//!
//! Footer layout:
//!
//! ```text
//! [ chunk map signature ][ u64 offset of the chunk map chunk ]
//! ```
//!
//! Chunk map payload, repeated until a record named with
//! the signature itself:
//!
//! ```text
//! [ name ending in '!' ][ u64 offset ][ u64 length ]
//! ```

use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::{
    binary::{BinaryReader, ByteCursor},
    container::{FormatConstants, read_chunk},
    error::Nd2Error,
};

/// Where one named chunk lives in the file. `offset` points
/// at the chunk header and `length` covers header, name
/// and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkIndexEntry {
    pub name : String,
    pub offset : u64,
    pub length : u64,
}

/// Every chunk in the file, keyed by its full name
/// (terminator included). Built once when the file is
/// opened and never modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct ChunkIndex {
    entries : HashMap<String, ChunkIndexEntry>,
}

impl ChunkIndex {
    /// Locates the footer, follows it to the chunk map and
    /// walks the map's records.
    ///
    /// ## Arguments
    ///
    /// * `reader` - The reader of the whole file
    ///
    /// * `constants` - Signatures and magic to validate against
    ///
    /// ## Errors
    ///
    /// * `Nd2Error::CorruptContainer` - if the footer signature is wrong,
    /// the map is unterminated, or any entry lies outside the file.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let mut reader = BinaryReader::new(File::open("file.nd2")?)?;
    /// let index = ChunkIndex::parse(&mut reader, &FormatConstants::default())?;
    /// println!("{} chunks", index.len());
    /// ```
    pub fn parse<R : Read + Seek>(
        reader : &mut BinaryReader<R>,
        constants : &FormatConstants,
        ) -> Result<Self, Nd2Error> {
        let file_size = reader.file_size();
        let footer_len = constants.footer_len();
        if file_size < footer_len {
            return Err(Nd2Error::CorruptContainer {
                offset : 0,
                reason : format!(
                    "file of {} bytes is too short to hold a {} byte footer",
                    file_size, footer_len
                ),
            });
        }

        let footer_offset = file_size - footer_len;
        let footer = reader.read_at(footer_offset, footer_len)?;
        let signature = constants.chunk_map_signature.as_bytes();
        if &footer[..signature.len()] != signature {
            return Err(Nd2Error::CorruptContainer {
                offset : footer_offset,
                reason : "footer signature does not match".to_string(),
            });
        }
        let map_offset = ByteCursor::new(&footer[signature.len()..]).u64_le()?;

        let map_chunk = read_chunk(reader, map_offset, constants.chunk_magic)?;
        if map_chunk.name.as_slice() != constants.chunk_map_name.as_bytes() {
            return Err(Nd2Error::CorruptContainer {
                offset : map_offset,
                reason : format!(
                    "footer points at `{}`, not the chunk map",
                    String::from_utf8_lossy(&map_chunk.name)
                ),
            });
        }

        let index = Self::from_map_payload(&map_chunk.data, file_size, constants)
            .map_err(|err| match err {
                Nd2Error::FormatError(msg) => Nd2Error::CorruptContainer {
                    offset : map_offset,
                    reason : format!("truncated chunk map: {}", msg),
                },
                other => other,
            })?;

        tracing::debug!(
            chunks = index.len(),
            map_offset,
            "parsed chunk map"
        );
        Ok(index)
    }

    /// Walks the records of a chunk map payload, validating
    /// every entry against `file_size`.
    fn from_map_payload(
        payload : &[u8],
        file_size : u64,
        constants : &FormatConstants,
        ) -> Result<Self, Nd2Error> {
        let mut index = ChunkIndex::default();
        let mut cursor = ByteCursor::new(payload);

        loop {
            let start = cursor.position();
            let name_len = payload[start..].iter()
                .position(|&b| b == constants.name_terminator)
                .map(|pos| pos + 1)
                .ok_or_else(|| Nd2Error::FormatError(format!(
                    "no terminated chunk name after position {}", start
                )))?;

            let name = std::str::from_utf8(cursor.take(name_len)?)
                .map_err(|_| Nd2Error::FormatError(format!(
                    "chunk name at position {} is not UTF-8", start
                )))?
                .to_string();
            let offset = cursor.u64_le()?;
            let length = cursor.u64_le()?;

            if name == constants.chunk_map_signature {
                break;
            }

            if offset.checked_add(length).map_or(true, |end| end > file_size) {
                return Err(Nd2Error::CorruptContainer {
                    offset,
                    reason : format!(
                        "chunk `{}` of {} bytes exceeds file size {}",
                        name, length, file_size
                    ),
                });
            }

            index.insert(ChunkIndexEntry { name, offset, length });
        }
        Ok(index)
    }

    /// Adds an entry. When the name is already present, the
    /// entry further into the file wins (rewritten chunks are
    /// appended), and an equal offset goes to the newcomer.
    fn insert(&mut self, entry : ChunkIndexEntry) {
        if let Some(existing) = self.entries.get(&entry.name) {
            tracing::warn!(
                chunk = %entry.name,
                kept_offset = existing.offset.max(entry.offset),
                dropped_offset = existing.offset.min(entry.offset),
                "duplicate chunk name in chunk map"
            );
            if existing.offset > entry.offset {
                return;
            }
        }
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name : &str) -> Option<&ChunkIndexEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name : &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &ChunkIndexEntry> {
        self.entries.values()
    }

    /// Number of entries whose name starts with `prefix`
    pub fn count_prefixed(&self, prefix : &str) -> usize {
        self.entries.keys().filter(|name| name.starts_with(prefix)).count()
    }
}
