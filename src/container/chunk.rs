use std::io::{Read, Seek};

use binrw::BinRead;

use crate::{
    binary::BinaryReader,
    container::ChunkIndexEntry,
    error::Nd2Error,
};

/// Bytes of header preceding a chunk's name.
pub const CHUNK_HEADER_LEN : u64 = 16;

/// The fixed header at the start of every chunk. The magic
/// is passed in from the `FormatConstants` so a mismatch
/// fails the read.
#[derive(BinRead, Debug, Clone, PartialEq)]
#[br(little, import(expected_magic : u32))]
pub struct ChunkHeader {
    #[br(assert(
        magic == expected_magic,
        "chunk magic {:#010x} does not match {:#010x}", magic, expected_magic
    ))]
    pub magic : u32,
    pub name_length : u32,
    pub data_length : u64,
}

impl ChunkHeader {
    /// Bytes occupied by header, name and payload together
    pub fn span(&self) -> u64 {
        CHUNK_HEADER_LEN + self.name_length as u64 + self.data_length
    }
}

/// A chunk read directly from an offset, with its name and payload.
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub offset : u64,
    pub header : ChunkHeader,
    pub name : Vec<u8>,
    pub data : Vec<u8>,
}

fn read_header<R : Read + Seek>(reader : &mut BinaryReader<R>, offset : u64, magic : u32)
-> Result<ChunkHeader, Nd2Error> {
    if !reader.contains(offset, CHUNK_HEADER_LEN) {
        return Err(Nd2Error::CorruptContainer {
            offset,
            reason : format!(
                "chunk header does not fit in a file of {} bytes",
                reader.file_size()
            ),
        });
    }
    let header : ChunkHeader = reader.read_record(offset, (magic,))?;
    if !reader.contains(offset, header.span()) {
        return Err(Nd2Error::CorruptContainer {
            offset,
            reason : format!(
                "chunk of {} bytes runs past the end of a file of {} bytes",
                header.span(), reader.file_size()
            ),
        });
    }
    Ok(header)
}

/// Reads the chunk whose header starts at `offset`, without
/// consulting the chunk map. Used for the signature chunk
/// and the chunk map itself.
pub fn read_chunk<R : Read + Seek>(reader : &mut BinaryReader<R>, offset : u64, magic : u32)
-> Result<RawChunk, Nd2Error> {
    let header = read_header(reader, offset, magic)?;
    let name = reader.read_at(offset + CHUNK_HEADER_LEN, header.name_length as u64)?;
    let data = reader.read_at(
        offset + CHUNK_HEADER_LEN + header.name_length as u64,
        header.data_length
    )?;
    Ok(RawChunk { offset, header, name, data })
}

/// Reads the payload of a chunk listed in the chunk map,
/// checking that the header agrees with the map about how
/// large the chunk is.
///
/// ## Errors
///
/// * `Nd2Error::CorruptContainer` - if the header magic is wrong
/// * `Nd2Error::SizeMismatch` - if the header describes a chunk
/// larger than the map entry allows
pub fn read_chunk_data<R : Read + Seek>(
    reader : &mut BinaryReader<R>,
    entry : &ChunkIndexEntry,
    magic : u32,
    ) -> Result<Vec<u8>, Nd2Error> {
    let header = read_header(reader, entry.offset, magic)?;
    if header.span() > entry.length {
        return Err(Nd2Error::SizeMismatch {
            chunk : entry.name.clone(),
            expected : entry.length,
            actual : header.span(),
        });
    }
    reader.read_at(
        entry.offset + CHUNK_HEADER_LEN + header.name_length as u64,
        header.data_length
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MAGIC : u32 = 0x0ABE_CEDA;

    fn chunk_bytes(magic : u32, name : &[u8], data : &[u8]) -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend_from_slice(&magic.to_le_bytes());
        bytes.extend_from_slice(&(name.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u64).to_le_bytes());
        bytes.extend_from_slice(name);
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn reads_name_and_payload() {
        let mut bytes = vec![0xFF; 5];
        bytes.extend(chunk_bytes(MAGIC, b"Abc!", b"payload"));
        let mut reader = BinaryReader::new(Cursor::new(bytes)).unwrap();

        let chunk = read_chunk(&mut reader, 5, MAGIC).unwrap();
        assert_eq!(chunk.name, b"Abc!");
        assert_eq!(chunk.data, b"payload");
        assert_eq!(chunk.header.span(), 16 + 4 + 7);

        let entry = ChunkIndexEntry { name : "Abc!".to_string(), offset : 5, length : 27 };
        assert_eq!(read_chunk_data(&mut reader, &entry, MAGIC).unwrap(), b"payload");
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let bytes = chunk_bytes(0xDEAD_BEEF, b"Abc!", b"x");
        let mut reader = BinaryReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            read_chunk(&mut reader, 0, MAGIC),
            Err(Nd2Error::CorruptContainer{offset : 0, ..})
        ));
    }

    #[test]
    fn header_larger_than_entry_is_size_mismatch() {
        let bytes = chunk_bytes(MAGIC, b"Abc!", b"payload");
        let mut reader = BinaryReader::new(Cursor::new(bytes)).unwrap();
        let entry = ChunkIndexEntry { name : "Abc!".to_string(), offset : 0, length : 20 };
        match read_chunk_data(&mut reader, &entry, MAGIC) {
            Err(Nd2Error::SizeMismatch{expected, actual, ..}) => {
                assert_eq!((expected, actual), (20, 27));
            },
            other => panic!("expected SizeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let mut bytes = chunk_bytes(MAGIC, b"Abc!", b"payload");
        bytes.truncate(22);
        let mut reader = BinaryReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            read_chunk(&mut reader, 0, MAGIC),
            Err(Nd2Error::CorruptContainer{..})
        ));
    }
}
