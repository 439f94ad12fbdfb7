use std::io::{
    Read,
    Seek,
    SeekFrom,
    Error as IOError,
    ErrorKind as IOErrorKind,
};

use binrw::{BinRead, meta::ReadEndian};

use crate::error::Nd2Error;

/// Random-access reader over a whole file (or anything else
/// that can `Read` and `Seek`). Every read is positioned
/// and bounds-checked against the size measured at
/// construction, so a bad offset in a directory turns into
/// an error instead of a short read.
pub struct BinaryReader<R> {
    inner : R,
    file_size : u64,
}

impl<R : Read + Seek> BinaryReader<R> {
    /// Wraps `inner`, measuring its size by seeking to the end.
    pub fn new(mut inner : R) -> Result<Self, Nd2Error> {
        let file_size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(BinaryReader { inner, file_size })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns `true` if `length` bytes starting at `offset`
    /// lie entirely inside the file.
    pub fn contains(&self, offset : u64, length : u64) -> bool {
        offset.checked_add(length)
            .map_or(false, |end| end <= self.file_size)
    }

    /// Reads exactly `length` bytes starting at `offset`.
    ///
    /// ## Errors
    ///
    /// * `Nd2Error::IOError` - if the range extends past the end
    /// of the file or the underlying read fails.
    pub fn read_at(&mut self, offset : u64, length : u64) -> Result<Vec<u8>, Nd2Error> {
        if !self.contains(offset, length) {
            return Err(IOError::new(
                IOErrorKind::UnexpectedEof,
                format!(
                    "read of {} bytes at offset {} exceeds file size {}",
                    length, offset, self.file_size
                )
            ).into());
        }
        let length = usize::try_from(length).map_err(|_| IOError::new(
            IOErrorKind::InvalidInput,
            format!("read of {} bytes does not fit in memory", length)
        ))?;

        self.inner.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0; length];
        self.inner.read_exact(&mut data)?;
        Ok(data)
    }

    /// Decodes a fixed-layout `binrw` record starting at `offset`.
    pub fn read_record<'a, T>(&mut self, offset : u64, args : T::Args<'a>)
    -> Result<T, Nd2Error> where T : BinRead + ReadEndian {
        if offset > self.file_size {
            return Err(IOError::new(
                IOErrorKind::UnexpectedEof,
                format!("record offset {} exceeds file size {}", offset, self.file_size)
            ).into());
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(T::read_args(&mut self.inner, args)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_inside_bounds() {
        let mut reader = BinaryReader::new(Cursor::new((0..32u8).collect::<Vec<_>>())).unwrap();
        assert_eq!(reader.file_size(), 32);
        assert_eq!(reader.read_at(4, 3).unwrap(), vec![4, 5, 6]);
        assert_eq!(reader.read_at(29, 3).unwrap(), vec![29, 30, 31]);
        assert!(reader.read_at(32, 0).unwrap().is_empty());
    }

    #[test]
    fn read_past_end_is_io_error() {
        let mut reader = BinaryReader::new(Cursor::new(vec![0u8; 16])).unwrap();
        match reader.read_at(10, 7) {
            Err(Nd2Error::IOError(err)) => {
                assert_eq!(err.kind(), IOErrorKind::UnexpectedEof);
            },
            other => panic!("expected IOError, got {:?}", other.map(|v| v.len())),
        }
        // overflow of offset + length is still just out of bounds
        assert!(matches!(reader.read_at(u64::MAX, 2), Err(Nd2Error::IOError(_))));
    }
}
