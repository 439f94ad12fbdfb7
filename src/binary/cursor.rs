//! Little-endian decoding over in-memory slices. Every
//! decoder checks the slice length first and reports a
//! `FormatError` with the position, the number of bytes
//! needed and the number available.

use crate::error::Nd2Error;

fn short_slice(at : usize, needed : usize, available : usize) -> Nd2Error {
    Nd2Error::FormatError(format!(
        "needed {} bytes at position {}, only {} available",
        needed, at, available.saturating_sub(at)
    ))
}

fn array_at<const N : usize>(bytes : &[u8], at : usize) -> Result<[u8; N], Nd2Error> {
    bytes.get(at..at.saturating_add(N))
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| short_slice(at, N, bytes.len()))
}

pub fn u32_le(bytes : &[u8], at : usize) -> Result<u32, Nd2Error> {
    Ok(u32::from_le_bytes(array_at(bytes, at)?))
}

pub fn u64_le(bytes : &[u8], at : usize) -> Result<u64, Nd2Error> {
    Ok(u64::from_le_bytes(array_at(bytes, at)?))
}

pub fn f64_le(bytes : &[u8], at : usize) -> Result<f64, Nd2Error> {
    Ok(f64::from_le_bytes(array_at(bytes, at)?))
}

/// Decodes a fixed-length UTF-16LE string of `units` code
/// units starting at `at`. Anything from the first NUL on
/// is dropped.
pub fn wide_string(bytes : &[u8], at : usize, units : usize) -> Result<String, Nd2Error> {
    let byte_len = units.checked_mul(2)
        .ok_or_else(|| short_slice(at, usize::MAX, bytes.len()))?;
    let raw = bytes.get(at..at.saturating_add(byte_len))
        .ok_or_else(|| short_slice(at, byte_len, bytes.len()))?;

    let code_units : Vec<u16> = raw.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();

    String::from_utf16(&code_units).map_err(|_| Nd2Error::FormatError(
        format!("invalid UTF-16 string at position {}", at)
    ))
}

/// A read position over a borrowed slice, for records that
/// are decoded field by field.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data : &'a [u8],
    pos : usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data : &'a [u8]) -> Self {
        ByteCursor { data, pos : 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Moves to an absolute position. Moving exactly to the
    /// end is allowed, past it is not.
    pub fn seek(&mut self, pos : usize) -> Result<(), Nd2Error> {
        if pos > self.data.len() {
            return Err(short_slice(self.pos, pos - self.pos.min(pos), self.data.len()));
        }
        self.pos = pos;
        Ok(())
    }

    /// Borrows the next `n` bytes and advances past them.
    pub fn take(&mut self, n : usize) -> Result<&'a [u8], Nd2Error> {
        let data : &'a [u8] = self.data;
        let slice = data.get(self.pos..self.pos.saturating_add(n))
            .ok_or_else(|| short_slice(self.pos, n, data.len()))?;
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, Nd2Error> {
        Ok(self.take(1)?[0])
    }

    pub fn i32_le(&mut self) -> Result<i32, Nd2Error> {
        let value = i32::from_le_bytes(array_at(self.data, self.pos)?);
        self.pos += 4;
        Ok(value)
    }

    pub fn u32_le(&mut self) -> Result<u32, Nd2Error> {
        let value = u32_le(self.data, self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    pub fn i64_le(&mut self) -> Result<i64, Nd2Error> {
        let value = i64::from_le_bytes(array_at(self.data, self.pos)?);
        self.pos += 8;
        Ok(value)
    }

    pub fn u64_le(&mut self) -> Result<u64, Nd2Error> {
        let value = u64_le(self.data, self.pos)?;
        self.pos += 8;
        Ok(value)
    }

    pub fn f64_le(&mut self) -> Result<f64, Nd2Error> {
        let value = f64_le(self.data, self.pos)?;
        self.pos += 8;
        Ok(value)
    }

    /// Fixed-length UTF-16LE string of `units` code units.
    pub fn wide_string(&mut self, units : usize) -> Result<String, Nd2Error> {
        let value = wide_string(self.data, self.pos, units)?;
        self.pos += units * 2;
        Ok(value)
    }

    /// UTF-16LE string terminated by a NUL code unit. The
    /// terminator is consumed but not returned.
    pub fn wide_cstring(&mut self) -> Result<String, Nd2Error> {
        let start = self.pos;
        let mut units = 0;
        loop {
            let pair = array_at::<2>(self.data, start + units * 2)
                .map_err(|_| Nd2Error::FormatError(format!(
                    "unterminated UTF-16 string starting at position {}", start
                )))?;
            units += 1;
            if pair == [0, 0] {
                break;
            }
        }
        self.wide_string(units)
    }
}
