//! Decoder for the "lite variant" encoding used by every
//! metadata chunk. An item is
//!
//! ```text
//! [ u8 type ][ u8 name length in UTF-16 units, incl. NUL ][ UTF-16LE name ][ value ]
//! ```
//!
//! and a type 11 item is a nested level:
//!
//! ```text
//! [ u32 item count ][ u64 length from item start ][ items... ][ item count * u64 offsets ]
//! ```
//!
//! The tree produced here stays private to the metadata
//! module.

use crate::binary::ByteCursor;
use crate::error::Nd2Error;

/// Deeper nesting than this is treated as a malformed record.
const MAX_DEPTH : usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub (crate) enum LvValue {
    U8(u8),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F64(f64),
    Pointer(u64),
    Str(String),
    Bytes(Vec<u8>),
    Level(LvLevel),
}

/// An ordered list of named items. Names may repeat; lookups
/// return the first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub (crate) struct LvLevel {
    items : Vec<(String, LvValue)>,
}

impl LvLevel {
    pub fn get(&self, name : &str) -> Option<&LvValue> {
        self.items.iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn level(&self, name : &str) -> Option<&LvLevel> {
        match self.get(name)? {
            LvValue::Level(level) => Some(level),
            _ => None,
        }
    }

    /// Child levels in stored order, with their names
    pub fn levels(&self) -> impl Iterator<Item = (&str, &LvLevel)> {
        self.items.iter().filter_map(|(key, value)| match value {
            LvValue::Level(level) => Some((key.as_str(), level)),
            _ => None,
        })
    }

    /// Any non-negative integer item that fits in a `u32`
    pub fn u32(&self, name : &str) -> Option<u32> {
        match *self.get(name)? {
            LvValue::U8(v) => Some(v as u32),
            LvValue::U32(v) => Some(v),
            LvValue::I32(v) => u32::try_from(v).ok(),
            LvValue::U64(v) => u32::try_from(v).ok(),
            LvValue::I64(v) => u32::try_from(v).ok(),
            _ => None,
        }
    }

    /// Floating point items, or integers widened to `f64`
    pub fn f64(&self, name : &str) -> Option<f64> {
        match *self.get(name)? {
            LvValue::F64(v) => Some(v),
            LvValue::U8(v) => Some(v as f64),
            LvValue::U32(v) => Some(v as f64),
            LvValue::I32(v) => Some(v as f64),
            LvValue::U64(v) => Some(v as f64),
            LvValue::I64(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn string(&self, name : &str) -> Option<&str> {
        match self.get(name)? {
            LvValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn bytes(&self, name : &str) -> Option<&[u8]> {
        match self.get(name)? {
            LvValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn require_u32(&self, name : &str) -> Result<u32, Nd2Error> {
        self.u32(name).ok_or_else(|| Nd2Error::FormatError(
            format!("missing or non-integer field `{}`", name)
        ))
    }
}

fn decode_item(cursor : &mut ByteCursor, depth : usize) -> Result<(String, LvValue), Nd2Error> {
    let start = cursor.position();
    let type_tag = cursor.u8()?;
    let name_units = cursor.u8()? as usize;
    let name = cursor.wide_string(name_units)?;

    let value = match type_tag {
        1 => LvValue::U8(cursor.u8()?),
        2 => LvValue::I32(cursor.i32_le()?),
        3 => LvValue::U32(cursor.u32_le()?),
        4 => LvValue::I64(cursor.i64_le()?),
        5 => LvValue::U64(cursor.u64_le()?),
        6 => LvValue::F64(cursor.f64_le()?),
        7 => LvValue::Pointer(cursor.u64_le()?),
        8 => LvValue::Str(cursor.wide_cstring()?),
        9 => {
            let len = cursor.u64_le()?;
            let len = usize::try_from(len).map_err(|_| Nd2Error::FormatError(
                format!("byte array `{}` of {} bytes is too large", name, len)
            ))?;
            LvValue::Bytes(cursor.take(len)?.to_vec())
        },
        11 => {
            if depth >= MAX_DEPTH {
                return Err(Nd2Error::FormatError(format!(
                    "level `{}` nested deeper than {}", name, MAX_DEPTH
                )));
            }
            let count = cursor.u32_le()? as usize;
            let length = cursor.u64_le()?;
            let end = usize::try_from(length).ok()
                .and_then(|len| start.checked_add(len))
                .filter(|&end| end >= cursor.position())
                .ok_or_else(|| Nd2Error::FormatError(format!(
                    "level `{}` at position {} declares impossible length {}",
                    name, start, length
                )))?;

            let nested = cursor.take(end - cursor.position())?;
            let level = decode_items(nested, Some(count), depth + 1)?;
            // skip the offset table
            cursor.take(count.saturating_mul(8))?;
            LvValue::Level(level)
        },
        other => {
            return Err(Nd2Error::FormatError(format!(
                "unknown item type {} for `{}` at position {}", other, name, start
            )));
        },
    };
    Ok((name, value))
}

fn decode_items(data : &[u8], count : Option<usize>, depth : usize) -> Result<LvLevel, Nd2Error> {
    let mut cursor = ByteCursor::new(data);
    let mut level = LvLevel::default();
    loop {
        match count {
            Some(count) if level.items.len() == count => break,
            // Top-level records may be followed by zero padding
            None if cursor.is_empty() || data[cursor.position()] == 0 => break,
            _ => {},
        }
        level.items.push(decode_item(&mut cursor, depth)?);
    }
    Ok(level)
}

/// Decodes every top-level item of a chunk payload.
pub (crate) fn decode(data : &[u8]) -> Result<LvLevel, Nd2Error> {
    decode_items(data, None, 0)
}

/// Decodes a chunk payload and returns the level named
/// `root`, which is how every metadata record is wrapped.
pub (crate) fn decode_record(data : &[u8], root : &str) -> Result<LvLevel, Nd2Error> {
    decode(data)?.items.into_iter()
        .find_map(|(key, value)| match value {
            LvValue::Level(level) if key == root => Some(level),
            _ => None,
        })
        .ok_or_else(|| Nd2Error::FormatError(format!("no `{}` record", root)))
}
