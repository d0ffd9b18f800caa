//! Low-level helpers for the binary index format.
//!
//! All numbers are big-endian. Strings are a `u32` byte length followed
//! by UTF-8 bytes.

use std::io::Write;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::gedcom::types::error::{GedcomError, Result};

fn truncated(what: &str) -> GedcomError {
    GedcomError::CorruptIndex(format!("truncated while reading {what}"))
}

pub fn read_u8(reader: &mut &[u8], what: &str) -> Result<u8> {
    reader.read_u8().map_err(|_| truncated(what))
}

pub fn read_u32(reader: &mut &[u8], what: &str) -> Result<u32> {
    reader.read_u32::<BigEndian>().map_err(|_| truncated(what))
}

pub fn read_u64(reader: &mut &[u8], what: &str) -> Result<u64> {
    reader.read_u64::<BigEndian>().map_err(|_| truncated(what))
}

/// Reads a length-prefixed UTF-8 string and advances the slice.
pub fn read_string(reader: &mut &[u8], what: &str) -> Result<String> {
    let len = read_u32(reader, what)? as usize;
    if reader.len() < len {
        return Err(truncated(what));
    }
    let (bytes, rest) = reader.split_at(len);
    *reader = rest;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| GedcomError::CorruptIndex(format!("{what} is not valid UTF-8")))
}

pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let len = u32::try_from(value.len())
        .map_err(|_| GedcomError::CorruptIndex(format!("string of {} bytes is too long", value.len())))?;
    writer.write_u32::<BigEndian>(len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}
