//! Byte-for-byte transcoders: UTF-8/ASCII pass-through and Latin-1 widening.

use std::io::Read;

use super::{read_chunk, ByteSource, CHUNK_SIZE};
use crate::gedcom::types::error::Result;

/// Forwards bytes unchanged. Validation happens downstream.
#[derive(Debug)]
pub struct Passthrough<R> {
    inner: R,
}

impl<R: Read> Passthrough<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> ByteSource for Passthrough<R> {
    fn read_into(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let start = out.len();
        out.resize(start + CHUNK_SIZE, 0);
        match read_chunk(&mut self.inner, &mut out[start..]) {
            Ok(n) => {
                out.truncate(start + n);
                Ok(n)
            }
            Err(e) => {
                out.truncate(start);
                Err(e)
            }
        }
    }
}

/// ISO-8859-1: every byte is the code point of the same value.
#[derive(Debug)]
pub struct Latin1Decoder<R> {
    inner: R,
}

impl<R: Read> Latin1Decoder<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> ByteSource for Latin1Decoder<R> {
    fn read_into(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = read_chunk(&mut self.inner, &mut chunk)?;
        let start = out.len();
        let mut utf8 = [0u8; 2];
        for &byte in &chunk[..n] {
            if byte.is_ascii() {
                out.push(byte);
            } else {
                out.extend_from_slice(char::from(byte).encode_utf8(&mut utf8).as_bytes());
            }
        }
        Ok(out.len() - start)
    }
}
