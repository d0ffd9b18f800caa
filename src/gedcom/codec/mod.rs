//! Codec layer: turns arbitrary input bytes into validated UTF-8 text.
//!
//! # Pipeline
//!
//! ```text
//! raw bytes ─► detect::open() ─► Transcoder ─► Utf8Validator ─► text
//!              (BOM / 1 CHAR)    (ByteSource)   (TextSource)
//! ```
//!
//! The composition is chosen once per stream: [`Transcoder`] is an enum,
//! so every call is statically dispatched.
//!
//! # Submodules
//!
//! - [`detect`]: byte-order mark and in-band declaration sniffing
//! - [`ansel`]: ANSEL decoder with combining-mark reordering
//! - [`utf16`]: UTF-16 LE/BE decoding
//! - [`single_byte`]: UTF-8 pass-through and Latin-1 widening
//! - [`validate`]: UTF-8 validation with line/column tracking

use std::io::{ErrorKind, Read};

use crate::gedcom::types::error::Result;
use crate::gedcom::types::models::Encoding;

pub mod ansel;
pub mod detect;
pub mod single_byte;
pub mod utf16;
pub mod validate;

pub use detect::{open, Detection};
pub use validate::Utf8Validator;

/// Size of each read from the underlying stream.
pub(crate) const CHUNK_SIZE: usize = 8 * 1024;

/// A byte source that yields UTF-8 encoded bytes.
///
/// The output is not yet validated; [`Utf8Validator`] does that.
pub trait ByteSource {
    /// Appends decoded bytes to `out` and returns how many were appended.
    ///
    /// Returns `Ok(0)` only at end of input.
    fn read_into(&mut self, out: &mut Vec<u8>) -> Result<usize>;
}

/// A source of validated UTF-8 text.
pub trait TextSource {
    /// Appends text to `out` and returns the number of bytes appended.
    ///
    /// Returns `Ok(0)` only at end of input.
    fn read_text(&mut self, out: &mut String) -> Result<usize>;
}

/// The transcoder selected for a stream's encoding.
#[derive(Debug)]
pub enum Transcoder<R> {
    Passthrough(single_byte::Passthrough<R>),
    Latin1(single_byte::Latin1Decoder<R>),
    Ansel(ansel::AnselDecoder<R>),
    Utf16(utf16::Utf16Decoder<R>),
}

impl<R: Read> Transcoder<R> {
    pub fn new(encoding: Encoding, reader: R) -> Self {
        match encoding {
            Encoding::Unknown | Encoding::Utf8 | Encoding::Ascii => {
                Transcoder::Passthrough(single_byte::Passthrough::new(reader))
            }
            Encoding::Latin1 => Transcoder::Latin1(single_byte::Latin1Decoder::new(reader)),
            Encoding::Ansel => Transcoder::Ansel(ansel::AnselDecoder::new(reader)),
            Encoding::Utf16Le => Transcoder::Utf16(utf16::Utf16Decoder::new(reader, false)),
            Encoding::Utf16Be => Transcoder::Utf16(utf16::Utf16Decoder::new(reader, true)),
        }
    }
}

impl<R: Read> ByteSource for Transcoder<R> {
    fn read_into(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        match self {
            Transcoder::Passthrough(inner) => inner.read_into(out),
            Transcoder::Latin1(inner) => inner.read_into(out),
            Transcoder::Ansel(inner) => inner.read_into(out),
            Transcoder::Utf16(inner) => inner.read_into(out),
        }
    }
}

/// Validated text decoded from a reader.
pub type TextReader<R> = Utf8Validator<Transcoder<R>>;

/// Builds the decoding pipeline for an already-known encoding.
///
/// No detection happens here: `reader` must be positioned past any BOM.
/// Used for resumed streaming and for re-reading indexed slices.
pub fn decode_with<R: Read>(encoding: Encoding, reader: R) -> TextReader<R> {
    Utf8Validator::new(Transcoder::new(encoding, reader))
}

/// Reads into `buf`, retrying on interruption.
pub(crate) fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// 1-based line/column cursor used for encoding error positions.
///
/// `\n`, `\r\n` and bare `\r` each count as one line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u64,
    pub column: u64,
    after_cr: bool,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            after_cr: false,
        }
    }
}

impl Position {
    pub fn advance(&mut self, c: char) {
        match c {
            '\n' if self.after_cr => self.after_cr = false,
            '\n' | '\r' => {
                self.line += 1;
                self.column = 1;
                self.after_cr = c == '\r';
            }
            _ => {
                self.column += 1;
                self.after_cr = false;
            }
        }
    }

    pub fn advance_str(&mut self, text: &str) {
        text.chars().for_each(|c| self.advance(c));
    }
}
