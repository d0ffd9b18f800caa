//! ANSEL (ANSI Z39.47) decoder, including the GEDCOM extensions.
//!
//! ANSEL stores a diacritic as a separate byte *before* the letter it
//! modifies; Unicode puts the combining mark *after* its base character.
//! The decoder holds combining marks back until the next base character
//! has been written, then emits them in their original order.
//!
//! Byte ranges:
//!
//! ```text
//! 0x00-0x7F  ASCII (base characters)
//! 0x80-0x9F  C1 controls (rejected)
//! 0xA1-0xCF  spacing graphic characters (partially defined)
//! 0xE0-0xFE  combining diacritics (partially defined)
//! ```

use std::io::Read;

use log::trace;

use super::{read_chunk, ByteSource, Position, CHUNK_SIZE};
use crate::gedcom::types::error::{EncodingErrorKind, GedcomError, Result};

/// A decoded ANSEL byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnselChar {
    Base(char),
    Combining(char),
}

/// Maps one ANSEL byte, or `None` if the byte is undefined.
fn map_byte(byte: u8) -> Option<AnselChar> {
    if byte.is_ascii() {
        return Some(AnselChar::Base(char::from(byte)));
    }
    let base = match byte {
        0xA1 => '\u{0141}', // Ł
        0xA2 => '\u{00D8}', // Ø
        0xA3 => '\u{0110}', // Đ
        0xA4 => '\u{00DE}', // Þ
        0xA5 => '\u{00C6}', // Æ
        0xA6 => '\u{0152}', // Œ
        0xA7 => '\u{02B9}', // soft sign
        0xA8 => '\u{00B7}', // middle dot
        0xA9 => '\u{266D}', // flat
        0xAA => '\u{00AE}', // registered
        0xAB => '\u{00B1}', // plus-minus
        0xAC => '\u{01A0}', // Ơ
        0xAD => '\u{01AF}', // Ư
        0xAE => '\u{02BC}', // alif
        0xB0 => '\u{02BB}', // ayn
        0xB1 => '\u{0142}', // ł
        0xB2 => '\u{00F8}', // ø
        0xB3 => '\u{0111}', // đ
        0xB4 => '\u{00FE}', // þ
        0xB5 => '\u{00E6}', // æ
        0xB6 => '\u{0153}', // œ
        0xB7 => '\u{02BA}', // hard sign
        0xB8 => '\u{0131}', // dotless i
        0xB9 => '\u{00A3}', // pound
        0xBA => '\u{00F0}', // eth
        0xBC => '\u{01A1}', // ơ
        0xBD => '\u{01B0}', // ư
        0xBE => '\u{25A1}', // empty box
        0xBF => '\u{25A0}', // black box
        0xC0 => '\u{00B0}', // degree
        0xC1 => '\u{2113}', // script l
        0xC2 => '\u{2117}', // sound recording copyright
        0xC3 => '\u{00A9}', // copyright
        0xC4 => '\u{266F}', // sharp
        0xC5 => '\u{00BF}', // inverted question mark
        0xC6 => '\u{00A1}', // inverted exclamation mark
        0xC7 => '\u{00DF}', // eszett
        0xC8 => '\u{20AC}', // euro
        0xCF => '\u{00DF}', // eszett (GEDCOM)
        _ => return map_combining(byte).map(AnselChar::Combining),
    };
    Some(AnselChar::Base(base))
}

fn map_combining(byte: u8) -> Option<char> {
    let mark = match byte {
        0xE0 => '\u{0309}', // hook above
        0xE1 => '\u{0300}', // grave
        0xE2 => '\u{0301}', // acute
        0xE3 => '\u{0302}', // circumflex
        0xE4 => '\u{0303}', // tilde
        0xE5 => '\u{0304}', // macron
        0xE6 => '\u{0306}', // breve
        0xE7 => '\u{0307}', // dot above
        0xE8 => '\u{0308}', // diaeresis
        0xE9 => '\u{030C}', // caron
        0xEA => '\u{030A}', // ring above
        0xEB => '\u{FE20}', // ligature, left half
        0xEC => '\u{FE21}', // ligature, right half
        0xED => '\u{0315}', // comma above right
        0xEE => '\u{030B}', // double acute
        0xEF => '\u{0310}', // candrabindu
        0xF0 => '\u{0327}', // cedilla
        0xF1 => '\u{0328}', // ogonek
        0xF2 => '\u{0323}', // dot below
        0xF3 => '\u{0324}', // diaeresis below
        0xF4 => '\u{0325}', // ring below
        0xF5 => '\u{0333}', // double low line
        0xF6 => '\u{0332}', // low line
        0xF7 => '\u{0326}', // comma below
        0xF8 => '\u{031C}', // left half ring below
        0xF9 => '\u{032E}', // breve below
        0xFA => '\u{FE22}', // double tilde, left half
        0xFB => '\u{FE23}', // double tilde, right half
        0xFE => '\u{0313}', // comma above
        _ => return None,
    };
    Some(mark)
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut utf8 = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
}

/// Streaming ANSEL to UTF-8 transcoder.
#[derive(Debug)]
pub struct AnselDecoder<R> {
    inner: R,
    /// Combining marks waiting for their base character.
    pending: Vec<char>,
    position: Position,
    finished: bool,
    /// Error held back until the text decoded before it has been handed out.
    deferred: Option<GedcomError>,
}

impl<R: Read> AnselDecoder<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            position: Position::default(),
            finished: false,
            deferred: None,
        }
    }

    fn decode_byte(&mut self, byte: u8, out: &mut Vec<u8>) -> Result<()> {
        match map_byte(byte) {
            Some(AnselChar::Combining(mark)) => self.pending.push(mark),
            Some(AnselChar::Base(c)) => {
                push_char(out, c);
                for mark in self.pending.drain(..) {
                    push_char(out, mark);
                }
            }
            None => {
                return Err(GedcomError::Encoding {
                    line: self.position.line,
                    column: self.position.column,
                    kind: EncodingErrorKind::UndefinedByte {
                        encoding: "ANSEL",
                        byte,
                    },
                })
            }
        }
        self.position.advance(char::from(byte));
        Ok(())
    }
}

impl<R: Read> ByteSource for AnselDecoder<R> {
    fn read_into(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        let start = out.len();
        let mut chunk = [0u8; CHUNK_SIZE];
        while out.len() == start && !self.finished {
            let n = read_chunk(&mut self.inner, &mut chunk)?;
            if n == 0 {
                self.finished = true;
                // Marks with no base character left: emitted as-is, unattached.
                if !self.pending.is_empty() {
                    trace!("Flushing {} dangling ANSEL combining mark(s)", self.pending.len());
                }
                for mark in self.pending.drain(..) {
                    push_char(out, mark);
                }
                break;
            }
            for &byte in &chunk[..n] {
                if let Err(err) = self.decode_byte(byte, out) {
                    if out.len() == start {
                        return Err(err);
                    }
                    self.deferred = Some(err);
                    self.finished = true;
                    break;
                }
            }
        }
        Ok(out.len() - start)
    }
}
