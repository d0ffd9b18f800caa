//! Encoding detection from byte-order marks and the `1 CHAR` declaration.
//!
//! Priority (highest → lowest):
//! 1. UTF-16 byte-order mark (`FF FE` / `FE FF`)
//! 2. Caller override ([`ParseOptions::encoding`](crate::ParseOptions))
//! 3. UTF-8 byte-order mark (`EF BB BF`)
//! 4. `1 CHAR <name>` within the first [`SCAN_LIMIT`] bytes
//! 5. UTF-8

use std::io::{Chain, Cursor, Read};
use std::sync::OnceLock;

use log::debug;
use regex::bytes::Regex;

use super::{decode_with, read_chunk, TextReader};
use crate::gedcom::types::error::Result;
use crate::gedcom::types::models::Encoding;

/// How far into the stream the `1 CHAR` declaration is searched for.
pub const SCAN_LIMIT: usize = 1000;

const BOM_UTF16LE: [u8; 2] = [0xFF, 0xFE];
const BOM_UTF16BE: [u8; 2] = [0xFE, 0xFF];
const BOM_UTF8: [u8; 3] = [0xEF, 0xBB, 0xBF];

static CHAR_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Matches `1 CHAR <name>` at the start of the input or of any line.
fn char_regex() -> &'static Regex {
    CHAR_PATTERN.get_or_init(|| {
        Regex::new(r"(?i-u)(?:\A|[\r\n])[ \t]*1[ \t]+CHAR[ \t]+([^\s]+)")
            .expect("Invalid CHAR declaration pattern")
    })
}

/// Outcome of encoding detection for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub encoding: Encoding,
    /// Length of the byte-order mark that was skipped.
    pub bom_len: u64,
}

/// Reads the encoding name out of a `1 CHAR` declaration, if present.
pub fn declared_encoding(prefix: &[u8]) -> Option<&str> {
    let window = &prefix[..prefix.len().min(SCAN_LIMIT)];
    let captures = char_regex().captures(window)?;
    std::str::from_utf8(captures.get(1)?.as_bytes()).ok()
}

/// Length of the byte-order mark at the start of `prefix`, if any.
pub fn bom_len(prefix: &[u8]) -> u64 {
    if prefix.starts_with(&BOM_UTF8) {
        3
    } else if prefix.starts_with(&BOM_UTF16LE) || prefix.starts_with(&BOM_UTF16BE) {
        2
    } else {
        0
    }
}

/// Decides the encoding of a stream from its first bytes.
pub fn detect(prefix: &[u8], requested: Option<Encoding>) -> Detection {
    if prefix.starts_with(&BOM_UTF16LE) {
        debug!("UTF-16LE byte-order mark found");
        return Detection { encoding: Encoding::Utf16Le, bom_len: 2 };
    }
    if prefix.starts_with(&BOM_UTF16BE) {
        debug!("UTF-16BE byte-order mark found");
        return Detection { encoding: Encoding::Utf16Be, bom_len: 2 };
    }

    let bom_len = bom_len(prefix);
    if let Some(encoding) = requested {
        debug!("Using caller-requested encoding {}", encoding);
        return Detection { encoding, bom_len };
    }
    if bom_len > 0 {
        debug!("UTF-8 byte-order mark found");
        return Detection { encoding: Encoding::Utf8, bom_len };
    }

    let encoding = match declared_encoding(prefix) {
        Some(label) => match Encoding::from_label(label) {
            Some(encoding) => {
                debug!("Declared encoding '{}' resolved to {}", label, encoding);
                encoding
            }
            None => {
                debug!("Unrecognized declared encoding '{}', falling back to UTF-8", label);
                Encoding::Utf8
            }
        },
        None => {
            debug!("No encoding declaration found, assuming UTF-8");
            Encoding::Utf8
        }
    };
    Detection { encoding, bom_len: 0 }
}

/// Sniffs `reader`, then returns the detected encoding and a text source
/// over the whole stream minus its byte-order mark.
pub fn open<R: Read>(
    mut reader: R,
    requested: Option<Encoding>,
) -> Result<(Detection, TextReader<Chain<Cursor<Vec<u8>>, R>>)> {
    let mut prefix = vec![0u8; SCAN_LIMIT];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = read_chunk(&mut reader, &mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    prefix.truncate(filled);

    let detection = detect(&prefix, requested);
    let mut head = Cursor::new(prefix);
    head.set_position(detection.bom_len);
    Ok((detection, decode_with(detection.encoding, head.chain(reader))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gedcom::codec::test_support::{drain_text, Trickle};

    #[test]
    fn utf16_bom_beats_declaration() {
        let mut data = vec![0xFF, 0xFE];
        data.extend("0 HEAD\n1 CHAR ANSEL\n".encode_utf16().flat_map(u16::to_le_bytes));
        let detection = detect(&data, None);
        assert_eq!(detection, Detection { encoding: Encoding::Utf16Le, bom_len: 2 });
        assert_eq!(detect(&data, Some(Encoding::Ansel)).encoding, Encoding::Utf16Le);
    }

    #[test]
    fn declaration_is_found_with_irregular_spacing() {
        let data = b"0 HEAD\r\n1 SOUR X\r\n  1\t CHAR   ansel \r\n0 TRLR\r\n";
        assert_eq!(declared_encoding(data), Some("ansel"));
        assert_eq!(detect(data, None).encoding, Encoding::Ansel);
        assert_eq!(detect(b"1 CHAR ASCII\n", None).encoding, Encoding::Ascii);
    }

    #[test]
    fn declaration_beyond_scan_limit_is_ignored() {
        let mut data = b"0 HEAD\n".to_vec();
        data.extend(std::iter::repeat(b"1 NOTE padding\n").take(80).flatten());
        data.extend(b"1 CHAR ANSEL\n");
        assert_eq!(detect(&data, None).encoding, Encoding::Utf8);
    }

    #[test]
    fn tag_text_inside_values_is_not_a_declaration() {
        assert_eq!(detect(b"0 HEAD\n2 NOTE 1 CHAR ANSEL\n", None).encoding, Encoding::Utf8);
    }

    #[test]
    fn utf8_bom_is_consumed() {
        let data = b"\xef\xbb\xbf0 HEAD\n1 CHAR ANSEL\n";
        let (detection, mut text) = open(Trickle { data, step: 5 }, None).unwrap();
        assert_eq!(detection, Detection { encoding: Encoding::Utf8, bom_len: 3 });
        assert_eq!(drain_text(&mut text).unwrap(), "0 HEAD\n1 CHAR ANSEL\n");
    }

    #[test]
    fn bom_lengths() {
        assert_eq!(bom_len(b"\xef\xbb\xbf0"), 3);
        assert_eq!(bom_len(&[0xFE, 0xFF, 0x00]), 2);
        assert_eq!(bom_len(b"0 HEAD"), 0);
        assert_eq!(bom_len(b""), 0);
    }

    #[test]
    fn unknown_label_falls_back_to_utf8() {
        assert_eq!(detect(b"0 HEAD\n1 CHAR IBMPC\n", None).encoding, Encoding::Utf8);
    }

    #[test]
    fn open_decodes_declared_ansel() {
        let data = b"0 HEAD\n1 CHAR ANSEL\n1 NOTE Jos\xe2e\n";
        let (detection, mut text) = open(&data[..], None).unwrap();
        assert_eq!(detection.encoding, Encoding::Ansel);
        assert_eq!(
            drain_text(&mut text).unwrap(),
            "0 HEAD\n1 CHAR ANSEL\n1 NOTE Jose\u{301}\n"
        );
    }
}
