//! UTF-16 to UTF-8 transcoding on top of `encoding_rs`.

use std::io::Read;

use encoding_rs::{Decoder, DecoderResult, UTF_16BE, UTF_16LE};

use super::{read_chunk, ByteSource, Position, CHUNK_SIZE};
use crate::gedcom::types::error::{EncodingErrorKind, GedcomError, Result};

/// Streaming UTF-16 decoder.
///
/// The byte-order mark, if any, has already been consumed by detection,
/// so the `encoding_rs` decoder runs without BOM sniffing. Surrogate pairs
/// and odd bytes split across reads are carried by the decoder state.
pub struct Utf16Decoder<R> {
    inner: R,
    decoder: Decoder,
    position: Position,
    finished: bool,
    deferred: Option<GedcomError>,
}

impl<R> std::fmt::Debug for Utf16Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Utf16Decoder")
            .field("encoding", &self.decoder.encoding().name())
            .field("position", &self.position)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<R: Read> Utf16Decoder<R> {
    pub fn new(inner: R, big_endian: bool) -> Self {
        let encoding = if big_endian { UTF_16BE } else { UTF_16LE };
        Self {
            inner,
            decoder: encoding.new_decoder_without_bom_handling(),
            position: Position::default(),
            finished: false,
            deferred: None,
        }
    }

    fn decode(&mut self, mut input: &[u8], last: bool, out: &mut Vec<u8>) -> Result<()> {
        loop {
            let capacity = self
                .decoder
                .max_utf8_buffer_length_without_replacement(input.len())
                .unwrap_or_else(|| input.len().saturating_mul(3).saturating_add(4));
            let offset = out.len();
            out.resize(offset + capacity, 0);
            let (result, read, written) =
                self.decoder
                    .decode_to_utf8_without_replacement(input, &mut out[offset..], last);
            out.truncate(offset + written);
            self.position
                .advance_str(&String::from_utf8_lossy(&out[offset..]));
            input = &input[read..];

            match result {
                DecoderResult::InputEmpty => return Ok(()),
                DecoderResult::OutputFull => continue,
                DecoderResult::Malformed(_, _) => {
                    return Err(GedcomError::Encoding {
                        line: self.position.line,
                        column: self.position.column,
                        kind: EncodingErrorKind::MalformedUtf16,
                    })
                }
            }
        }
    }
}

impl<R: Read> ByteSource for Utf16Decoder<R> {
    fn read_into(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        let start = out.len();
        let mut chunk = [0u8; CHUNK_SIZE];
        while out.len() == start && !self.finished {
            let n = read_chunk(&mut self.inner, &mut chunk)?;
            let last = n == 0;
            if let Err(err) = self.decode(&chunk[..n], last, out) {
                if out.len() == start {
                    return Err(err);
                }
                // Hand out the text decoded so far; report the error next call.
                self.deferred = Some(err);
                self.finished = true;
                break;
            }
            self.finished = last;
        }
        Ok(out.len() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gedcom::codec::test_support::Trickle;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn decode(data: &[u8], big_endian: bool, step: usize) -> Result<String> {
        let mut decoder = Utf16Decoder::new(Trickle { data, step }, big_endian);
        let mut out = Vec::new();
        while decoder.read_into(&mut out)? > 0 {}
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn decodes_little_endian_across_odd_boundaries() {
        let text = "0 HEAD\n1 NOTE Grüße \u{1F333}\n";
        assert_eq!(decode(&utf16le(text), false, 3).unwrap(), text);
    }

    #[test]
    fn decodes_big_endian() {
        let data: Vec<u8> = "0 TRLR".encode_utf16().flat_map(u16::to_be_bytes).collect();
        assert_eq!(decode(&data, true, 64).unwrap(), "0 TRLR");
    }

    #[test]
    fn odd_trailing_byte_is_an_error() {
        let mut data = utf16le("0 HEAD");
        data.push(b'x');
        let err = decode(&data, false, 64).unwrap_err();
        assert!(matches!(
            err,
            GedcomError::Encoding {
                kind: EncodingErrorKind::MalformedUtf16,
                line: 1,
                ..
            }
        ));
    }

    #[test]
    fn lone_surrogate_is_an_error() {
        let data = [b'a', 0x00, 0x00, 0xDC, b'b', 0x00];
        assert!(decode(&data, false, 64).is_err());
    }
}
