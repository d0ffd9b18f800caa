//! UTF-8 validation for transcoder output.

use super::{ByteSource, Position, TextSource};
use crate::gedcom::types::error::{EncodingErrorKind, GedcomError, Result};

/// Validates the UTF-8 produced by a [`ByteSource`].
///
/// A multi-byte sequence split across two reads is held back until the
/// next read completes it. Reaching end of input with such a sequence
/// still pending is an error.
#[derive(Debug)]
pub struct Utf8Validator<S> {
    inner: S,
    pending: Vec<u8>,
    position: Position,
}

impl<S: ByteSource> Utf8Validator<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            position: Position::default(),
        }
    }

    /// Position of the next character to be validated.
    pub fn position(&self) -> Position {
        self.position
    }

    fn error(&self, kind: EncodingErrorKind) -> GedcomError {
        GedcomError::Encoding {
            line: self.position.line,
            column: self.position.column,
            kind,
        }
    }

    /// Moves the first `valid` bytes of `pending` into `out`.
    fn accept(&mut self, valid: usize, out: &mut String) {
        {
            let text = String::from_utf8_lossy(&self.pending[..valid]);
            self.position.advance_str(&text);
            out.push_str(&text);
        }
        self.pending.drain(..valid);
    }
}

impl<S: ByteSource> TextSource for Utf8Validator<S> {
    fn read_text(&mut self, out: &mut String) -> Result<usize> {
        loop {
            // Valid text ahead of a bad sequence is delivered before the error.
            let (valid, invalid) = match std::str::from_utf8(&self.pending) {
                Ok(_) => (self.pending.len(), false),
                Err(e) => (e.valid_up_to(), e.error_len().is_some()),
            };
            if valid > 0 {
                self.accept(valid, out);
                return Ok(valid);
            }
            if invalid {
                return Err(self.error(EncodingErrorKind::InvalidSequence));
            }

            if self.inner.read_into(&mut self.pending)? == 0 {
                if self.pending.is_empty() {
                    return Ok(0);
                }
                return Err(self.error(EncodingErrorKind::TruncatedSequence));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gedcom::codec::single_byte::Passthrough;
    use crate::gedcom::codec::test_support::{drain_text, Trickle};

    fn validate(data: &[u8], step: usize) -> Result<String> {
        let mut validator = Utf8Validator::new(Passthrough::new(Trickle { data, step }));
        drain_text(&mut validator)
    }

    #[test]
    fn completes_sequences_split_across_reads() {
        let text = "0 HEAD\n1 NOTE żółć ✓\n";
        assert_eq!(validate(text.as_bytes(), 1).unwrap(), text);
        assert_eq!(validate(text.as_bytes(), 2).unwrap(), text);
    }

    #[test]
    fn truncated_sequence_at_end_is_an_error() {
        let err = validate(b"0 NOTE caf\xc3", 64).unwrap_err();
        match err {
            GedcomError::Encoding { line, column, kind } => {
                assert_eq!(kind, EncodingErrorKind::TruncatedSequence);
                assert_eq!((line, column), (1, 11));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_sequence_is_positioned() {
        let err = validate(b"0 HEAD\r\n1 X \xff", 4).unwrap_err();
        match err {
            GedcomError::Encoding { line, column, kind } => {
                assert_eq!(kind, EncodingErrorKind::InvalidSequence);
                assert_eq!((line, column), (2, 5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(validate(b"", 8).unwrap(), "");
    }
}
