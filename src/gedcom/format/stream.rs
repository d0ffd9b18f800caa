//! Mode-aware stream of parsed lines.

use log::warn;

use super::line::LineParser;
use super::tokenizer::LineTokenizer;
use crate::gedcom::codec::TextSource;
use crate::gedcom::types::error::{GedcomError, Result};
use crate::gedcom::types::models::{Encoding, Line, ParseMode, ParseOptions};

/// A physical line as seen by the record assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    /// `None` when lenient mode skipped the line.
    pub line: Option<Line>,
    /// Source bytes covered by the line, terminator included.
    pub source_len: u64,
}

/// Tokenizes and parses lines, applying strict or lenient error handling.
///
/// I/O and encoding errors are always returned. Syntax errors are returned
/// in strict mode; in lenient mode they are collected (up to `max_errors`)
/// and the offending line is skipped.
#[derive(Debug)]
pub struct LineStream<S> {
    tokenizer: LineTokenizer<S>,
    parser: LineParser,
    encoding: Encoding,
    mode: ParseMode,
    max_errors: usize,
    errors: Vec<GedcomError>,
    suppressed: usize,
    failed: bool,
}

impl<S: TextSource> LineStream<S> {
    pub fn new(source: S, encoding: Encoding, options: &ParseOptions) -> Self {
        Self::starting_at(source, encoding, options, 1)
    }

    /// Like [`LineStream::new`], numbering the first line `first_line`.
    pub fn starting_at(
        source: S,
        encoding: Encoding,
        options: &ParseOptions,
        first_line: u64,
    ) -> Self {
        Self {
            tokenizer: LineTokenizer::new(source),
            parser: LineParser::starting_at(first_line, options.max_depth),
            encoding,
            mode: options.mode,
            max_errors: options.max_errors,
            errors: Vec::new(),
            suppressed: 0,
            failed: false,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Syntax errors collected so far in lenient mode.
    pub fn errors(&self) -> &[GedcomError] {
        &self.errors
    }

    /// Syntax errors skipped without being collected once `max_errors` was reached.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn into_errors(self) -> (Vec<GedcomError>, usize) {
        (self.errors, self.suppressed)
    }

    /// Reads the next physical line, or `None` at end of input.
    ///
    /// After an error is returned the stream stays exhausted.
    pub fn next_entry(&mut self) -> Result<Option<LineEntry>> {
        if self.failed {
            return Ok(None);
        }
        let result = self.read_entry();
        self.failed = result.is_err();
        result
    }

    fn read_entry(&mut self) -> Result<Option<LineEntry>> {
        let Some(raw) = self.tokenizer.next_line()? else {
            return Ok(None);
        };
        let source_len =
            self.encoding.encoded_len(&raw.text) + self.encoding.encoded_len(raw.terminator);
        let line = match self.parser.parse(&raw.text) {
            Ok(line) => Some(line),
            Err(err) => {
                self.reject(err)?;
                None
            }
        };
        Ok(Some(LineEntry { line, source_len }))
    }

    fn reject(&mut self, err: GedcomError) -> Result<()> {
        if self.mode == ParseMode::Strict || !err.is_syntax() {
            return Err(err);
        }
        if self.max_errors == 0 || self.errors.len() < self.max_errors {
            warn!("Skipping invalid line: {}", err);
            self.errors.push(err);
        } else {
            if self.suppressed == 0 {
                warn!(
                    "Error limit of {} reached; further invalid lines are skipped silently",
                    self.max_errors
                );
            }
            self.suppressed += 1;
        }
        Ok(())
    }
}

impl<S: TextSource> Iterator for LineStream<S> {
    type Item = Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_entry() {
                Ok(Some(LineEntry { line: Some(line), .. })) => return Some(Ok(line)),
                Ok(Some(_)) => continue,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gedcom::codec::{decode_with, TextReader};

    fn stream<'a>(data: &'a [u8], options: &ParseOptions) -> LineStream<TextReader<&'a [u8]>> {
        LineStream::new(decode_with(Encoding::Utf8, data), Encoding::Utf8, options)
    }

    #[test]
    fn strict_stops_at_first_syntax_error() {
        let mut lines = stream(b"0 HEAD\n\n1 SOUR x\n", &ParseOptions::strict());
        assert_eq!(lines.next().unwrap().unwrap().tag, "HEAD");
        let err = lines.next().unwrap().unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(lines.next().is_none());
    }

    #[test]
    fn lenient_skips_and_collects() {
        let mut lines = stream(b"0 HEAD\n\n1 SOUR x\n1 @X@\n0 TRLR", &ParseOptions::lenient(0));
        let tags: Vec<String> = lines.by_ref().map(|l| l.unwrap().tag).collect();
        assert_eq!(tags, ["HEAD", "SOUR", "TRLR"]);
        let lines_with_errors: Vec<_> = lines.errors().iter().filter_map(GedcomError::line).collect();
        assert_eq!(lines_with_errors, [2, 4]);
        assert_eq!(lines.suppressed(), 0);
    }

    #[test]
    fn source_len_includes_terminators() {
        let mut lines = stream(b"0 HEAD\r\n1 X y\r0 TRLR", &ParseOptions::strict());
        let lens: Vec<u64> = std::iter::from_fn(|| lines.next_entry().unwrap())
            .map(|entry| entry.source_len)
            .collect();
        assert_eq!(lens, [8, 6, 6]);
    }

    #[test]
    fn encoding_errors_are_fatal_in_lenient_mode() {
        let mut lines = stream(b"0 HEAD\n1 NOTE \xff\n0 TRLR\n", &ParseOptions::lenient(0));
        assert_eq!(lines.next().unwrap().unwrap().tag, "HEAD");
        assert!(matches!(lines.next(), Some(Err(GedcomError::Encoding { .. }))));
        assert!(lines.next().is_none());
    }
}
