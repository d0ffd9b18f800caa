//! Core GEDCOM ingestion pipeline.

pub mod codec;
pub mod format;
pub mod index;
pub mod iter;
pub mod reader;
pub mod types;
mod utils;

use std::io::{Chain, Cursor, Read};

use log::info;

pub use format::line::LineParser;
pub use format::stream::LineStream;
pub use format::tokenizer::{LineTokenizer, RawLine};
pub use index::{RecordIndex, FORMAT_VERSION};
pub use iter::RecordIterator;
pub use reader::GedcomReader;
pub use types::error::{EncodingErrorKind, GedcomError, Result};
pub use types::models;

use codec::TextReader;
use types::models::{ParseOptions, ParsedLines};

/// Records streamed from a reader, after encoding detection.
pub type StreamRecords<R> = RecordIterator<TextReader<Chain<Cursor<Vec<u8>>, R>>>;

/// Parses every line of `reader`.
///
/// In strict mode the first syntax error is returned and no lines are.
/// In lenient mode invalid lines are skipped and reported in
/// [`ParsedLines::errors`]. Decoding and I/O errors are fatal in both modes.
pub fn parse_lines<R: Read>(reader: R, options: &ParseOptions) -> Result<ParsedLines> {
    let (detection, text) = codec::open(reader, options.encoding)?;
    let mut stream = LineStream::new(text, detection.encoding, options);
    let lines = stream.by_ref().collect::<Result<Vec<_>>>()?;
    let (errors, suppressed) = stream.into_errors();

    info!(
        "Parsed {} line(s) as {}: {} error(s) collected, {} suppressed",
        lines.len(),
        detection.encoding,
        errors.len(),
        suppressed
    );
    Ok(ParsedLines {
        lines,
        errors,
        suppressed,
        encoding: detection.encoding,
    })
}

/// Streams the records of `reader` without byte accounting.
pub fn records<R: Read>(reader: R, options: &ParseOptions) -> Result<StreamRecords<R>> {
    let (detection, text) = codec::open(reader, options.encoding)?;
    Ok(RecordIterator::new(LineStream::new(text, detection.encoding, options)))
}

/// Streams the records of `reader` with their byte ranges in the original input.
pub fn records_with_offsets<R: Read>(reader: R, options: &ParseOptions) -> Result<StreamRecords<R>> {
    let (detection, text) = codec::open(reader, options.encoding)?;
    Ok(RecordIterator::with_offsets(
        LineStream::new(text, detection.encoding, options),
        detection.bom_len,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gedcom::types::models::Encoding;

    #[test]
    fn strict_parse_fails_without_lines() {
        let err = parse_lines(&b"0 HEAD\nbogus\n0 TRLR\n"[..], &ParseOptions::strict()).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn lenient_parse_reports_encoding() {
        let parsed = parse_lines(&b"0 HEAD\n1 CHAR ASCII\nbogus\n0 TRLR\n"[..], &ParseOptions::lenient(0)).unwrap();
        assert_eq!(parsed.encoding, Encoding::Ascii);
        assert_eq!(parsed.lines.len(), 3);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.suppressed, 0);
    }

    #[test]
    fn record_streams_differ_only_in_offsets() {
        let data = b"\xef\xbb\xbf0 HEAD\n0 TRLR\n";
        let plain: Vec<_> = records(&data[..], &ParseOptions::default()).unwrap().collect::<Result<_>>().unwrap();
        let tracked: Vec<_> = records_with_offsets(&data[..], &ParseOptions::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(plain.len(), tracked.len());
        assert_eq!(plain[1].byte_offset, 0);
        assert_eq!((tracked[1].byte_offset, tracked[1].byte_length), (10, 7));
        assert_eq!(plain[1].lines, tracked[1].lines);
    }
}
