//! Record assembly: groups parsed lines into top-level records.
//!
//! A record starts at every level-0 line and owns all following lines up
//! to the next level-0 line. [`RecordIterator`] is pull-based; dropping it
//! early has no side effects beyond whatever it already read.
//!
//! # Example
//! ```no_run
//! # use gedcom_reader::{records_with_offsets, ParseOptions};
//! let file = std::fs::File::open("tree.ged").unwrap();
//! for record in records_with_offsets(file, &ParseOptions::default()).unwrap() {
//!     let record = record.unwrap();
//!     println!("{} at {}+{}", record.key(), record.byte_offset, record.byte_length);
//! }
//! ```

use log::trace;

use crate::gedcom::codec::TextSource;
use crate::gedcom::format::stream::{LineEntry, LineStream};
use crate::gedcom::types::error::{GedcomError, Result};
use crate::gedcom::types::models::{Line, RawRecord};

/// Iterator over [`RawRecord`]s.
///
/// A parse or decoding error ends iteration: it is yielded once, and
/// records yielded before it remain valid.
#[derive(Debug)]
pub struct RecordIterator<S> {
    lines: LineStream<S>,
    /// Level-0 line read ahead while finishing the previous record.
    lookahead: Option<(Line, u64)>,
    /// Source offset of the next record.
    offset: u64,
    track_offsets: bool,
    finished: bool,
}

impl<S: TextSource> RecordIterator<S> {
    /// Groups lines into records without byte accounting.
    ///
    /// `byte_offset` and `byte_length` of yielded records are zero.
    pub fn new(lines: LineStream<S>) -> Self {
        Self::build(lines, 0, false)
    }

    /// Groups lines into records and reports each record's byte range.
    ///
    /// `base_offset` is the source offset of the first byte `lines` reads,
    /// e.g. the byte-order mark length when reading from the start.
    pub fn with_offsets(lines: LineStream<S>, base_offset: u64) -> Self {
        Self::build(lines, base_offset, true)
    }

    fn build(lines: LineStream<S>, offset: u64, track_offsets: bool) -> Self {
        Self {
            lines,
            lookahead: None,
            offset,
            track_offsets,
            finished: false,
        }
    }

    /// Source offset just past the last yielded record.
    ///
    /// Only meaningful for offset-tracking iterators. Feeding it to
    /// [`GedcomReader::records_from`](crate::GedcomReader::records_from)
    /// resumes iteration where this iterator stopped.
    pub fn bytes_consumed(&self) -> u64 {
        self.offset
    }

    /// Syntax errors collected in lenient mode.
    pub fn errors(&self) -> &[GedcomError] {
        self.lines.errors()
    }

    /// Syntax errors skipped without being collected.
    pub fn suppressed(&self) -> usize {
        self.lines.suppressed()
    }

    pub fn into_errors(self) -> (Vec<GedcomError>, usize) {
        self.lines.into_errors()
    }

    /// Finds the first level-0 line of the next record.
    fn next_head(&mut self) -> Result<Option<(Line, u64)>> {
        if let Some(head) = self.lookahead.take() {
            return Ok(Some(head));
        }
        loop {
            match self.lines.next_entry()? {
                None => return Ok(None),
                Some(LineEntry { line: Some(line), source_len }) => {
                    return Ok(Some((line, source_len)))
                }
                // Lines skipped before the first record belong to no record.
                Some(LineEntry { line: None, source_len }) => self.offset += source_len,
            }
        }
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let Some((head, mut length)) = self.next_head()? else {
            return Ok(None);
        };
        let xref = head.xref.clone();
        let tag = head.tag.clone();
        let mut lines = vec![head];

        while let Some(LineEntry { line, source_len }) = self.lines.next_entry()? {
            match line {
                Some(line) if line.level == 0 => {
                    self.lookahead = Some((line, source_len));
                    break;
                }
                Some(line) => lines.push(line),
                None => {}
            }
            length += source_len;
        }

        let byte_offset = self.offset;
        self.offset += length;
        trace!(
            "Record {} with {} line(s) at {}+{}",
            xref.as_deref().unwrap_or(&tag),
            lines.len(),
            byte_offset,
            length
        );

        let (byte_offset, byte_length) = if self.track_offsets {
            (byte_offset, length)
        } else {
            (0, 0)
        };
        Ok(Some(RawRecord {
            xref,
            tag,
            lines,
            byte_offset,
            byte_length,
        }))
    }
}

impl<S: TextSource> Iterator for RecordIterator<S> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gedcom::codec::{decode_with, TextReader};
    use crate::gedcom::types::models::{Encoding, ParseOptions};

    fn records<'a>(
        data: &'a [u8],
        options: &ParseOptions,
    ) -> RecordIterator<TextReader<&'a [u8]>> {
        let lines = LineStream::new(decode_with(Encoding::Utf8, data), Encoding::Utf8, options);
        RecordIterator::with_offsets(lines, 0)
    }

    #[test]
    fn groups_lines_by_level_zero() {
        let data = b"0 HEAD\n1 SOUR Test\n0 @I1@ INDI\n1 NAME A\n2 GIVN A\n0 TRLR\n";
        let got: Vec<RawRecord> = records(data, &ParseOptions::default())
            .collect::<Result<_>>()
            .unwrap();
        let summary: Vec<(&str, usize)> = got.iter().map(|r| (r.key(), r.lines.len())).collect();
        assert_eq!(summary, [("HEAD", 2), ("@I1@", 3), ("TRLR", 1)]);
        assert_eq!(got[1].tag, "INDI");
    }

    #[test]
    fn reports_byte_ranges() {
        let got: Vec<RawRecord> = records(b"0 HEAD\n1 SOUR Test\n0 TRLR\n", &ParseOptions::default())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!((got[0].tag.as_str(), got[0].byte_offset, got[0].byte_length), ("HEAD", 0, 19));
        assert_eq!((got[1].tag.as_str(), got[1].byte_offset, got[1].byte_length), ("TRLR", 19, 7));
    }

    #[test]
    fn plain_iteration_leaves_offsets_zero() {
        let lines = LineStream::new(
            decode_with(Encoding::Utf8, &b"0 HEAD\n0 TRLR\n"[..]),
            Encoding::Utf8,
            &ParseOptions::default(),
        );
        for record in RecordIterator::new(lines) {
            let record = record.unwrap();
            assert_eq!((record.byte_offset, record.byte_length), (0, 0));
        }
    }

    #[test]
    fn error_ends_iteration_but_keeps_earlier_records() {
        let mut iter = records(b"0 HEAD\n0 @I1@ INDI\n1 @X@\n0 TRLR\n", &ParseOptions::default());
        assert_eq!(iter.next().unwrap().unwrap().tag, "HEAD");
        let err = iter.next().unwrap().unwrap_err();
        assert_eq!(err.line(), Some(3));
        assert!(iter.next().is_none());
    }

    #[test]
    fn skipped_lines_still_count_toward_the_record_length() {
        let data = b"0 HEAD\n\n1 SOUR x\n0 TRLR\n";
        let mut iter = records(data, &ParseOptions::lenient(0));
        let head = iter.next().unwrap().unwrap();
        let trlr = iter.next().unwrap().unwrap();
        assert!(iter.next().is_none());
        assert_eq!(head.lines.len(), 2);
        assert_eq!((head.byte_offset, head.byte_length), (0, 17));
        assert_eq!(trlr.byte_offset, 17);
        assert_eq!(iter.bytes_consumed(), data.len() as u64);
        assert_eq!(iter.errors().len(), 1);
    }

    #[test]
    fn leading_orphan_lines_are_skipped_leniently() {
        let data = b"1 NOTE stray\n0 HEAD\n0 TRLR\n";
        let mut iter = records(data, &ParseOptions::lenient(0));
        let head = iter.next().unwrap().unwrap();
        assert_eq!((head.tag.as_str(), head.byte_offset), ("HEAD", 13));
        assert!(records(data, &ParseOptions::default()).next().unwrap().is_err());
    }
}
