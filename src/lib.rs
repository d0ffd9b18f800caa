//! # gedcom-reader
//!
//! A streaming and random-access reader for GEDCOM genealogy files.
//!
//! Input bytes in UTF-8, UTF-16, ANSEL, ASCII or Latin-1 are detected,
//! transcoded and validated, split into lines, parsed and grouped into
//! top-level records with exact byte ranges. A persistent [`RecordIndex`]
//! lets [`GedcomReader`] re-read any single record by seeking to it.
//!
//! ```no_run
//! use gedcom_reader::{GedcomReader, ParseOptions};
//!
//! let mut reader = GedcomReader::open("tree.ged", ParseOptions::lenient(100))?;
//! let person = reader.find_record("@I1@")?;
//! for line in &person.lines {
//!     println!("{} {} {}", line.level, line.tag, line.value);
//! }
//! # Ok::<(), gedcom_reader::GedcomError>(())
//! ```
pub mod gedcom;

// Re-export the main types for convenience
pub use gedcom::{
    codec::{decode_with, open, Detection, TextSource},
    models::{
        Encoding,
        IndexEntry,
        Line,
        ParseMode,
        ParseOptions,
        ParsedLines,
        RawRecord,
        DEFAULT_MAX_DEPTH,
    },
    parse_lines,
    records,
    records_with_offsets,
    EncodingErrorKind,
    GedcomError,
    GedcomReader,
    LineParser,
    LineStream,
    LineTokenizer,
    RawLine,
    RecordIndex,
    RecordIterator,
    Result,
    StreamRecords,
    FORMAT_VERSION,
};
