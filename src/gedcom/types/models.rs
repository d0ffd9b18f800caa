//! Core data structures shared by every layer of the pipeline.
//!
//! - [`Line`] and [`RawRecord`]: what the parser hands to consumers
//! - [`IndexEntry`]: one row of a persisted [`RecordIndex`](crate::RecordIndex)
//! - [`Encoding`]: the closed set of supported character sets
//! - [`ParseOptions`]: caller-supplied parsing configuration

use std::fmt;

/// Default cap on line levels, bounding nesting depth for downstream consumers.
pub const DEFAULT_MAX_DEPTH: u32 = 100;

/// One parsed physical line: `LEVEL [XREF] TAG [VALUE]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub level: u32,
    /// Cross-reference identifier, kept verbatim including its `@` delimiters.
    pub xref: Option<String>,
    pub tag: String,
    /// Everything after the tag with exactly one separator stripped.
    pub value: String,
    /// 1-based position in the input.
    pub line_number: u64,
}

/// A level-0 line plus every following line up to the next level-0 line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub xref: Option<String>,
    /// Tag of the level-0 line (`HEAD`, `INDI`, `TRLR`, ...).
    pub tag: String,
    pub lines: Vec<Line>,
    /// Offset of the first byte in the original stream.
    ///
    /// Only meaningful when produced by an offset-tracking iterator;
    /// zero otherwise.
    pub byte_offset: u64,
    /// Number of original bytes covered, line terminators included.
    pub byte_length: u64,
}

impl RawRecord {
    /// The key this record is indexed under: its xref, or its tag if it has none.
    pub fn key(&self) -> &str {
        self.xref.as_deref().unwrap_or(&self.tag)
    }
}

/// Location of one record in its source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub xref: Option<String>,
    pub tag: String,
    pub byte_offset: u64,
    pub byte_length: u64,
    /// 1-based line number of the record's level-0 line.
    pub line_number: u64,
}

/// Character encodings the decoder understands.
///
/// Determined once per stream, before the first line is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Unknown,
    Utf8,
    Utf16Le,
    Utf16Be,
    /// ANSI Z39.47 with the GEDCOM extensions.
    Ansel,
    Ascii,
    Latin1,
}

impl Encoding {
    pub const ALL: [Encoding; 7] = [
        Encoding::Unknown,
        Encoding::Utf8,
        Encoding::Utf16Le,
        Encoding::Utf16Be,
        Encoding::Ansel,
        Encoding::Ascii,
        Encoding::Latin1,
    ];

    /// Canonical name, also used in serialized indexes.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Unknown => "UNKNOWN",
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Ansel => "ANSEL",
            Encoding::Ascii => "ASCII",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Inverse of [`Encoding::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    /// Maps the value of a `1 CHAR` declaration to an encoding.
    ///
    /// Matching is case-insensitive. Returns `None` for unrecognized labels.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_uppercase();
        let encoding = match label.as_str() {
            "UTF-8" | "UTF8" | "UNICODE" => Encoding::Utf8,
            "UTF-16" | "UTF16" | "UTF-16LE" | "UTF16LE" => Encoding::Utf16Le,
            "UTF-16BE" | "UTF16BE" => Encoding::Utf16Be,
            "ANSEL" => Encoding::Ansel,
            "ASCII" => Encoding::Ascii,
            "LATIN1" | "LATIN-1" | "ISO-8859-1" | "ISO8859-1" | "ANSI" => Encoding::Latin1,
            _ => return None,
        };
        Some(encoding)
    }

    /// Number of source bytes that decoded to `text` under this encoding.
    ///
    /// Every transcoder is code-point preserving, so the source length can
    /// be recomputed from the decoded text alone.
    pub fn encoded_len(&self, text: &str) -> u64 {
        match self {
            Encoding::Unknown | Encoding::Utf8 | Encoding::Ascii => text.len() as u64,
            Encoding::Latin1 | Encoding::Ansel => text.chars().count() as u64,
            Encoding::Utf16Le | Encoding::Utf16Be => {
                text.chars().map(|c| c.len_utf16() as u64 * 2).sum()
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How syntax errors are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// The first syntax error aborts parsing.
    #[default]
    Strict,
    /// Syntax errors are collected and the offending line skipped.
    Lenient,
}

/// Caller-supplied parsing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub mode: ParseMode,
    /// Maximum number of syntax errors collected in lenient mode; 0 means unlimited.
    pub max_errors: usize,
    /// Highest accepted line level.
    pub max_depth: u32,
    /// Forces an encoding instead of the in-band declaration.
    ///
    /// A UTF-16 byte-order mark still takes precedence.
    pub encoding: Option<Encoding>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            mode: ParseMode::Strict,
            max_errors: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            encoding: None,
        }
    }
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn lenient(max_errors: usize) -> Self {
        Self {
            mode: ParseMode::Lenient,
            max_errors,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

/// Result of a whole-stream line parse.
#[derive(Debug, Default)]
pub struct ParsedLines {
    pub lines: Vec<Line>,
    /// Syntax errors collected in lenient mode, in input order.
    pub errors: Vec<super::error::GedcomError>,
    /// Syntax errors skipped after `max_errors` was reached.
    pub suppressed: usize,
    pub encoding: Encoding,
}
