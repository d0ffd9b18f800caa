//! Custom error types for the gedcom-reader crate.

use thiserror::Error;

/// The specific reason an input byte sequence could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingErrorKind {
    /// A byte with no mapping in the active legacy character set.
    #[error("byte {byte:#04x} is undefined in {encoding}")]
    UndefinedByte { encoding: &'static str, byte: u8 },

    /// A structurally invalid UTF-8 sequence.
    #[error("invalid UTF-8 sequence")]
    InvalidSequence,

    /// A multi-byte UTF-8 sequence cut short by the end of input.
    #[error("truncated UTF-8 sequence at end of input")]
    TruncatedSequence,

    /// Unpaired surrogate or odd trailing byte in UTF-16 input.
    #[error("malformed UTF-16 input")]
    MalformedUtf16,
}

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum GedcomError {
    /// An error originating from the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input bytes could not be turned into valid UTF-8 text.
    #[error("Encoding error at line {line}, column {column}: {kind}")]
    Encoding {
        line: u64,
        column: u64,
        #[source]
        kind: EncodingErrorKind,
    },

    /// A line does not follow the `LEVEL [XREF] TAG [VALUE]` grammar.
    #[error("Syntax error at line {line}: {message} (line: {text:?})")]
    Syntax {
        line: u64,
        message: String,
        text: String,
    },

    /// A serialized index was written by a different format version.
    #[error("Index format version mismatch: expected {expected}, found {found}")]
    IndexVersionMismatch { expected: u32, found: u32 },

    /// A serialized index is structurally invalid.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// A serialized index failed its integrity check.
    #[error("Index checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// No record with this cross-reference exists in the index.
    #[error("Record not found in index: {0}")]
    RecordNotFound(String),

    /// No cross-reference-less record with this tag exists in the index.
    #[error("Record type not found in index: {0}")]
    TypeNotFound(String),

    /// The bytes at an indexed offset no longer hold the indexed record.
    #[error("Index does not match source: expected {key} at byte offset {offset}")]
    IndexMismatch { key: String, offset: u64 },
}

impl GedcomError {
    pub(crate) fn syntax(line: u64, message: impl Into<String>, text: &str) -> Self {
        GedcomError::Syntax {
            line,
            message: message.into(),
            text: text.to_owned(),
        }
    }

    /// Returns `true` for errors lenient mode is allowed to collect and skip.
    pub fn is_syntax(&self) -> bool {
        matches!(self, GedcomError::Syntax { .. })
    }

    /// The 1-based input line the error refers to, when it has one.
    pub fn line(&self) -> Option<u64> {
        match self {
            GedcomError::Encoding { line, .. } | GedcomError::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// A convenience `Result` type alias using the crate's `GedcomError` type.
pub type Result<T> = std::result::Result<T, GedcomError>;
