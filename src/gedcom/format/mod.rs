//! Text-level parsing layer.
//!
//! # Module Organization
//!
//! - [`tokenizer`]: splits validated text into physical lines
//! - [`line`]: parses one line into a [`Line`](crate::Line)
//! - [`stream`]: drives both, applying strict or lenient error handling
//!
//! ```text
//! TextSource ─► LineTokenizer ─► LineParser ─► LineStream ─► RecordIterator
//!               (RawLine)        (Line)        (LineEntry)
//! ```

pub mod line;
pub mod stream;
pub mod tokenizer;
