//! The line grammar: `LEVEL [XREF] TAG [VALUE]`.

use crate::gedcom::types::error::{GedcomError, Result};
use crate::gedcom::types::models::{Line, DEFAULT_MAX_DEPTH};

/// Delimiter that opens and closes a cross-reference identifier.
pub const XREF_DELIMITER: char = '@';

/// Stateful single-line parser.
///
/// Keeps a running 1-based line counter (every call counts, successful or
/// not) and the level of the last accepted line. The first accepted line
/// of a stream must be at level 0.
#[derive(Debug, Clone)]
pub struct LineParser {
    line_number: u64,
    max_depth: u32,
    last_level: Option<u32>,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl LineParser {
    pub fn new(max_depth: u32) -> Self {
        Self::starting_at(1, max_depth)
    }

    /// A parser whose first parsed line is numbered `first_line`.
    pub fn starting_at(first_line: u64, max_depth: u32) -> Self {
        Self {
            line_number: first_line.saturating_sub(1),
            max_depth,
            last_level: None,
        }
    }

    /// Number of the most recently parsed line (0 before the first call).
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    pub fn parse(&mut self, raw: &str) -> Result<Line> {
        self.line_number += 1;
        let number = self.line_number;
        let fail = |message: String| GedcomError::syntax(number, message, raw);

        let (start, end) = next_field(raw, 0).ok_or_else(|| fail("empty line".into()))?;
        let level_text = &raw[start..end];
        if !level_text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail(format!("invalid level {level_text:?}")));
        }
        let level = match level_text.parse::<u32>() {
            Ok(level) if level <= self.max_depth => level,
            _ => {
                return Err(fail(format!(
                    "level {level_text} exceeds maximum depth {}",
                    self.max_depth
                )))
            }
        };
        if self.last_level.is_none() && level != 0 {
            return Err(fail(format!("line at level {level} outside of any record")));
        }

        let second = next_field(raw, end).ok_or_else(|| fail("missing tag".into()))?;
        let second_text = &raw[second.0..second.1];
        let (xref, tag) = if is_xref(second_text) {
            let tag = next_field(raw, second.1)
                .ok_or_else(|| fail("cross-reference without tag".into()))?;
            (Some(second_text.to_owned()), tag)
        } else {
            (None, second)
        };

        let rest = &raw[tag.1..];
        let mut chars = rest.chars();
        let value = match chars.next() {
            Some(c) if c.is_whitespace() => chars.as_str(),
            _ => rest,
        };

        self.last_level = Some(level);
        Ok(Line {
            level,
            xref,
            tag: raw[tag.0..tag.1].to_owned(),
            value: value.to_owned(),
            line_number: number,
        })
    }
}

fn is_xref(field: &str) -> bool {
    field.len() >= 2 && field.starts_with(XREF_DELIMITER) && field.ends_with(XREF_DELIMITER)
}

/// Byte span of the next whitespace-delimited field at or after `from`.
fn next_field(raw: &str, from: usize) -> Option<(usize, usize)> {
    let start = from + raw[from..].find(|c: char| !c.is_whitespace())?;
    let end = raw[start..]
        .find(char::is_whitespace)
        .map_or(raw.len(), |i| start + i);
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser_in_record() -> LineParser {
        let mut parser = LineParser::default();
        parser.parse("0 HEAD").unwrap();
        parser
    }

    #[test]
    fn parses_level_tag_and_value() {
        let mut parser = parser_in_record();
        let line = parser.parse("1 NAME John /Smith/").unwrap();
        assert_eq!(line.level, 1);
        assert_eq!(line.xref, None);
        assert_eq!(line.tag, "NAME");
        assert_eq!(line.value, "John /Smith/");
        assert_eq!(line.line_number, 2);
    }

    #[test]
    fn parses_xref() {
        let mut parser = LineParser::default();
        let line = parser.parse("0 @I1@ INDI").unwrap();
        assert_eq!(line.xref.as_deref(), Some("@I1@"));
        assert_eq!(line.tag, "INDI");
        assert_eq!(line.value, "");
    }

    #[test]
    fn value_whitespace_is_preserved_after_one_separator() {
        let mut parser = parser_in_record();
        assert_eq!(parser.parse("1 NOTE  two  spaces  ").unwrap().value, " two  spaces  ");
        assert_eq!(parser.parse("2 CONT").unwrap().value, "");
        assert_eq!(parser.parse("2 CONC \tx").unwrap().value, "\tx");
        assert_eq!(parser.parse("1 FAMC @F1@").unwrap().value, "@F1@");
    }

    #[test]
    fn value_may_repeat_the_tag_text() {
        let mut parser = parser_in_record();
        assert_eq!(parser.parse("1 NOTE NOTE NOTE").unwrap().value, "NOTE NOTE");
    }

    #[test]
    fn rejects_empty_and_blank_lines() {
        let mut parser = parser_in_record();
        for raw in ["", "   ", "\t"] {
            let err = parser.parse(raw).unwrap_err();
            assert!(err.is_syntax(), "{raw:?}");
        }
        assert_eq!(parser.line_number(), 4);
    }

    #[test]
    fn rejects_xref_without_tag() {
        let err = LineParser::default().parse("0 @I1@").unwrap_err();
        match err {
            GedcomError::Syntax { line, message, text } => {
                assert_eq!(line, 1);
                assert_eq!(message, "cross-reference without tag");
                assert_eq!(text, "0 @I1@");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_levels() {
        let mut parser = parser_in_record();
        assert!(parser.parse("x NAME a").is_err());
        assert!(parser.parse("-1 NAME a").is_err());
        assert!(parser.parse("101 NAME a").is_err());
        assert!(parser.parse("99999999999 NAME a").is_err());
        assert_eq!(parser.parse("100 NAME a").unwrap().level, 100);
        assert!(parser.parse("1").is_err());
    }

    #[test]
    fn custom_depth_limit() {
        let mut parser = LineParser::new(2);
        parser.parse("0 HEAD").unwrap();
        assert!(parser.parse("2 VERS 5.5").is_ok());
        assert!(parser.parse("3 VERS 5.5").is_err());
    }

    #[test]
    fn first_line_must_open_a_record() {
        let mut parser = LineParser::default();
        assert!(parser.parse("1 NAME orphan").is_err());
        assert!(parser.parse("0 HEAD").is_ok());
        assert!(parser.parse("1 NAME fine").is_ok());
    }

    #[test]
    fn leading_whitespace_is_tolerated() {
        let mut parser = LineParser::starting_at(10, DEFAULT_MAX_DEPTH);
        let line = parser.parse("  0 TRLR").unwrap();
        assert_eq!((line.level, line.tag.as_str(), line.line_number), (0, "TRLR", 10));
    }
}
