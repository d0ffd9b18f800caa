//! Splits validated text into physical lines.

use memchr::memchr2;

use crate::gedcom::codec::TextSource;
use crate::gedcom::types::error::Result;

/// One physical line with its terminator removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub text: String,
    /// `"\n"`, `"\r\n"`, `"\r"`, or `""` for an unterminated last line.
    pub terminator: &'static str,
}

/// Lazy line splitter accepting LF, CRLF and bare CR terminators.
///
/// A `\r` that is the last byte currently buffered is not classified until
/// more input arrives or the stream ends.
#[derive(Debug)]
pub struct LineTokenizer<S> {
    source: S,
    buf: String,
    pos: usize,
    eof: bool,
}

impl<S: TextSource> LineTokenizer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: String::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Returns the next line, or `None` once the input is exhausted.
    pub fn next_line(&mut self) -> Result<Option<RawLine>> {
        loop {
            let rest = &self.buf.as_bytes()[self.pos..];
            match memchr2(b'\n', b'\r', rest) {
                Some(i) => {
                    let terminator = match (rest[i], rest.get(i + 1)) {
                        (b'\n', _) => Some("\n"),
                        (_, Some(b'\n')) => Some("\r\n"),
                        (_, Some(_)) => Some("\r"),
                        (_, None) if self.eof => Some("\r"),
                        (_, None) => None,
                    };
                    if let Some(terminator) = terminator {
                        let text = self.buf[self.pos..self.pos + i].to_owned();
                        self.pos += i + terminator.len();
                        return Ok(Some(RawLine { text, terminator }));
                    }
                }
                None if self.eof => {
                    if self.pos == self.buf.len() {
                        return Ok(None);
                    }
                    let text = self.buf[self.pos..].to_owned();
                    self.pos = self.buf.len();
                    return Ok(Some(RawLine { text, terminator: "" }));
                }
                None => {}
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        if self.source.read_text(&mut self.buf)? == 0 {
            self.eof = true;
        }
        Ok(())
    }
}

impl<S: TextSource> Iterator for LineTokenizer<S> {
    type Item = Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
