use std::fs::File;
use std::io::{Chain, Cursor, Read, Seek, SeekFrom, Take};
use std::path::Path;

use log::{debug, info};

use super::codec::{self, decode_with, detect, TextReader};
use super::format::stream::LineStream;
use super::index::RecordIndex;
use super::iter::RecordIterator;
use super::types::error::{GedcomError, Result};
use super::types::models::{Encoding, IndexEntry, ParseOptions, RawRecord};

/// Records read from the start of a [`GedcomReader`]'s source.
pub type SourceRecords<'a, R> = RecordIterator<TextReader<Chain<Cursor<Vec<u8>>, &'a mut R>>>;

/// Records read from a byte offset of a [`GedcomReader`]'s source.
pub type ResumedRecords<'a, R> = RecordIterator<TextReader<&'a mut R>>;

/// Random-access reader over a seekable GEDCOM source.
///
/// Holds the source together with its [`RecordIndex`]; individual records
/// are re-read from their indexed byte range on demand.
#[derive(Debug)]
pub struct GedcomReader<R> {
    source: R,
    index: RecordIndex,
    options: ParseOptions,
}

impl GedcomReader<File> {
    /// Opens a file and indexes it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, or if indexing fails
    /// (a decoding error anywhere, or a syntax error in strict mode).
    pub fn open(path: impl AsRef<Path>, options: ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening GEDCOM file: {}", path.display());
        let file = File::open(path)?;
        Self::new(file, options)
    }
}

impl<R: Read + Seek> GedcomReader<R> {
    /// Indexes `source` with one full pass.
    pub fn new(mut source: R, options: ParseOptions) -> Result<Self> {
        let index = RecordIndex::build(&mut source, &options)?;
        Ok(Self::with_index(source, index, options))
    }

    /// Uses a previously built (e.g. loaded) index instead of scanning.
    ///
    /// The index is trusted as-is; a record read through a stale index
    /// fails with [`GedcomError::IndexMismatch`].
    pub fn with_index(source: R, index: RecordIndex, options: ParseOptions) -> Self {
        Self { source, index, options }
    }

    pub fn index(&self) -> &RecordIndex {
        &self.index
    }

    pub fn encoding(&self) -> Encoding {
        self.index.encoding()
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Reads the record declaring cross-reference `xref`.
    pub fn find_record(&mut self, xref: &str) -> Result<RawRecord> {
        let entry = self
            .index
            .lookup(xref)
            .cloned()
            .ok_or_else(|| GedcomError::RecordNotFound(xref.to_string()))?;
        self.read_entry(&entry)
    }

    /// Reads the first record without cross-reference tagged `tag`.
    pub fn find_record_by_type(&mut self, tag: &str) -> Result<RawRecord> {
        let entry = self
            .index
            .lookup_by_type(tag)
            .cloned()
            .ok_or_else(|| GedcomError::TypeNotFound(tag.to_string()))?;
        self.read_entry(&entry)
    }

    /// Decodes exactly the byte range of `entry` and parses it as one record.
    pub fn read_entry(&mut self, entry: &IndexEntry) -> Result<RawRecord> {
        debug!(
            "Reading {} at {}+{}",
            entry.xref.as_deref().unwrap_or(&entry.tag),
            entry.byte_offset,
            entry.byte_length
        );
        self.source.seek(SeekFrom::Start(entry.byte_offset))?;
        let encoding = self.index.encoding();
        let slice: Take<&mut R> = (&mut self.source).take(entry.byte_length);
        let lines = LineStream::starting_at(
            decode_with(encoding, slice),
            encoding,
            &self.options,
            entry.line_number.max(1),
        );

        let record = RecordIterator::with_offsets(lines, entry.byte_offset)
            .next()
            .transpose()?;
        match record {
            Some(record)
                if record.xref == entry.xref
                    && record.tag == entry.tag
                    && record.byte_length == entry.byte_length =>
            {
                Ok(record)
            }
            _ => Err(GedcomError::IndexMismatch {
                key: entry.xref.clone().unwrap_or_else(|| entry.tag.clone()),
                offset: entry.byte_offset,
            }),
        }
    }

    /// Streams every record from the start of the source, with byte ranges.
    pub fn records(&mut self) -> Result<SourceRecords<'_, R>> {
        self.source.seek(SeekFrom::Start(0))?;
        let (detection, text) = codec::open(&mut self.source, self.options.encoding)?;
        let lines = LineStream::new(text, detection.encoding, &self.options);
        Ok(RecordIterator::with_offsets(lines, detection.bom_len))
    }

    /// Streams records starting at `byte_offset`.
    ///
    /// `byte_offset` should be a record boundary: an indexed offset, or the
    /// [`bytes_consumed`](RecordIterator::bytes_consumed) of an earlier
    /// iterator. The index's encoding is used; no detection is repeated.
    /// Line numbers continue from the indexed record at that offset, or
    /// restart at 1 when the offset is not indexed.
    pub fn records_from(&mut self, byte_offset: u64) -> Result<ResumedRecords<'_, R>> {
        let start = if byte_offset == 0 {
            self.source.seek(SeekFrom::Start(0))?;
            let mut prefix = [0u8; 3];
            let n = read_prefix(&mut self.source, &mut prefix)?;
            detect::bom_len(&prefix[..n])
        } else {
            byte_offset
        };
        let first_line = self.index.entry_at(start).map_or(1, |entry| entry.line_number.max(1));
        debug!("Resuming at byte {} (line {})", start, first_line);

        self.source.seek(SeekFrom::Start(start))?;
        let encoding = self.index.encoding();
        let lines = LineStream::starting_at(
            decode_with(encoding, &mut self.source),
            encoding,
            &self.options,
            first_line,
        );
        Ok(RecordIterator::with_offsets(lines, start))
    }
}

fn read_prefix<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = codec::read_chunk(reader, &mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
