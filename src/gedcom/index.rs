//! Persistent record index.
//!
//! One linear pass over a seekable source records where every top-level
//! record lives. Records with a cross-reference are keyed by it; the rest
//! (`HEAD`, `TRLR`, ...) are keyed by their tag. The first occurrence of a
//! key wins.
//!
//! # Serialized layout
//! ```text
//! [4 bytes]  magic "GIDX"
//! [u32]      format version
//! [string]   encoding name
//! [u64]      entry count
//! [entries]  has_xref u8, [xref string], tag string,
//!            byte_offset u64, byte_length u64, line_number u64
//! [u32]      Adler-32 of everything above
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};

use adler2::adler32_slice;
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use log::{debug, info, trace};

use crate::gedcom::codec;
use crate::gedcom::format::stream::LineStream;
use crate::gedcom::iter::RecordIterator;
use crate::gedcom::types::error::{GedcomError, Result};
use crate::gedcom::types::models::{Encoding, IndexEntry, ParseOptions, RawRecord};
use crate::gedcom::utils;

/// Version of the serialized layout. Any other value is rejected on load.
pub const FORMAT_VERSION: u32 = 1;

const MAGIC: &[u8; 4] = b"GIDX";

/// Byte ranges of every top-level record in one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIndex {
    version: u32,
    encoding: Encoding,
    by_xref: HashMap<String, IndexEntry>,
    by_type: HashMap<String, IndexEntry>,
}

impl RecordIndex {
    fn empty(encoding: Encoding) -> Self {
        Self {
            version: FORMAT_VERSION,
            encoding,
            by_xref: HashMap::new(),
            by_type: HashMap::new(),
        }
    }

    /// Scans `source` from its start and indexes every record.
    ///
    /// The source is rewound to its start afterwards.
    pub fn build<R: Read + Seek>(source: &mut R, options: &ParseOptions) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let index = {
            let (detection, text) = codec::open(&mut *source, options.encoding)?;
            let lines = LineStream::new(text, detection.encoding, options);
            let mut index = Self::empty(detection.encoding);
            for record in RecordIterator::with_offsets(lines, detection.bom_len) {
                index.insert(&record?);
            }
            index
        };
        source.seek(SeekFrom::Start(0))?;

        info!(
            "Index built: {} record(s) by xref, {} by type, encoding {}",
            index.by_xref.len(),
            index.by_type.len(),
            index.encoding
        );
        Ok(index)
    }

    /// Adds a record; returns `false` if its key was already present.
    pub(crate) fn insert(&mut self, record: &RawRecord) -> bool {
        let entry = IndexEntry {
            xref: record.xref.clone(),
            tag: record.tag.clone(),
            byte_offset: record.byte_offset,
            byte_length: record.byte_length,
            line_number: record.lines.first().map_or(0, |line| line.line_number),
        };
        self.insert_entry(entry)
    }

    fn insert_entry(&mut self, entry: IndexEntry) -> bool {
        let (map, key) = match &entry.xref {
            Some(xref) => (&mut self.by_xref, xref.clone()),
            None => (&mut self.by_type, entry.tag.clone()),
        };
        match map.entry(key) {
            Entry::Vacant(slot) => {
                trace!("Indexed {} at {}+{}", slot.key(), entry.byte_offset, entry.byte_length);
                slot.insert(entry);
                true
            }
            Entry::Occupied(slot) => {
                debug!(
                    "Duplicate key {} at byte {} ignored; first occurrence at byte {} kept",
                    slot.key(),
                    entry.byte_offset,
                    slot.get().byte_offset
                );
                false
            }
        }
    }

    /// Entry of the record declaring cross-reference `xref` (e.g. `"@I1@"`).
    pub fn lookup(&self, xref: &str) -> Option<&IndexEntry> {
        self.by_xref.get(xref)
    }

    /// Entry of the first record without cross-reference whose tag is `tag`.
    pub fn lookup_by_type(&self, tag: &str) -> Option<&IndexEntry> {
        self.by_type.get(tag)
    }

    /// The entry whose record starts exactly at `byte_offset`, if any.
    pub fn entry_at(&self, byte_offset: u64) -> Option<&IndexEntry> {
        self.by_xref
            .values()
            .chain(self.by_type.values())
            .find(|entry| entry.byte_offset == byte_offset)
    }

    /// All entries in source order.
    pub fn entries(&self) -> Vec<&IndexEntry> {
        let mut entries: Vec<&IndexEntry> =
            self.by_xref.values().chain(self.by_type.values()).collect();
        entries.sort_by_key(|entry| entry.byte_offset);
        entries
    }

    pub fn len(&self) -> usize {
        self.by_xref.len() + self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encoding detected when the index was built.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Writes the index in its versioned binary form.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.write_u32::<BigEndian>(self.version)?;
        utils::write_string(&mut buf, self.encoding.name())?;

        let entries = self.entries();
        buf.write_u64::<BigEndian>(entries.len() as u64)?;
        for entry in entries {
            match &entry.xref {
                Some(xref) => {
                    buf.write_u8(1)?;
                    utils::write_string(&mut buf, xref)?;
                }
                None => buf.write_u8(0)?,
            }
            utils::write_string(&mut buf, &entry.tag)?;
            buf.write_u64::<BigEndian>(entry.byte_offset)?;
            buf.write_u64::<BigEndian>(entry.byte_length)?;
            buf.write_u64::<BigEndian>(entry.line_number)?;
        }

        let checksum = adler32_slice(&buf);
        buf.write_u32::<BigEndian>(checksum)?;
        writer.write_all(&buf)?;
        debug!("Index saved: {} bytes, checksum {:#010x}", buf.len(), checksum);
        Ok(())
    }

    /// Reads an index written by [`RecordIndex::save`].
    ///
    /// A different format version is rejected outright, without trying to
    /// interpret the rest of the data.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        if data.len() < 8 || &data[..4] != MAGIC {
            return Err(GedcomError::CorruptIndex("missing index header".to_string()));
        }
        let version = BigEndian::read_u32(&data[4..8]);
        if version != FORMAT_VERSION {
            return Err(GedcomError::IndexVersionMismatch {
                expected: FORMAT_VERSION,
                found: version,
            });
        }
        if data.len() < 12 {
            return Err(GedcomError::CorruptIndex("missing checksum".to_string()));
        }

        let (body, trailer) = data.split_at(data.len() - 4);
        let expected = BigEndian::read_u32(trailer);
        let actual = adler32_slice(body);
        trace!("Index checksum: expected={:#010x}, actual={:#010x}", expected, actual);
        if expected != actual {
            return Err(GedcomError::ChecksumMismatch { expected, actual });
        }

        let mut reader = &body[8..];
        let name = utils::read_string(&mut reader, "encoding name")?;
        let encoding = Encoding::from_name(&name)
            .ok_or_else(|| GedcomError::CorruptIndex(format!("unknown encoding {name:?}")))?;

        let mut index = Self::empty(encoding);
        let count = utils::read_u64(&mut reader, "entry count")?;
        for _ in 0..count {
            let xref = match utils::read_u8(&mut reader, "entry flags")? {
                0 => None,
                1 => Some(utils::read_string(&mut reader, "xref")?),
                other => {
                    return Err(GedcomError::CorruptIndex(format!("invalid entry flag {other}")))
                }
            };
            let entry = IndexEntry {
                xref,
                tag: utils::read_string(&mut reader, "tag")?,
                byte_offset: utils::read_u64(&mut reader, "byte offset")?,
                byte_length: utils::read_u64(&mut reader, "byte length")?,
                line_number: utils::read_u64(&mut reader, "line number")?,
            };
            if !index.insert_entry(entry) {
                return Err(GedcomError::CorruptIndex("duplicate index key".to_string()));
            }
        }
        if !reader.is_empty() {
            return Err(GedcomError::CorruptIndex(format!(
                "{} unexpected trailing byte(s)",
                reader.len()
            )));
        }

        debug!("Index loaded: {} entries, encoding {}", index.len(), encoding);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &[u8] = b"0 HEAD\n1 CHAR UTF-8\n0 @I1@ INDI\n1 NAME A\n0 @I1@ INDI\n1 NAME dup\n0 @F1@ FAM\n0 TRLR\n";

    fn sample_index() -> RecordIndex {
        RecordIndex::build(&mut Cursor::new(SAMPLE), &ParseOptions::default()).unwrap()
    }

    #[test]
    fn build_keys_by_xref_and_type() {
        let index = sample_index();
        assert_eq!(index.len(), 4);
        assert_eq!(index.encoding(), Encoding::Utf8);
        let head = index.lookup_by_type("HEAD").unwrap();
        assert_eq!((head.byte_offset, head.byte_length, head.line_number), (0, 20, 1));
        assert_eq!(index.lookup("@F1@").unwrap().tag, "FAM");
        assert!(index.lookup("@I9@").is_none());
        assert!(index.lookup_by_type("INDI").is_none());
    }

    #[test]
    fn first_duplicate_wins() {
        let entry = sample_index().lookup("@I1@").cloned().unwrap();
        assert_eq!(entry.byte_offset, 20);
        assert_eq!(entry.line_number, 3);
    }

    #[test]
    fn build_rewinds_source() {
        let mut source = Cursor::new(SAMPLE);
        RecordIndex::build(&mut source, &ParseOptions::default()).unwrap();
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn save_then_load_is_identical() {
        let index = sample_index();
        let mut blob = Vec::new();
        index.save(&mut blob).unwrap();
        let loaded = RecordIndex::load(&mut blob.as_slice()).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn version_mismatch_is_fatal() {
        let mut blob = Vec::new();
        sample_index().save(&mut blob).unwrap();
        BigEndian::write_u32(&mut blob[4..8], FORMAT_VERSION + 1);
        let err = RecordIndex::load(&mut blob.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            GedcomError::IndexVersionMismatch { expected: FORMAT_VERSION, found } if found == FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn corruption_is_detected() {
        let mut blob = Vec::new();
        sample_index().save(&mut blob).unwrap();

        let mut flipped = blob.clone();
        let mid = flipped.len() / 2;
        flipped[mid] ^= 0x55;
        assert!(matches!(
            RecordIndex::load(&mut flipped.as_slice()),
            Err(GedcomError::ChecksumMismatch { .. })
        ));

        assert!(matches!(
            RecordIndex::load(&mut &b"NOPE\0\0\0\x01"[..]),
            Err(GedcomError::CorruptIndex(_))
        ));
        assert!(matches!(
            RecordIndex::load(&mut &blob[..6]),
            Err(GedcomError::CorruptIndex(_))
        ));
    }
}
