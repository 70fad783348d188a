//! Index journal reader
//!
//! Handles reading records from the index journal.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{EmberError, Result};

use super::entry::{parse_header, IndexRecord, HEADER_SIZE};

/// Upper bound on a single record's data section; anything larger is garbage
const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// Outcome of reading one record slot
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete, checksummed record
    Record(IndexRecord),
    /// Clean end of file on a record boundary
    End,
    /// The file ends partway through a record
    Truncated,
    /// A complete record slot failed validation
    Corrupt(String),
}

/// Reads records from the index journal
pub struct IndexReader {
    reader: BufReader<File>,
    /// Byte offset just past the last valid record
    position: u64,
}

impl IndexReader {
    /// Open an index journal for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next record slot, classifying how it ended
    pub fn next_outcome(&mut self) -> Result<ReadOutcome> {
        let mut header = [0u8; HEADER_SIZE];
        match read_fully(&mut self.reader, &mut header)? {
            0 => return Ok(ReadOutcome::End),
            n if n < HEADER_SIZE => return Ok(ReadOutcome::Truncated),
            _ => {}
        }

        let (lsn, _crc, len) = parse_header(&header);
        if len > MAX_RECORD_SIZE {
            return Ok(ReadOutcome::Corrupt(format!(
                "Record lsn={} claims {} bytes",
                lsn, len
            )));
        }

        let mut data = vec![0u8; len as usize];
        if read_fully(&mut self.reader, &mut data)? < data.len() {
            return Ok(ReadOutcome::Truncated);
        }

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&data);

        match IndexRecord::deserialize(&bytes) {
            Ok(record) => {
                self.position += bytes.len() as u64;
                Ok(ReadOutcome::Record(record))
            }
            Err(EmberError::IndexCorruption(reason)) => Ok(ReadOutcome::Corrupt(reason)),
            Err(e) => Err(e),
        }
    }

    /// Read the next record
    ///
    /// Returns `Ok(None)` at a clean end of file and an `IndexCorruption`
    /// error for a truncated or invalid record.
    pub fn next_entry(&mut self) -> Result<Option<IndexRecord>> {
        match self.next_outcome()? {
            ReadOutcome::Record(record) => Ok(Some(record)),
            ReadOutcome::End => Ok(None),
            ReadOutcome::Truncated => Err(EmberError::IndexCorruption(format!(
                "Truncated record at offset {}",
                self.position
            ))),
            ReadOutcome::Corrupt(reason) => Err(EmberError::IndexCorruption(reason)),
        }
    }

    /// Byte offset just past the last valid record read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid records, stopping after the first error
    pub fn entries(self) -> IndexIterator {
        IndexIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over index journal records
pub struct IndexIterator {
    reader: IndexReader,
    done: bool,
}

impl Iterator for IndexIterator {
    type Item = Result<IndexRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the stream allows, returning the bytes read
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
