//! Writing table files.

use super::format::{Footer, TableEntry, ValueHandle, VALUE_HEADER_SIZE};
use crate::error::{EngineError, EngineResult};
use crate::manifest::TableMeta;
use crate::types::{FileNumber, SequenceNumber, ValueKind};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Builds a table from versions added in index order: ascending key, then
/// descending sequence.
pub struct TableBuilder {
    writer: BufWriter<File>,
    number: FileNumber,
    level: u32,
    offset: u64,
    entries: Vec<TableEntry>,
}

impl TableBuilder {
    /// Creates a builder writing to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn new(path: &Path, number: FileNumber, level: u32) -> EngineResult<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            number,
            level,
            offset: 0,
            entries: Vec::new(),
        })
    }

    /// Adds one version. Returns the handle of the stored value, `None`
    /// for tombstones.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is too large or the write fails.
    pub fn add(
        &mut self,
        key: &[u8],
        sequence: SequenceNumber,
        value: Option<&[u8]>,
    ) -> EngineResult<Option<ValueHandle>> {
        let handle = match value {
            Some(value) => {
                let len = u32::try_from(value.len()).map_err(|_| {
                    EngineError::invalid_argument(format!(
                        "value of {} bytes is too large",
                        value.len()
                    ))
                })?;
                let handle = ValueHandle {
                    offset: self.offset,
                    len,
                };
                self.writer.write_all(&crc32fast::hash(value).to_le_bytes())?;
                self.writer.write_all(&len.to_le_bytes())?;
                self.writer.write_all(value)?;
                self.offset += VALUE_HEADER_SIZE + u64::from(len);
                Some(handle)
            }
            None => None,
        };

        self.entries.push(TableEntry {
            key: key.to_vec(),
            sequence,
            kind: if value.is_some() {
                ValueKind::Value
            } else {
                ValueKind::Deletion
            },
            handle,
        });
        Ok(handle)
    }

    /// Number of versions added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes index and footer, syncs the file and returns its metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or syncing fails.
    #[allow(clippy::cast_possible_truncation)]
    pub fn finish(mut self) -> EngineResult<TableMeta> {
        let mut index = Vec::new();
        index.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            entry.encode_into(&mut index);
        }

        let footer = Footer {
            index_offset: self.offset,
            index_len: index.len() as u64,
            index_crc: crc32fast::hash(&index),
        };
        self.writer.write_all(&index)?;
        self.writer.write_all(&footer.encode())?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        let file_size = self.writer.get_ref().metadata()?.len();
        let smallest = self.entries.first().map(|e| e.key.clone()).unwrap_or_default();
        let largest = self.entries.last().map(|e| e.key.clone()).unwrap_or_default();

        Ok(TableMeta {
            number: self.number,
            level: self.level,
            file_size,
            entries: self.entries.len() as u64,
            smallest,
            largest,
        })
    }
}
