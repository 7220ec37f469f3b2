//! Reading table files.

use super::format::{Footer, TableEntry, ValueHandle, FOOTER_SIZE, VALUE_HEADER_SIZE};
use crate::error::{EngineError, EngineResult};
use crate::storage::{FileBackend, StorageBackend};
use crate::types::FileNumber;
use crate::wal::record::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An open table file.
///
/// The reader is shared (behind `Arc`) by every index version pointing
/// into it, so it outlives its removal from the manifest while iterators
/// still reference it.
#[derive(Debug)]
pub struct TableReader {
    number: FileNumber,
    path: PathBuf,
    backend: FileBackend,
}

impl TableReader {
    /// Opens a table, returning the reader and its index entries.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the footer or index is damaged.
    pub fn open(path: &Path, number: FileNumber) -> EngineResult<(Self, Vec<TableEntry>)> {
        let backend = FileBackend::open_read_only(path)?;
        let file_size = backend.size()?;
        if file_size < FOOTER_SIZE as u64 {
            return Err(EngineError::corruption(format!(
                "{}: file too short to be a table",
                path.display()
            )));
        }

        let footer = Footer::decode(&backend.read_at(file_size - FOOTER_SIZE as u64, FOOTER_SIZE)?)?;
        if footer.index_offset.saturating_add(footer.index_len) > file_size - FOOTER_SIZE as u64 {
            return Err(EngineError::corruption(format!(
                "{}: index block out of bounds",
                path.display()
            )));
        }

        let index_len = usize::try_from(footer.index_len)
            .map_err(|_| EngineError::corruption("index block too large"))?;
        let index = backend.read_at(footer.index_offset, index_len)?;
        if crc32fast::hash(&index) != footer.index_crc {
            return Err(EngineError::corruption(format!(
                "{}: index block checksum mismatch",
                path.display()
            )));
        }

        let mut cursor = Cursor::new(&index);
        let count = cursor.read_u32()? as usize;
        let mut entries = Vec::with_capacity(count.min(64 * 1024));
        for _ in 0..count {
            entries.push(TableEntry::decode_from(&mut cursor)?);
        }
        if !cursor.is_empty() {
            return Err(EngineError::corruption(format!(
                "{}: trailing bytes in index block",
                path.display()
            )));
        }

        debug!(table = %number, entries = entries.len(), "opened table");
        Ok((
            Self {
                number,
                path: path.to_path_buf(),
                backend,
            },
            entries,
        ))
    }

    /// File number of this table.
    #[must_use]
    pub fn number(&self) -> FileNumber {
        self.number
    }

    /// Path of the table file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a value, verifying its checksum when `verify` is set.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the record header disagrees with the
    /// index or the checksum does not match.
    pub fn read_value(&self, handle: ValueHandle, verify: bool) -> EngineResult<Vec<u8>> {
        let len = handle.len as usize;
        let mut record = self
            .backend
            .read_at(handle.offset, VALUE_HEADER_SIZE as usize + len)?;

        let stored_crc = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let stored_len = u32::from_le_bytes([record[4], record[5], record[6], record[7]]);
        if stored_len != handle.len {
            return Err(EngineError::corruption(format!(
                "bad value length in {} at offset {}",
                self.path.display(),
                handle.offset
            )));
        }

        let value = record.split_off(VALUE_HEADER_SIZE as usize);
        if verify && crc32fast::hash(&value) != stored_crc {
            return Err(EngineError::corruption(format!(
                "block checksum mismatch in {} at offset {}",
                self.path.display(),
                handle.offset
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableBuilder;
    use crate::types::{SequenceNumber, ValueKind};
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::tempdir;

    fn build(path: &Path) -> Vec<Option<ValueHandle>> {
        let mut builder = TableBuilder::new(path, FileNumber::new(5), 0).unwrap();
        let handles = vec![
            builder.add(b"a", SequenceNumber::new(3), Some(b"apple")).unwrap(),
            builder.add(b"b", SequenceNumber::new(2), None).unwrap(),
            builder.add(b"b", SequenceNumber::new(1), Some(b"")).unwrap(),
        ];
        let meta = builder.finish().unwrap();
        assert_eq!(meta.entries, 3);
        assert_eq!(meta.smallest, b"a");
        assert_eq!(meta.largest, b"b");
        handles
    }

    #[test]
    fn reads_index_and_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000005.sst");
        let handles = build(&path);

        let (reader, entries) = TableReader::open(&path, FileNumber::new(5)).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].kind, ValueKind::Deletion);
        assert_eq!(entries[0].handle, handles[0]);

        assert_eq!(reader.read_value(handles[0].unwrap(), true).unwrap(), b"apple");
        assert!(reader.read_value(handles[2].unwrap(), true).unwrap().is_empty());
    }

    #[test]
    fn damaged_value_fails_only_its_own_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000005.sst");
        let handles = build(&path);
        let apple = handles[0].unwrap();

        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(apple.offset + VALUE_HEADER_SIZE + 1))
            .unwrap();
        file.write_all(b"X").unwrap();
        drop(file);

        let (reader, _) = TableReader::open(&path, FileNumber::new(5)).unwrap();
        let err = reader.read_value(apple, true).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(reader.read_value(apple, false).unwrap(), b"aXple");
        assert!(reader.read_value(handles[2].unwrap(), true).is_ok());
    }

    #[test]
    fn damaged_index_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000005.sst");
        build(&path);

        let len = std::fs::metadata(&path).unwrap().len();
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(len - FOOTER_SIZE as u64 - 3)).unwrap();
        file.write_all(b"\xff").unwrap();
        drop(file);

        assert!(TableReader::open(&path, FileNumber::new(5))
            .unwrap_err()
            .is_corruption());
    }
}
