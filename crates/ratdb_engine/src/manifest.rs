//! Manifest: the persistent description of the table set.
//!
//! `MANIFEST` is a record log (see [`crate::wal`]). Every change to the
//! table set appends a full [`Manifest`] state record; the last valid record
//! wins at recovery. The file is rewritten with a single record each time
//! the database is opened, so it stays small.
//!
//! Because the file only grows between opens, a prefix of `MANIFEST` ending
//! at a record boundary is itself a consistent manifest. Backups rely on
//! this: they copy the prefix reported by live-file enumeration.

use crate::error::{EngineError, EngineResult};
use crate::types::{FileNumber, SequenceNumber};
use crate::wal::{LogWriter, RecordType};
use crate::wal::record::Cursor;

/// Magic bytes opening every manifest state payload.
pub const MANIFEST_MAGIC: [u8; 4] = *b"RMFN";

/// Current manifest payload version.
pub const MANIFEST_VERSION: u16 = 1;

/// Metadata of one live table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    /// File number (`NNNNNN.sst`).
    pub number: FileNumber,
    /// Level: 0 for flushed tables, 1 for compaction output.
    pub level: u32,
    /// Size of the file in bytes.
    pub file_size: u64,
    /// Number of versions stored.
    pub entries: u64,
    /// Smallest key in the table.
    pub smallest: Vec<u8>,
    /// Largest key in the table.
    pub largest: Vec<u8>,
}

/// Database manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Name of the comparator the database was created with.
    pub comparator: String,
    /// Next unused file number.
    pub next_file_number: u64,
    /// Highest sequence number persisted in tables.
    pub last_sequence: SequenceNumber,
    /// Logs numbered below this have been flushed into tables.
    pub log_number: FileNumber,
    /// Live tables, in creation order.
    pub tables: Vec<TableMeta>,
}

impl Manifest {
    /// Creates the manifest of an empty database.
    #[must_use]
    pub fn new(comparator: impl Into<String>) -> Self {
        Self {
            comparator: comparator.into(),
            next_file_number: 1,
            last_sequence: SequenceNumber::new(0),
            log_number: FileNumber::new(0),
            tables: Vec::new(),
        }
    }

    /// Hands out the next file number.
    pub fn allocate_file_number(&mut self) -> FileNumber {
        let number = FileNumber::new(self.next_file_number);
        self.next_file_number += 1;
        number
    }

    /// Removes tables by number, returning the removed metadata.
    pub fn remove_tables(&mut self, numbers: &[FileNumber]) -> Vec<TableMeta> {
        let (removed, kept) = std::mem::take(&mut self.tables)
            .into_iter()
            .partition(|t| numbers.contains(&t.number));
        self.tables = kept;
        removed
    }

    /// Number of tables at a level.
    #[must_use]
    pub fn tables_at_level(&self, level: u32) -> usize {
        self.tables.iter().filter(|t| t.level == level).count()
    }

    /// Total size of live table files.
    #[must_use]
    pub fn total_table_bytes(&self) -> u64 {
        self.tables.iter().map(|t| t.file_size).sum()
    }

    /// Encodes the manifest state payload.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MANIFEST_MAGIC);
        buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());

        let name = self.comparator.as_bytes();
        buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
        buf.extend_from_slice(name);

        buf.extend_from_slice(&self.next_file_number.to_le_bytes());
        buf.extend_from_slice(&self.last_sequence.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.log_number.as_u64().to_le_bytes());

        buf.extend_from_slice(&(self.tables.len() as u32).to_le_bytes());
        for table in &self.tables {
            buf.extend_from_slice(&table.number.as_u64().to_le_bytes());
            buf.extend_from_slice(&table.level.to_le_bytes());
            buf.extend_from_slice(&table.file_size.to_le_bytes());
            buf.extend_from_slice(&table.entries.to_le_bytes());
            buf.extend_from_slice(&(table.smallest.len() as u32).to_le_bytes());
            buf.extend_from_slice(&table.smallest);
            buf.extend_from_slice(&(table.largest.len() as u32).to_le_bytes());
            buf.extend_from_slice(&table.largest);
        }
        buf
    }

    /// Decodes a manifest state payload.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the payload is malformed.
    pub fn decode(data: &[u8]) -> EngineResult<Self> {
        let mut cursor = Cursor::new(data);
        if cursor.read_bytes(4)? != MANIFEST_MAGIC {
            return Err(EngineError::corruption("invalid manifest magic"));
        }
        let version = u16::from_le_bytes([cursor.read_u8()?, cursor.read_u8()?]);
        if version != MANIFEST_VERSION {
            return Err(EngineError::corruption(format!(
                "unsupported manifest version {version}"
            )));
        }

        let name_len = cursor.read_u32()? as usize;
        let comparator = String::from_utf8(cursor.read_bytes(name_len)?.to_vec())
            .map_err(|_| EngineError::corruption("comparator name is not UTF-8"))?;

        let next_file_number = cursor.read_u64()?;
        let last_sequence = SequenceNumber::new(cursor.read_u64()?);
        let log_number = FileNumber::new(cursor.read_u64()?);

        let count = cursor.read_u32()? as usize;
        let mut tables = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let number = FileNumber::new(cursor.read_u64()?);
            let level = cursor.read_u32()?;
            let file_size = cursor.read_u64()?;
            let entries = cursor.read_u64()?;
            let len = cursor.read_u32()? as usize;
            let smallest = cursor.read_bytes(len)?.to_vec();
            let len = cursor.read_u32()? as usize;
            let largest = cursor.read_bytes(len)?.to_vec();
            tables.push(TableMeta {
                number,
                level,
                file_size,
                entries,
                smallest,
                largest,
            });
        }

        if !cursor.is_empty() {
            return Err(EngineError::corruption("trailing bytes in manifest"));
        }

        Ok(Self {
            comparator,
            next_file_number,
            last_sequence,
            log_number,
            tables,
        })
    }
}

/// Appends manifest states to the open `MANIFEST`.
pub struct ManifestLog {
    writer: LogWriter,
}

impl ManifestLog {
    /// Wraps a writer positioned at the end of `MANIFEST`.
    pub fn new(writer: LogWriter) -> Self {
        Self { writer }
    }

    /// Durably records a new manifest state.
    ///
    /// # Errors
    ///
    /// Returns an error if the append or sync fails.
    pub fn record(&mut self, manifest: &Manifest) -> EngineResult<()> {
        self.writer
            .append(RecordType::ManifestState, &manifest.encode())?;
        self.writer.sync()
    }

    /// Current size of `MANIFEST` in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn size(&self) -> EngineResult<u64> {
        self.writer.size()
    }
}
