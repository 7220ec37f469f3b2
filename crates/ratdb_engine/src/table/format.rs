//! On-disk layout of table files.

use crate::error::{EngineError, EngineResult};
use crate::types::{SequenceNumber, ValueKind};
use crate::wal::record::Cursor;

/// Magic number closing every table file.
pub const TABLE_MAGIC: [u8; 4] = *b"RTBL";

/// index_off(8) + index_len(8) + index_crc(4) + magic(4)
pub const FOOTER_SIZE: usize = 24;

/// Header in front of every stored value: crc32(4) + len(4).
pub const VALUE_HEADER_SIZE: u64 = 8;

/// Location of a value record inside a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueHandle {
    /// Offset of the record header.
    pub offset: u64,
    /// Length of the value bytes.
    pub len: u32,
}

impl ValueHandle {
    /// Bytes the record occupies in the file.
    #[must_use]
    pub fn record_size(self) -> u64 {
        VALUE_HEADER_SIZE + u64::from(self.len)
    }
}

/// One version stored in a table index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// User key.
    pub key: Vec<u8>,
    /// Sequence the version was written at.
    pub sequence: SequenceNumber,
    /// Tombstone or value.
    pub kind: ValueKind,
    /// Where the value lives; `None` for tombstones.
    pub handle: Option<ValueHandle>,
}

impl TableEntry {
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        buf.push(self.kind.as_byte());
        let handle = self.handle.unwrap_or(ValueHandle { offset: 0, len: 0 });
        buf.extend_from_slice(&handle.offset.to_le_bytes());
        buf.extend_from_slice(&handle.len.to_le_bytes());
    }

    pub(crate) fn decode_from(cursor: &mut Cursor<'_>) -> EngineResult<Self> {
        let key_len = cursor.read_u32()? as usize;
        let key = cursor.read_bytes(key_len)?.to_vec();
        let sequence = SequenceNumber::new(cursor.read_u64()?);
        let kind_byte = cursor.read_u8()?;
        let kind = ValueKind::from_byte(kind_byte)
            .ok_or_else(|| EngineError::corruption(format!("bad value kind {kind_byte}")))?;
        let offset = cursor.read_u64()?;
        let len = cursor.read_u32()?;
        let handle = match kind {
            ValueKind::Value => Some(ValueHandle { offset, len }),
            ValueKind::Deletion => None,
        };
        Ok(Self {
            key,
            sequence,
            kind,
            handle,
        })
    }
}

/// Table footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    /// Offset of the index block.
    pub index_offset: u64,
    /// Length of the index block.
    pub index_len: u64,
    /// CRC32 of the index block.
    pub index_crc: u32,
}

impl Footer {
    /// Encodes the footer.
    #[must_use]
    pub fn encode(&self) -> [u8; FOOTER_SIZE] {
        let mut buf = [0u8; FOOTER_SIZE];
        buf[0..8].copy_from_slice(&self.index_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.index_len.to_le_bytes());
        buf[16..20].copy_from_slice(&self.index_crc.to_le_bytes());
        buf[20..24].copy_from_slice(&TABLE_MAGIC);
        buf
    }

    /// Decodes a footer.
    ///
    /// # Errors
    ///
    /// Returns a corruption error on bad length or magic.
    pub fn decode(data: &[u8]) -> EngineResult<Self> {
        if data.len() != FOOTER_SIZE {
            return Err(EngineError::corruption("bad table footer length"));
        }
        if data[20..24] != TABLE_MAGIC {
            return Err(EngineError::corruption("bad table magic number"));
        }
        let mut cursor = Cursor::new(data);
        Ok(Self {
            index_offset: cursor.read_u64()?,
            index_len: cursor.read_u64()?,
            index_crc: cursor.read_u32()?,
        })
    }
}
