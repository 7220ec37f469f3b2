//! Record envelope and batch payload encoding.

use crate::error::{EngineError, EngineResult};
use crate::types::SequenceNumber;

/// Magic bytes opening every record.
pub const LOG_MAGIC: [u8; 4] = *b"RLOG";

/// Current record format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Kind of payload carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// One committed write batch.
    Batch = 1,
    /// Full table-set state written to the manifest.
    ManifestState = 2,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Batch),
            2 => Some(Self::ManifestState),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Wraps a payload in the checksummed envelope.
///
/// # Errors
///
/// Returns an error if the payload does not fit the 4-byte length field.
pub fn encode_envelope(record_type: RecordType, payload: &[u8]) -> EngineResult<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        EngineError::invalid_argument(format!("record of {} bytes is too large", payload.len()))
    })?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    buf.extend_from_slice(&LOG_MAGIC);
    buf.extend_from_slice(&LOG_VERSION.to_le_bytes());
    buf.push(record_type.as_byte());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Validates a record header and returns its type and payload length.
///
/// # Errors
///
/// Returns a corruption error for bad magic, version or type.
pub fn decode_envelope_header(header: &[u8]) -> EngineResult<(RecordType, usize)> {
    if header.len() < HEADER_SIZE {
        return Err(EngineError::corruption("truncated record header"));
    }
    if header[0..4] != LOG_MAGIC {
        return Err(EngineError::corruption("bad record magic"));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != LOG_VERSION {
        return Err(EngineError::corruption(format!(
            "unsupported record version {version}"
        )));
    }
    let record_type = RecordType::from_byte(header[6])
        .ok_or_else(|| EngineError::corruption(format!("unknown record type {}", header[6])))?;
    let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
    Ok((record_type, len))
}

/// A resolved mutation as it is logged. Merges are resolved before logging,
/// so only puts and deletions appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedOp {
    /// Target key.
    pub key: Vec<u8>,
    /// New value, or `None` for a deletion.
    pub value: Option<Vec<u8>>,
}

impl LoggedOp {
    /// Creates a put.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Creates a deletion.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// Payload of a [`RecordType::Batch`] record.
///
/// Operation `i` is assigned sequence `sequence + i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    /// Sequence of the first operation.
    pub sequence: SequenceNumber,
    /// Operations in batch order.
    pub ops: Vec<LoggedOp>,
}

impl BatchRecord {
    /// Serializes the batch payload.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        buf.extend_from_slice(&(self.ops.len() as u32).to_le_bytes());
        for op in &self.ops {
            buf.extend_from_slice(&(op.key.len() as u32).to_le_bytes());
            buf.extend_from_slice(&op.key);
            match &op.value {
                Some(value) => {
                    buf.push(1);
                    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
                    buf.extend_from_slice(value);
                }
                None => buf.push(0),
            }
        }
        buf
    }

    /// Deserializes a batch payload.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the payload is malformed.
    pub fn decode(payload: &[u8]) -> EngineResult<Self> {
        let mut cursor = Cursor::new(payload);
        let sequence = SequenceNumber::new(cursor.read_u64()?);
        let count = cursor.read_u32()? as usize;
        let mut ops = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key_len = cursor.read_u32()? as usize;
            let key = cursor.read_bytes(key_len)?.to_vec();
            let value = match cursor.read_u8()? {
                0 => None,
                1 => {
                    let len = cursor.read_u32()? as usize;
                    Some(cursor.read_bytes(len)?.to_vec())
                }
                other => {
                    return Err(EngineError::corruption(format!(
                        "bad operation tag {other} in batch record"
                    )))
                }
            };
            ops.push(LoggedOp { key, value });
        }
        if !cursor.is_empty() {
            return Err(EngineError::corruption("trailing bytes in batch record"));
        }
        Ok(Self { sequence, ops })
    }
}

/// Little-endian reader over a byte slice, reporting short reads as
/// corruption.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> EngineResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| EngineError::corruption("unexpected end of record"))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn read_u8(&mut self) -> EngineResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub(crate) fn read_u32(&mut self) -> EngineResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_u64(&mut self) -> EngineResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_layout() {
        let encoded = encode_envelope(RecordType::Batch, b"xyz").unwrap();
        assert_eq!(encoded.len(), HEADER_SIZE + 3 + CRC_SIZE);
        let (kind, len) = decode_envelope_header(&encoded).unwrap();
        assert_eq!(kind, RecordType::Batch);
        assert_eq!(len, 3);

        let body = &encoded[..encoded.len() - CRC_SIZE];
        let crc = u32::from_le_bytes(encoded[encoded.len() - 4..].try_into().unwrap());
        assert_eq!(crc32fast::hash(body), crc);
    }

    #[test]
    fn header_rejects_bad_magic_and_type() {
        let mut encoded = encode_envelope(RecordType::ManifestState, b"").unwrap();
        encoded[6] = 99;
        assert!(decode_envelope_header(&encoded).unwrap_err().is_corruption());
        encoded[0] = b'X';
        assert!(decode_envelope_header(&encoded).unwrap_err().is_corruption());
    }

    #[test]
    fn batch_payload_keeps_empty_values_distinct_from_deletes() {
        let record = BatchRecord {
            sequence: SequenceNumber::new(41),
            ops: vec![
                LoggedOp::put(b"a".to_vec(), Vec::new()),
                LoggedOp::delete(b"b".to_vec()),
                LoggedOp::put(b"c".to_vec(), b"v".to_vec()),
            ],
        };
        let decoded = BatchRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.ops[0].value.as_deref(), Some(&b""[..]));
        assert!(decoded.ops[1].value.is_none());
    }

    #[test]
    fn truncated_batch_payload_is_corruption() {
        let record = BatchRecord {
            sequence: SequenceNumber::new(1),
            ops: vec![LoggedOp::put(b"key".to_vec(), b"value".to_vec())],
        };
        let encoded = record.encode();
        let err = BatchRecord::decode(&encoded[..encoded.len() - 2]).unwrap_err();
        assert!(err.is_corruption());
    }
}
