//! Reading records back during recovery.

use super::record::{decode_envelope_header, RecordType, CRC_SIZE, HEADER_SIZE};
use crate::error::{EngineError, EngineResult};
use crate::storage::StorageBackend;
use tracing::warn;

/// Iterates records of a log, one backend read per header and body.
///
/// Yields `(offset, type, payload)`. Iteration stops cleanly at a torn tail
/// and yields an error (then stops) on corruption.
pub struct LogReader<'a> {
    backend: &'a dyn StorageBackend,
    size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> LogReader<'a> {
    /// Creates a reader starting at offset zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend) -> EngineResult<Self> {
        let size = backend.size()?;
        Ok(Self {
            backend,
            size,
            offset: 0,
            finished: false,
        })
    }

    /// Offset just past the last record returned.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_next(&mut self) -> EngineResult<Option<(u64, RecordType, Vec<u8>)>> {
        let remaining = self.size - self.offset;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            warn!(offset = self.offset, "ignoring truncated record header at log tail");
            return Ok(None);
        }

        let header = self.backend.read_at(self.offset, HEADER_SIZE)?;
        let (record_type, len) = decode_envelope_header(&header)?;

        let body_len = (len + CRC_SIZE) as u64;
        if remaining - (HEADER_SIZE as u64) < body_len {
            warn!(offset = self.offset, "ignoring truncated record payload at log tail");
            return Ok(None);
        }

        let body = self
            .backend
            .read_at(self.offset + HEADER_SIZE as u64, len + CRC_SIZE)?;
        let (payload, crc_bytes) = body.split_at(len);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(payload);
        let computed = hasher.finalize();
        if computed != stored {
            return Err(EngineError::corruption(format!(
                "checksum mismatch in log record at offset {}: expected {stored:#010x}, computed {computed:#010x}",
                self.offset
            )));
        }

        let at = self.offset;
        self.offset += HEADER_SIZE as u64 + body_len;
        Ok(Some((at, record_type, payload.to_vec())))
    }
}

impl Iterator for LogReader<'_> {
    type Item = EngineResult<(u64, RecordType, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBackend;
    use crate::wal::encode_envelope;

    fn image(payloads: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for p in payloads {
            out.extend(encode_envelope(RecordType::Batch, p).unwrap());
        }
        out
    }

    #[test]
    fn reads_all_records() {
        let backend = InMemoryBackend::with_data(image(&[b"first", b"second"]));
        let records: Vec<_> = LogReader::new(&backend)
            .unwrap()
            .collect::<EngineResult<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].2, b"first");
        assert_eq!(records[1].0, 20);
    }

    #[test]
    fn torn_tail_is_clean_end() {
        let mut data = image(&[b"complete", b"torn-record"]);
        data.truncate(data.len() - 3);
        let backend = InMemoryBackend::with_data(data);

        let records: Vec<_> = LogReader::new(&backend)
            .unwrap()
            .collect::<EngineResult<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].2, b"complete");
    }

    #[test]
    fn partial_header_is_clean_end() {
        let mut data = image(&[b"x"]);
        data.extend_from_slice(&[b'R', b'L', b'O']);
        let backend = InMemoryBackend::with_data(data);
        assert_eq!(LogReader::new(&backend).unwrap().count(), 1);
    }

    #[test]
    fn flipped_payload_bit_is_fatal() {
        let mut data = image(&[b"payload"]);
        data[HEADER_SIZE + 2] ^= 0x01;
        let backend = InMemoryBackend::with_data(data);

        let mut reader = LogReader::new(&backend).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.is_corruption());
        assert!(reader.next().is_none());
    }
}
