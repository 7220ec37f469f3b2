//! Appending records to a log file.

use super::record::{encode_envelope, RecordType};
use crate::error::EngineResult;
use crate::storage::StorageBackend;
use crate::types::FileNumber;

/// Appends checksummed records to a backend.
pub struct LogWriter {
    number: FileNumber,
    backend: Box<dyn StorageBackend>,
}

impl LogWriter {
    /// Creates a writer appending to `backend`.
    pub fn new(number: FileNumber, backend: Box<dyn StorageBackend>) -> Self {
        Self { number, backend }
    }

    /// Number of the file being written.
    #[must_use]
    pub fn number(&self) -> FileNumber {
        self.number
    }

    /// Appends one record and pushes it to the OS. Returns the offset it was
    /// written at.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn append(&mut self, record_type: RecordType, payload: &[u8]) -> EngineResult<u64> {
        let encoded = encode_envelope(record_type, payload)?;
        let offset = self.backend.append(&encoded)?;
        self.backend.flush()?;
        Ok(offset)
    }

    /// Makes every appended record durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> EngineResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Current size of the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn size(&self) -> EngineResult<u64> {
        Ok(self.backend.size()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBackend;

    #[test]
    fn offsets_advance() {
        let mut writer = LogWriter::new(FileNumber::new(3), Box::new(InMemoryBackend::new()));
        assert_eq!(writer.append(RecordType::Batch, b"one").unwrap(), 0);
        let second = writer.append(RecordType::Batch, b"two").unwrap();
        assert_eq!(second, 18);
        assert_eq!(writer.size().unwrap(), 36);
        assert_eq!(writer.number(), FileNumber::new(3));
    }
}
