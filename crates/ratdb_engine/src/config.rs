//! Database and per-call configuration.

use crate::comparator::{BytewiseComparator, Comparator};
use crate::merge::MergeOperator;
use crate::types::SequenceNumber;
use std::sync::Arc;

/// Default size of the in-memory write buffer before it is flushed to a
/// table file.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the database already exists.
    pub error_if_exists: bool,

    /// Whether to verify every stored value checksum while opening.
    pub paranoid_checks: bool,

    /// Bytes of buffered writes that trigger an automatic flush.
    pub write_buffer_size: usize,

    /// Key ordering.
    pub comparator: Arc<dyn Comparator>,

    /// Operator resolving merge records, if any.
    pub merge_operator: Option<Arc<dyn MergeOperator>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            comparator: Arc::new(BytewiseComparator),
            merge_operator: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to verify stored checksums at open.
    #[must_use]
    pub const fn paranoid_checks(mut self, value: bool) -> Self {
        self.paranoid_checks = value;
        self
    }

    /// Sets the write buffer size.
    #[must_use]
    pub const fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Sets the comparator.
    #[must_use]
    pub fn comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Sets the merge operator.
    #[must_use]
    pub fn merge_operator(mut self, operator: Arc<dyn MergeOperator>) -> Self {
        self.merge_operator = Some(operator);
        self
    }
}

/// Options for a single read.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Verify value checksums when reading from table files.
    pub verify_checksums: bool,
    /// Accepted for compatibility; the engine keeps no block cache.
    pub fill_cache: bool,
    /// Read at this snapshot instead of the latest state.
    pub snapshot: Option<SnapshotRef>,
}

/// Snapshot identity recorded in read options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRef {
    /// Owning database instance.
    pub db_id: u64,
    /// Sequence the snapshot reads at.
    pub sequence: SequenceNumber,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            fill_cache: true,
            snapshot: None,
        }
    }
}

/// Options for a single write.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Sync the log before acknowledging the write.
    pub sync: bool,
}

/// Options for an explicit flush.
#[derive(Debug, Clone, Copy)]
pub struct FlushOptions {
    /// Block until the flush completes.
    pub wait: bool,
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self { wait: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(!config.create_if_missing);
        assert!(!config.error_if_exists);
        assert!(!config.paranoid_checks);
        assert_eq!(config.write_buffer_size, DEFAULT_WRITE_BUFFER_SIZE);
        assert_eq!(config.comparator.name(), BytewiseComparator::NAME);
        assert!(config.merge_operator.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(true)
            .paranoid_checks(true)
            .write_buffer_size(1024);

        assert!(config.create_if_missing);
        assert!(config.paranoid_checks);
        assert_eq!(config.write_buffer_size, 1024);
    }

    #[test]
    fn per_call_defaults() {
        let read = ReadOptions::default();
        assert!(read.verify_checksums);
        assert!(read.snapshot.is_none());
        assert!(!WriteOptions::default().sync);
        assert!(FlushOptions::default().wait);
    }
}
