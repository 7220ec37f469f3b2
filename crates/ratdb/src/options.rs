//! Host-side configuration.
//!
//! Each options value is plain Rust data. It is turned into an engine
//! handle, owned by a `HandleGuard`, only for the call that needs it.

use crate::comparator::Comparator;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::handle::{
    FlushOptionsKind, HandleGuard, OptionsKind, ReadOptionsKind, WriteOptionsKind,
};
use crate::merge::MergeOperator;
use crate::snapshot::Snapshot;
use ratdb_engine::capi;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Default write buffer size (4 MiB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Options for opening a database.
#[derive(Clone)]
pub struct Options {
    /// Create the database if it does not exist.
    pub create_if_missing: bool,
    /// Fail if the database already exists.
    pub error_if_exists: bool,
    /// Verify every stored checksum while opening.
    pub paranoid_checks: bool,
    /// Buffered bytes that trigger a flush to a table file.
    pub write_buffer_size: usize,
    /// Custom key ordering. Must be the same every time a database is
    /// opened.
    pub comparator: Option<Arc<Comparator>>,
    /// Operator resolving [`Database::merge`].
    pub merge_operator: Option<Arc<MergeOperator>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            comparator: None,
            merge_operator: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("create_if_missing", &self.create_if_missing)
            .field("error_if_exists", &self.error_if_exists)
            .field("paranoid_checks", &self.paranoid_checks)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("comparator", &self.comparator.as_ref().map(|c| c.name()))
            .field("merge_operator", &self.merge_operator.as_ref().map(|m| m.name()))
            .finish()
    }
}

impl Options {
    /// Creates options with default values.
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

    /// Sets whether to fail if the database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to verify checksums at open.
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
    pub fn comparator(mut self, comparator: Arc<Comparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Sets the merge operator.
    #[must_use]
    pub fn merge_operator(mut self, operator: Arc<MergeOperator>) -> Self {
        self.merge_operator = Some(operator);
        self
    }

    /// Materializes an engine options handle. The handle refers to the
    /// comparator and merge operator, so `self` must outlive it.
    pub(crate) fn to_handle(&self) -> Result<HandleGuard<OptionsKind>> {
        let guard = HandleGuard::<OptionsKind>::acquire(capi::ratdb_options_create())?;
        let raw = guard.get()?;
        // SAFETY: raw is live; callback handles are live while self is.
        unsafe {
            capi::ratdb_options_set_create_if_missing(raw, u8::from(self.create_if_missing));
            capi::ratdb_options_set_error_if_exists(raw, u8::from(self.error_if_exists));
            capi::ratdb_options_set_paranoid_checks(raw, u8::from(self.paranoid_checks));
            capi::ratdb_options_set_write_buffer_size(raw, self.write_buffer_size);
            if let Some(comparator) = &self.comparator {
                capi::ratdb_options_set_comparator(raw, comparator.raw()?);
            }
            if let Some(operator) = &self.merge_operator {
                capi::ratdb_options_set_merge_operator(raw, operator.raw()?);
            }
        }
        Ok(guard)
    }
}

/// Options for a read.
///
/// Borrowing a [`Snapshot`] ties these options to it: the snapshot cannot
/// be released while the options are alive.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions<'s> {
    /// Verify value checksums.
    pub verify_checksums: bool,
    /// Passed through to the engine.
    pub fill_cache: bool,
    snapshot: Option<&'s Snapshot<'s>>,
}

impl Default for ReadOptions<'_> {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            fill_cache: true,
            snapshot: None,
        }
    }
}

impl<'s> ReadOptions<'s> {
    /// Creates read options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to verify checksums.
    #[must_use]
    pub const fn verify_checksums(mut self, value: bool) -> Self {
        self.verify_checksums = value;
        self
    }

    /// Sets whether reads fill the engine cache.
    #[must_use]
    pub const fn fill_cache(mut self, value: bool) -> Self {
        self.fill_cache = value;
        self
    }

    /// Reads through these options see `snapshot`.
    #[must_use]
    pub fn snapshot(mut self, snapshot: &'s Snapshot<'s>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// The attached snapshot, if any.
    #[must_use]
    pub fn snapshot_ref(&self) -> Option<&'s Snapshot<'s>> {
        self.snapshot
    }

    /// Materializes an engine read options handle for a call on `db`.
    ///
    /// Fails with [`Error::ProgrammerMisuse`] if the snapshot belongs to a
    /// different database.
    pub(crate) fn to_handle(&self, db: &Database) -> Result<HandleGuard<ReadOptionsKind>> {
        let snapshot = match self.snapshot {
            Some(snapshot) if !snapshot.belongs_to(db) => {
                error!(path = %db.path().display(), "snapshot used with a database that did not create it");
                return Err(Error::misuse(
                    "snapshot used with a database that did not create it",
                ));
            }
            Some(snapshot) => Some(snapshot.raw()?),
            None => None,
        };
        let guard = HandleGuard::<ReadOptionsKind>::acquire(capi::ratdb_readoptions_create())?;
        let raw = guard.get()?;
        // SAFETY: raw is live; the snapshot handle is live for 's.
        unsafe {
            capi::ratdb_readoptions_set_verify_checksums(raw, u8::from(self.verify_checksums));
            capi::ratdb_readoptions_set_fill_cache(raw, u8::from(self.fill_cache));
            if let Some(snapshot) = snapshot {
                capi::ratdb_readoptions_set_snapshot(raw, snapshot.cast_const());
            }
        }
        Ok(guard)
    }
}

/// Options for a write.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Sync the log before the write returns.
    pub sync: bool,
}

impl WriteOptions {
    /// Creates write options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether writes are synced.
    #[must_use]
    pub const fn sync(mut self, value: bool) -> Self {
        self.sync = value;
        self
    }

    pub(crate) fn to_handle(self) -> Result<HandleGuard<WriteOptionsKind>> {
        let guard = HandleGuard::<WriteOptionsKind>::acquire(capi::ratdb_writeoptions_create())?;
        // SAFETY: the handle is live.
        unsafe { capi::ratdb_writeoptions_set_sync(guard.get()?, u8::from(self.sync)) };
        Ok(guard)
    }
}

/// Options for [`Database::flush`].
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

impl FlushOptions {
    /// Creates flush options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to wait.
    #[must_use]
    pub const fn wait(mut self, value: bool) -> Self {
        self.wait = value;
        self
    }

    pub(crate) fn to_handle(self) -> Result<HandleGuard<FlushOptionsKind>> {
        let guard = HandleGuard::<FlushOptionsKind>::acquire(capi::ratdb_flushoptions_create())?;
        // SAFETY: the handle is live.
        unsafe { capi::ratdb_flushoptions_set_wait(guard.get()?, u8::from(self.wait)) };
        Ok(guard)
    }
}
