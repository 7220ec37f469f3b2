//! The database handle.

use crate::backup::{FileDeletionGuard, LiveFiles};
use crate::batch::WriteBatch;
use crate::buffer::RecycledBuffer;
use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::ffi::{self, c_string, raw_parts, ErrorSlot};
use crate::handle::{DatabaseKind, HandleGuard};
use crate::iterator::DbIterator;
use crate::merge::MergeOperator;
use crate::multi_get;
use crate::options::{FlushOptions, Options, ReadOptions, WriteOptions};
use crate::range::Range;
use crate::snapshot::Snapshot;
use ratdb_engine::capi::{self, RatDbHandle};
use std::ffi::{c_char, c_int, CStr};
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::Arc;
use tracing::{debug, error, info};

/// An open database.
///
/// Safe to share between threads; every method takes `&self`. Iterators
/// and snapshots borrow the database, so it cannot be closed while they
/// are alive.
pub struct Database {
    handle: HandleGuard<DatabaseKind>,
    path: PathBuf,
    _comparator: Option<Arc<Comparator>>,
    _merge_operator: Option<Arc<MergeOperator>>,
}

// SAFETY: the engine handle supports concurrent use from any thread.
unsafe impl Send for Database {}
unsafe impl Sync for Database {}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::invalid_argument(format!("{} is not valid UTF-8", path.display())))
}

impl Database {
    /// Opens (or with `create_if_missing`, creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineOpen`] with the engine's diagnostic when the
    /// database is missing, locked, corrupted or was created with another
    /// comparator.
    pub fn open(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        let path = path.as_ref();
        let name = c_string(path_str(path)?, "path")?;
        let engine_options = options.to_handle()?;
        let mut err = ErrorSlot::new();
        // SAFETY: live options handle and NUL-terminated name.
        let raw = unsafe { capi::ratdb_open(engine_options.as_ptr(), name.as_ptr(), err.as_out()) };
        if let Some(message) = err.take() {
            return Err(Error::open(message));
        }
        let handle = HandleGuard::acquire(raw)?;
        info!(path = %path.display(), "opened database");
        Ok(Self {
            handle,
            path: path.to_path_buf(),
            _comparator: options.comparator.clone(),
            _merge_operator: options.merge_operator.clone(),
        })
    }

    /// Removes the database at `path`. A missing path is not an error.
    ///
    /// # Errors
    ///
    /// Returns the engine's error, for example if the database is open.
    pub fn destroy(path: impl AsRef<Path>, options: &Options) -> Result<()> {
        let path = path.as_ref();
        let name = c_string(path_str(path)?, "path")?;
        let engine_options = options.to_handle()?;
        let mut err = ErrorSlot::new();
        // SAFETY: as for open.
        unsafe { capi::ratdb_destroy_db(engine_options.as_ptr(), name.as_ptr(), err.as_out()) };
        err.check(ffi::operation)?;
        info!(path = %path.display(), "destroyed database");
        Ok(())
    }

    /// Directory the database lives in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn raw(&self) -> *mut RatDbHandle {
        self.handle.as_ptr()
    }

    /// Stores `key` -> `value`. Both are copied before the call returns.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the write fails.
    pub fn put(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        let wo = options.to_handle()?;
        let (k, klen) = raw_parts(key);
        let (v, vlen) = raw_parts(value);
        let mut err = ErrorSlot::new();
        // SAFETY: live handles; slices valid for the call.
        unsafe { capi::ratdb_put(self.raw(), wo.as_ptr(), k, klen, v, vlen, err.as_out()) };
        err.check(ffi::operation)
    }

    /// Removes `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the write fails.
    pub fn delete(&self, options: &WriteOptions, key: &[u8]) -> Result<()> {
        let wo = options.to_handle()?;
        let (k, klen) = raw_parts(key);
        let mut err = ErrorSlot::new();
        // SAFETY: as for put.
        unsafe { capi::ratdb_delete(self.raw(), wo.as_ptr(), k, klen, err.as_out()) };
        err.check(ffi::operation)
    }

    /// Merges `operand` into `key` with the configured merge operator.
    ///
    /// # Errors
    ///
    /// Fails with the engine's `Not supported` error when no merge operator
    /// is configured, or if the operator rejects the operands.
    pub fn merge(&self, options: &WriteOptions, key: &[u8], operand: &[u8]) -> Result<()> {
        let wo = options.to_handle()?;
        let (k, klen) = raw_parts(key);
        let (v, vlen) = raw_parts(operand);
        let mut err = ErrorSlot::new();
        // SAFETY: as for put.
        unsafe { capi::ratdb_merge(self.raw(), wo.as_ptr(), k, klen, v, vlen, err.as_out()) };
        err.check(ffi::operation)
    }

    /// Applies every operation in `batch` in one atomic engine write.
    ///
    /// # Errors
    ///
    /// Returns the engine's error; on error no operation is visible.
    pub fn write(&self, options: &WriteOptions, batch: &WriteBatch) -> Result<()> {
        let wo = options.to_handle()?;
        let mut err = ErrorSlot::new();
        // SAFETY: live handles.
        unsafe { capi::ratdb_write(self.raw(), wo.as_ptr(), batch.raw(), err.as_out()) };
        err.check(ffi::operation)
    }

    /// Reads `key`. Returns `Ok(None)` when it is absent; a stored empty
    /// value is `Some` of an empty buffer.
    ///
    /// # Errors
    ///
    /// Returns the engine's error (for example `Corruption`), or
    /// [`Error::ProgrammerMisuse`] for a snapshot of another database.
    pub fn get(&self, options: &ReadOptions<'_>, key: &[u8]) -> Result<Option<RecycledBuffer>> {
        let ro = options.to_handle(self)?;
        let (k, klen) = raw_parts(key);
        let mut len = 0usize;
        let mut err = ErrorSlot::new();
        // SAFETY: live handles; the returned value is owned by the buffer.
        let value = unsafe {
            let raw = capi::ratdb_get(self.raw(), ro.as_ptr(), k, klen, &mut len, err.as_out());
            RecycledBuffer::from_raw(raw, len)
        };
        err.check(ffi::operation)?;
        Ok(value)
    }

    /// Reads several keys in one engine call, at one consistent sequence.
    ///
    /// Results are in key order and independent: a failing key yields
    /// [`Error::PartialBatch`] without affecting the others.
    ///
    /// # Errors
    ///
    /// The outer error covers the whole request: read options that cannot
    /// be used with this database.
    pub fn multi_get<K: AsRef<[u8]>>(
        &self,
        options: &ReadOptions<'_>,
        keys: &[K],
    ) -> Result<Vec<Result<Option<RecycledBuffer>>>> {
        let ro = options.to_handle(self)?;
        let keys: Vec<&[u8]> = keys.iter().map(AsRef::as_ref).collect();
        // SAFETY: live handles.
        let outcomes = unsafe { multi_get::multi_get(self.raw(), ro.as_ptr(), &keys) };
        Ok(outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| outcome.into_result(index))
            .collect())
    }

    /// Creates an unpositioned iterator. A snapshot in `options` fixes the
    /// view for the iterator's whole life.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProgrammerMisuse`] for a snapshot of another
    /// database. Engine-side problems surface through
    /// [`DbIterator::status`].
    pub fn iterator<'a>(&'a self, options: &ReadOptions<'a>) -> Result<DbIterator<'a>> {
        let ro = options.to_handle(self)?;
        // SAFETY: live handles; the engine copies what it needs from ro.
        let raw = unsafe { capi::ratdb_create_iterator(self.raw(), ro.as_ptr()) };
        DbIterator::new(raw)
    }

    /// Pins the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine returns no snapshot.
    pub fn snapshot(&self) -> Result<Snapshot<'_>> {
        Snapshot::new(self)
    }

    /// Releases `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProgrammerMisuse`] if another database created the
    /// snapshot. It is still released, on its own database.
    pub fn release_snapshot(&self, snapshot: Snapshot<'_>) -> Result<()> {
        if !snapshot.belongs_to(self) {
            error!(
                path = %self.path.display(),
                owner = %snapshot.database().path().display(),
                "snapshot released on a database that did not create it"
            );
            return Err(Error::misuse(
                "snapshot released on a database that did not create it",
            ));
        }
        snapshot.release();
        Ok(())
    }

    /// Approximate stored bytes for each range, in input order.
    #[must_use]
    pub fn approximate_sizes(&self, ranges: &[Range]) -> Vec<u64> {
        ranges
            .chunks(c_int::MAX as usize)
            .flat_map(|chunk| self.approximate_chunk(chunk))
            .collect()
    }

    fn approximate_chunk(&self, ranges: &[Range]) -> Vec<u64> {
        let n = c_int::try_from(ranges.len()).unwrap_or(c_int::MAX);
        let starts: Vec<*const c_char> = ranges.iter().map(|r| r.start.as_ptr().cast()).collect();
        let start_lens: Vec<usize> = ranges.iter().map(|r| r.start.len()).collect();
        let limits: Vec<*const c_char> = ranges.iter().map(|r| r.limit.as_ptr().cast()).collect();
        let limit_lens: Vec<usize> = ranges.iter().map(|r| r.limit.len()).collect();
        let mut sizes = vec![0u64; ranges.len()];
        // SAFETY: every array holds n entries.
        unsafe {
            capi::ratdb_approximate_sizes(
                self.raw(),
                n,
                starts.as_ptr(),
                start_lens.as_ptr(),
                limits.as_ptr(),
                limit_lens.as_ptr(),
                sizes.as_mut_ptr(),
            );
        }
        sizes
    }

    /// Compacts the tables overlapping `range`. Blocks until done; never
    /// changes what reads return.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if compaction fails.
    pub fn compact_range(&self, range: &Range) -> Result<()> {
        self.compact(Some(range.start.as_slice()), Some(range.limit.as_slice()))
    }

    /// Compacts the whole key space.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if compaction fails.
    pub fn compact_all(&self) -> Result<()> {
        self.compact(None, None)
    }

    fn compact(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        let (s, slen) = start.map_or((ptr::null(), 0), raw_parts);
        let (l, llen) = limit.map_or((ptr::null(), 0), raw_parts);
        let mut err = ErrorSlot::new();
        // SAFETY: live handle; keys valid for the call.
        unsafe { capi::ratdb_compact_range(self.raw(), s, slen, l, llen, err.as_out()) };
        err.check(ffi::operation)?;
        info!(path = %self.path.display(), bounded = start.is_some() || limit.is_some(), "compacted");
        Ok(())
    }

    /// Value of an engine property such as `"ratdb.stats"`. Unknown names
    /// give `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `name` contains a NUL byte.
    pub fn property_value(&self, name: &str) -> Result<Option<String>> {
        let name = c_string(name, "property name")?;
        // SAFETY: live handle and NUL-terminated name; the result is an
        // engine allocation freed below.
        unsafe {
            let raw = capi::ratdb_property_value(self.raw(), name.as_ptr());
            if raw.is_null() {
                return Ok(None);
            }
            let value = CStr::from_ptr(raw).to_string_lossy().into_owned();
            capi::ratdb_free(raw.cast());
            Ok(Some(value))
        }
    }

    /// Writes buffered updates to a table file.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the flush fails.
    pub fn flush(&self, options: &FlushOptions) -> Result<()> {
        let fo = options.to_handle()?;
        let mut err = ErrorSlot::new();
        // SAFETY: live handles.
        unsafe { capi::ratdb_flush(self.raw(), fo.as_ptr(), err.as_out()) };
        err.check(ffi::operation)?;
        debug!(path = %self.path.display(), "flushed");
        Ok(())
    }

    /// Stops the engine deleting obsolete files until the returned guard
    /// is dropped or enabled. Guards nest.
    pub fn disable_file_deletions(&self) -> FileDeletionGuard<'_> {
        // SAFETY: live handle.
        unsafe { capi::ratdb_disable_file_deletions(self.raw()) };
        FileDeletionGuard::new(self)
    }

    /// Undoes one disable, or every outstanding one with `force`. Prefer
    /// [`FileDeletionGuard`]; this is for recovering from a leaked guard.
    pub fn enable_file_deletions(&self, force: bool) {
        // SAFETY: live handle.
        unsafe { capi::ratdb_enable_file_deletions(self.raw(), u8::from(force)) };
    }

    /// Lists the files needed to reconstruct the database. With `flush`
    /// the buffered updates are written out first so the list is
    /// self-sufficient.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the flush or listing fails.
    pub fn live_files(&self, flush: bool) -> Result<LiveFiles> {
        let mut names: *mut *mut c_char = ptr::null_mut();
        let mut lens: *mut usize = ptr::null_mut();
        let mut count: c_int = 0;
        let mut manifest_size = 0u64;
        let mut err = ErrorSlot::new();
        // SAFETY: live handle and writable out-parameters.
        unsafe {
            capi::ratdb_get_live_files(
                self.raw(),
                u8::from(flush),
                &mut names,
                &mut lens,
                &mut count,
                &mut manifest_size,
                err.as_out(),
            );
        }
        err.check(ffi::operation)?;
        let count = usize::try_from(count).unwrap_or(0);
        let mut files = Vec::with_capacity(count);
        // SAFETY: the engine returned `count` names and lengths; each name
        // and both arrays are engine allocations owned here.
        unsafe {
            for i in 0..count {
                let name = *names.add(i);
                if let Some(buffer) = RecycledBuffer::from_raw(name, *lens.add(i)) {
                    files.push(String::from_utf8_lossy(&buffer).into_owned());
                }
            }
            capi::ratdb_free(names.cast());
            capi::ratdb_free(lens.cast());
        }
        Ok(LiveFiles {
            files,
            manifest_size,
        })
    }

    /// Closes the database.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Close before the comparator and merge operator fields go.
        self.handle.release();
        info!(path = %self.path.display(), "closed database");
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}
