//! Atomic write batches.

use crate::error::Result;
use crate::ffi::raw_parts;
use crate::handle::{HandleGuard, WriteBatchKind};
use ratdb_engine::capi::{self, RatDbWriteBatch};
use std::fmt;

/// An ordered list of puts, deletes and merges applied atomically by
/// [`Database::write`](crate::Database::write).
///
/// Appending never fails; problems surface at write time. Writing does not
/// consume the batch, so writing it again re-applies every operation.
pub struct WriteBatch {
    guard: HandleGuard<WriteBatchKind>,
}

impl WriteBatch {
    /// Creates an empty batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine returns no batch handle.
    pub fn new() -> Result<Self> {
        Ok(Self {
            guard: HandleGuard::acquire(capi::ratdb_writebatch_create())?,
        })
    }

    /// Appends a put. Key and value are copied.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        let (k, klen) = raw_parts(key);
        let (v, vlen) = raw_parts(value);
        // SAFETY: live batch; slices valid for the call.
        unsafe { capi::ratdb_writebatch_put(self.guard.as_ptr(), k, klen, v, vlen) };
    }

    /// Appends a delete.
    pub fn delete(&mut self, key: &[u8]) {
        let (k, klen) = raw_parts(key);
        // SAFETY: as for put.
        unsafe { capi::ratdb_writebatch_delete(self.guard.as_ptr(), k, klen) };
    }

    /// Appends a merge operand.
    pub fn merge(&mut self, key: &[u8], operand: &[u8]) {
        let (k, klen) = raw_parts(key);
        let (v, vlen) = raw_parts(operand);
        // SAFETY: as for put.
        unsafe { capi::ratdb_writebatch_merge(self.guard.as_ptr(), k, klen, v, vlen) };
    }

    /// Number of operations.
    #[must_use]
    pub fn count(&self) -> usize {
        // SAFETY: live batch.
        let count = unsafe { capi::ratdb_writebatch_count(self.guard.as_ptr()) };
        usize::try_from(count).unwrap_or(0)
    }

    /// Returns true if the batch holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Removes every operation.
    pub fn clear(&mut self) {
        // SAFETY: live batch.
        unsafe { capi::ratdb_writebatch_clear(self.guard.as_ptr()) };
    }

    pub(crate) fn raw(&self) -> *const RatDbWriteBatch {
        self.guard.as_ptr().cast_const()
    }
}

impl fmt::Debug for WriteBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBatch")
            .field("count", &self.count())
            .finish()
    }
}
