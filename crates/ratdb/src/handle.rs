//! Single-owner guards for engine handles.
//!
//! A [`HandleGuard`] owns one opaque handle together with the engine
//! function that frees it. Release runs at most once: the guard clears its
//! pointer on the first release, so later releases (explicit or on drop)
//! do nothing. Guards cannot be cloned; shared use goes through borrows or
//! `Arc` around the owning wrapper.
//!
//! Guards are internal to the crate: only code that just received a handle
//! from the engine can create one, so no handle ever has two owners.

use crate::error::{Error, Result};
use ratdb_engine::capi::{self, *};
use std::fmt;
use std::ptr;
use tracing::debug;

/// A kind of engine handle and how to free it.
pub(crate) trait HandleKind {
    /// Opaque engine type the handle points at.
    type Raw;
    /// Extra context the release function needs (the owning database for
    /// snapshots).
    type Owner: Copy;
    /// Name used in errors and logs.
    const NAME: &'static str;

    /// Frees `raw`.
    ///
    /// # Safety
    ///
    /// `raw` must be a live, non-null handle of this kind owned by the
    /// caller, and `owner` the context it was created with.
    unsafe fn release(raw: *mut Self::Raw, owner: Self::Owner);
}

/// Owner of one engine handle.
pub(crate) struct HandleGuard<K: HandleKind> {
    raw: *mut K::Raw,
    owner: K::Owner,
}

// SAFETY: engine release functions have no thread affinity, so a guard may
// be dropped on any thread. Shared access is decided by the wrapper types.
unsafe impl<K: HandleKind> Send for HandleGuard<K> where K::Owner: Send {}

impl<K: HandleKind<Owner = ()>> HandleGuard<K> {
    /// Takes ownership of `raw`, which must not be null.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NullHandle`] when the engine returned null.
    pub(crate) fn acquire(raw: *mut K::Raw) -> Result<Self> {
        Self::acquire_with(raw, ())
    }
}

impl<K: HandleKind> HandleGuard<K> {
    /// Takes ownership of `raw`, released later with `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NullHandle`] when the engine returned null.
    pub(crate) fn acquire_with(raw: *mut K::Raw, owner: K::Owner) -> Result<Self> {
        if raw.is_null() {
            return Err(Error::NullHandle { kind: K::NAME });
        }
        debug!(kind = K::NAME, handle = ?raw, "acquired handle");
        Ok(Self { raw, owner })
    }

    /// The live handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProgrammerMisuse`] after release.
    pub(crate) fn get(&self) -> Result<*mut K::Raw> {
        if self.raw.is_null() {
            return Err(Error::misuse(format!("{} used after release", K::NAME)));
        }
        Ok(self.raw)
    }

    /// The handle, or null after release. Engine functions ignore null
    /// handles, so this suits calls on wrappers that cannot outlive their
    /// guard.
    #[must_use]
    pub(crate) fn as_ptr(&self) -> *mut K::Raw {
        self.raw
    }

    /// Frees the handle. Only the first call has any effect.
    pub(crate) fn release(&mut self) {
        let raw = std::mem::replace(&mut self.raw, ptr::null_mut());
        if raw.is_null() {
            return;
        }
        // SAFETY: raw was acquired non-null and is cleared above, so this
        // is the only release.
        unsafe { K::release(raw, self.owner) };
        debug!(kind = K::NAME, handle = ?raw, "released handle");
    }
}

impl<K: HandleKind> Drop for HandleGuard<K> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<K: HandleKind> fmt::Debug for HandleGuard<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleGuard")
            .field("kind", &K::NAME)
            .field("raw", &self.raw)
            .finish()
    }
}

macro_rules! handle_kind {
    ($(#[$doc:meta])* $kind:ident, $raw:ty, $name:literal, $free:path) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub(crate) enum $kind {}

        impl HandleKind for $kind {
            type Raw = $raw;
            type Owner = ();
            const NAME: &'static str = $name;

            unsafe fn release(raw: *mut $raw, _owner: ()) {
                $free(raw);
            }
        }
    };
}

handle_kind!(
    /// An open database.
    DatabaseKind, RatDbHandle, "database", capi::ratdb_close
);
handle_kind!(
    /// Open options.
    OptionsKind, RatDbOptions, "options", capi::ratdb_options_destroy
);
handle_kind!(
    /// Read options.
    ReadOptionsKind, RatDbReadOptions, "read options", capi::ratdb_readoptions_destroy
);
handle_kind!(
    /// Write options.
    WriteOptionsKind, RatDbWriteOptions, "write options", capi::ratdb_writeoptions_destroy
);
handle_kind!(
    /// Flush options.
    FlushOptionsKind, RatDbFlushOptions, "flush options", capi::ratdb_flushoptions_destroy
);
handle_kind!(
    /// A cursor.
    IteratorKind, RatDbIterator, "iterator", capi::ratdb_iter_destroy
);
handle_kind!(
    /// A write batch.
    WriteBatchKind, RatDbWriteBatch, "write batch", capi::ratdb_writebatch_destroy
);
handle_kind!(
    /// A comparator.
    ComparatorKind, RatDbComparator, "comparator", capi::ratdb_comparator_destroy
);
handle_kind!(
    /// A merge operator.
    MergeOperatorKind, RatDbMergeOperator, "merge operator", capi::ratdb_mergeoperator_destroy
);

/// A snapshot, released on the database that created it.
#[derive(Debug)]
pub(crate) enum SnapshotKind {}

impl HandleKind for SnapshotKind {
    type Raw = RatDbSnapshot;
    type Owner = *mut RatDbHandle;
    const NAME: &'static str = "snapshot";

    unsafe fn release(raw: *mut RatDbSnapshot, owner: *mut RatDbHandle) {
        capi::ratdb_release_snapshot(owner, raw.cast_const());
    }
}
