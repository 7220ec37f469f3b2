//! Point-in-time read views.

use crate::buffer::RecycledBuffer;
use crate::database::Database;
use crate::error::Result;
use crate::handle::{HandleGuard, SnapshotKind};
use crate::iterator::DbIterator;
use crate::options::ReadOptions;
use ratdb_engine::capi::{self, RatDbSnapshot};
use std::fmt;
use std::ptr;

/// A pinned view of a database.
///
/// The borrow of the creating [`Database`] keeps the snapshot from
/// outliving it, and the snapshot is released on that database when
/// dropped or passed to [`Database::release_snapshot`]. Any number of
/// reads may share one snapshot by reference.
pub struct Snapshot<'db> {
    guard: HandleGuard<SnapshotKind>,
    db: &'db Database,
}

// SAFETY: the engine handle is thread-safe and release has no thread
// affinity; the owning database is Sync.
unsafe impl Send for Snapshot<'_> {}
unsafe impl Sync for Snapshot<'_> {}

impl<'db> Snapshot<'db> {
    pub(crate) fn new(db: &'db Database) -> Result<Self> {
        let owner = db.raw();
        // SAFETY: owner is the live handle of db.
        let raw = unsafe { capi::ratdb_create_snapshot(owner) };
        Ok(Self {
            guard: HandleGuard::acquire_with(raw.cast_mut(), owner)?,
            db,
        })
    }

    pub(crate) fn belongs_to(&self, db: &Database) -> bool {
        ptr::eq(self.db, db)
    }

    pub(crate) fn raw(&self) -> Result<*mut RatDbSnapshot> {
        self.guard.get()
    }

    /// The database that created this snapshot.
    #[must_use]
    pub fn database(&self) -> &'db Database {
        self.db
    }

    /// Default read options bound to this snapshot.
    #[must_use]
    pub fn read_options(&self) -> ReadOptions<'_> {
        ReadOptions::new().snapshot(self)
    }

    /// Reads `key` as of this snapshot.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for a failed read.
    pub fn get(&self, key: &[u8]) -> Result<Option<RecycledBuffer>> {
        self.db.get(&self.read_options(), key)
    }

    /// Creates an iterator over this snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine returns no cursor.
    pub fn iterator(&self) -> Result<DbIterator<'_>> {
        self.db.iterator(&self.read_options())
    }

    /// Releases the snapshot now.
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for Snapshot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("database", &self.db.path())
            .finish()
    }
}
