//! Test fixtures and database helpers.

use ratdb::{Database, Options, ReadOptions, WriteOptions};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A database in a temporary directory, removed on drop.
///
/// The database can be closed and reopened in place to test recovery.
pub struct TestDb {
    db: Option<Database>,
    path: PathBuf,
    options: Options,
    _dir: TempDir,
}

impl TestDb {
    /// Creates an empty database with default options.
    pub fn new() -> Self {
        Self::with_options(Options::new())
    }

    /// Creates an empty database with `options` (`create_if_missing` is
    /// forced on).
    pub fn with_options(options: Options) -> Self {
        crate::init_test_logging();
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("db");
        let options = options.create_if_missing(true);
        let db = Database::open(&path, &options).expect("Failed to open test database");
        Self {
            db: Some(db),
            path,
            options,
            _dir: dir,
        }
    }

    /// The open database.
    pub fn db(&self) -> &Database {
        self.db.as_ref().expect("database is closed")
    }

    /// Directory of the database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options the database was opened with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Closes the database, leaving its files.
    pub fn close(&mut self) {
        if let Some(db) = self.db.take() {
            db.close();
        }
    }

    /// Opens the closed database again.
    ///
    /// # Errors
    ///
    /// Returns the open error, e.g. after files were damaged.
    pub fn try_reopen(&mut self) -> ratdb::Result<()> {
        self.close();
        self.db = Some(Database::open(&self.path, &self.options)?);
        Ok(())
    }

    /// Closes and reopens the database.
    pub fn reopen(&mut self) {
        self.try_reopen().expect("Failed to reopen test database");
    }
}

impl Default for TestDb {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestDb {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db()
    }
}

/// Writes `count` keys `key00000..` with values `value00000..`.
pub fn populate(db: &Database, count: usize) {
    let wo = WriteOptions::new();
    for i in 0..count {
        db.put(&wo, &key(i), &value(i)).expect("put failed");
    }
}

/// Key number `i` as written by [`populate`].
pub fn key(i: usize) -> Vec<u8> {
    format!("key{i:05}").into_bytes()
}

/// Value number `i` as written by [`populate`].
pub fn value(i: usize) -> Vec<u8> {
    format!("value{i:05}").into_bytes()
}

/// Reads `key` and copies the value out.
pub fn get_vec(db: &Database, key: &[u8]) -> Option<Vec<u8>> {
    db.get(&ReadOptions::new(), key)
        .expect("get failed")
        .map(|buffer| buffer.to_vec())
}

/// Every `(key, value)` pair in key order.
pub fn dump(db: &Database) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut iter = db.iterator(&ReadOptions::new()).expect("iterator failed");
    iter.entries()
        .collect::<ratdb::Result<Vec<_>>>()
        .expect("iteration failed")
}
