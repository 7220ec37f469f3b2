//! File-deletion control and online backups.
//!
//! A consistent copy of a live database is the set returned by
//! [`Database::live_files`], taken while obsolete-file deletion is
//! disabled, with the MANIFEST truncated to the reported size.

use crate::database::Database;
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Files needed to reconstruct a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFiles {
    /// Names relative to the database directory, each starting with `/`.
    pub files: Vec<String>,
    /// Bytes of MANIFEST that describe exactly these files.
    pub manifest_size: u64,
}

/// Keeps obsolete-file deletion disabled while alive.
///
/// Created by [`Database::disable_file_deletions`]. Deletion is re-enabled
/// once, by [`FileDeletionGuard::enable`] or on drop, so an early return or
/// panic cannot leave it disabled.
#[must_use = "deletions are re-enabled as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FileDeletionGuard<'db> {
    db: &'db Database,
    active: bool,
}

impl<'db> FileDeletionGuard<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        debug!(path = %db.path().display(), "file deletions disabled");
        Self { db, active: true }
    }

    /// Re-enables deletion now.
    pub fn enable(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.active, false) {
            self.db.enable_file_deletions(false);
            debug!(path = %self.db.path().display(), "file deletions enabled");
        }
    }
}

impl Drop for FileDeletionGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Summary of a finished backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    /// Directory the backup was written to.
    pub destination: PathBuf,
    /// Files copied, as listed by [`Database::live_files`].
    pub files: Vec<String>,
    /// Bytes of MANIFEST copied.
    pub manifest_size: u64,
    /// Total bytes copied.
    pub bytes: u64,
}

fn copy_prefix(from: &Path, to: &Path, len: u64) -> Result<u64> {
    let mut source = File::open(from)?.take(len);
    let mut target = File::create(to)?;
    let copied = io::copy(&mut source, &mut target)?;
    if copied != len {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} is shorter than {len} bytes", from.display()),
        )));
    }
    target.sync_all()?;
    Ok(copied)
}

impl Database {
    /// Copies a consistent image of the database into `destination`,
    /// which is created if needed. The copy opens as a normal database.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the live set cannot be listed, or an
    /// I/O error if copying fails.
    pub fn backup_to(&self, destination: impl AsRef<Path>) -> Result<BackupInfo> {
        let destination = destination.as_ref();
        fs::create_dir_all(destination)?;

        let guard = self.disable_file_deletions();
        let live = self.live_files(true)?;
        let mut bytes = 0u64;
        for name in &live.files {
            let relative = name.trim_start_matches('/');
            let from = self.path().join(relative);
            let to = destination.join(relative);
            bytes += if relative == "MANIFEST" {
                copy_prefix(&from, &to, live.manifest_size)?
            } else {
                fs::copy(&from, &to)?
            };
        }
        guard.enable();

        info!(
            source = %self.path().display(),
            destination = %destination.display(),
            files = live.files.len(),
            bytes,
            "backup complete"
        );
        Ok(BackupInfo {
            destination: destination.to_path_buf(),
            files: live.files,
            manifest_size: live.manifest_size,
            bytes,
        })
    }
}
