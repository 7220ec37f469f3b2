//! Database directory layout and locking.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK          # Advisory lock held by the open handle
//! ├─ MANIFEST      # Table-set state log
//! ├─ NNNNNN.log    # Write-ahead log
//! └─ NNNNNN.sst    # Table files
//! ```

use crate::error::{EngineError, EngineResult};
use crate::manifest::{Manifest, ManifestLog};
use crate::storage::{FileBackend, StorageBackend};
use crate::types::FileNumber;
use crate::wal::{encode_envelope, LogReader, LogWriter, RecordType};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_TEMP: &str = "MANIFEST.tmp";
const LOCK_FILE: &str = "LOCK";
const LOG_SUFFIX: &str = "log";
const TABLE_SUFFIX: &str = "sst";

/// Kind of a numbered file in the database directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileKind {
    /// Write-ahead log.
    Log,
    /// Table file.
    Table,
}

impl FileKind {
    fn suffix(self) -> &'static str {
        match self {
            Self::Log => LOG_SUFFIX,
            Self::Table => TABLE_SUFFIX,
        }
    }
}

/// Name of a numbered file, e.g. `000007.sst`.
#[must_use]
pub fn file_name(kind: FileKind, number: FileNumber) -> String {
    format!("{number}.{}", kind.suffix())
}

/// Parses a numbered file name.
#[must_use]
pub fn parse_file_name(name: &str) -> Option<(FileKind, FileNumber)> {
    let (stem, suffix) = name.rsplit_once('.')?;
    let kind = match suffix {
        LOG_SUFFIX => FileKind::Log,
        TABLE_SUFFIX => FileKind::Table,
        _ => return None,
    };
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok().map(|n| (kind, FileNumber::new(n)))
}

/// An exclusively locked database directory.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens (or creates) the directory and takes the advisory lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing and `create_if_missing`
    /// is false, if it is not a directory, or if another handle holds the
    /// lock.
    pub fn open(path: &Path, create_if_missing: bool) -> EngineResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(EngineError::invalid_argument(format!(
                    "{}: does not exist (create_if_missing is false)",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(EngineError::invalid_argument(format!(
                "{}: not a directory",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::Locked { path: lock_path });
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Path of a numbered file.
    #[must_use]
    pub fn file_path(&self, kind: FileKind, number: FileNumber) -> PathBuf {
        self.path.join(file_name(kind, number))
    }

    /// Returns true if no manifest has been written yet.
    #[must_use]
    pub fn is_new_database(&self) -> bool {
        !self.manifest_path().exists()
    }

    /// Loads the newest manifest state.
    ///
    /// Returns `None` for a new database.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the manifest holds no valid state or a
    /// record fails its checksum.
    pub fn load_manifest(&self) -> EngineResult<Option<Manifest>> {
        let manifest_path = self.manifest_path();
        if !manifest_path.exists() {
            return Ok(None);
        }

        let backend = FileBackend::open_read_only(&manifest_path)?;
        let mut latest = None;
        for record in LogReader::new(&backend)? {
            let (_, record_type, payload) = record?;
            if record_type != RecordType::ManifestState {
                return Err(EngineError::corruption(format!(
                    "unexpected {record_type:?} record in MANIFEST"
                )));
            }
            latest = Some(Manifest::decode(&payload)?);
        }

        latest
            .map(Some)
            .ok_or_else(|| EngineError::corruption("MANIFEST holds no state record"))
    }

    /// Rewrites `MANIFEST` atomically with a single state record and opens
    /// it for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if writing, syncing or renaming fails.
    pub fn rewrite_manifest(&self, manifest: &Manifest) -> EngineResult<ManifestLog> {
        let manifest_path = self.manifest_path();
        let temp_path = self.path.join(MANIFEST_TEMP);

        let data = encode_envelope(RecordType::ManifestState, &manifest.encode())?;
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &manifest_path)?;
        self.sync_directory()?;

        let backend = FileBackend::open(&manifest_path)?;
        Ok(ManifestLog::new(LogWriter::new(
            FileNumber::new(0),
            Box::new(backend),
        )))
    }

    /// Creates a fresh write-ahead log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create_log(&self, number: FileNumber) -> EngineResult<LogWriter> {
        let backend = FileBackend::create(&self.file_path(FileKind::Log, number))?;
        self.sync_directory()?;
        Ok(LogWriter::new(number, Box::new(backend)))
    }

    /// Lists numbered files present in the directory, sorted by kind then
    /// number.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list_files(&self) -> EngineResult<Vec<(FileKind, FileNumber)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if let Some(parsed) = entry.file_name().to_str().and_then(parse_file_name) {
                files.push(parsed);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Removes files by name. A file that is already gone is not an error.
    pub fn delete_files(&self, names: &[String]) {
        for name in names {
            match fs::remove_file(self.path.join(name)) {
                Ok(()) => debug!(file = %name, "deleted obsolete file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(file = %name, error = %e, "failed to delete obsolete file"),
            }
        }
    }

    /// Size of a file in the directory, by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn file_size(&self, name: &str) -> EngineResult<u64> {
        Ok(FileBackend::open_read_only(&self.path.join(name))?.size()?)
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> EngineResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// Removes a database directory and every file the engine created in it.
///
/// A missing directory is not an error. Fails if the database is open.
///
/// # Errors
///
/// Returns an error if the lock cannot be taken or files cannot be removed.
pub fn destroy(path: &Path) -> EngineResult<()> {
    if !path.exists() {
        return Ok(());
    }

    let dir = DatabaseDir::open(path, false)?;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let ours = name == MANIFEST_FILE || name == MANIFEST_TEMP || parse_file_name(name).is_some();
        if ours {
            fs::remove_file(entry.path())?;
        }
    }
    drop(dir);

    fs::remove_file(path.join(LOCK_FILE))?;
    if let Err(e) = fs::remove_dir(path) {
        debug!(path = %path.display(), error = %e, "database directory left in place");
    }
    Ok(())
}
