//! Damaging on-disk files.
//!
//! Table files store each value as `crc32 | len | bytes` starting at
//! offset 0, in key order, so the first value's bytes begin at
//! [`FIRST_VALUE_OFFSET`].

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Offset of the first stored value's bytes in a table file.
pub const FIRST_VALUE_OFFSET: u64 = 8;

fn files_with_extension(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    Ok(files)
}

/// Table files in `dir`, oldest first.
pub fn table_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    files_with_extension(dir, "sst")
}

/// Log files in `dir`, oldest first.
pub fn log_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    files_with_extension(dir, "log")
}

/// Inverts every bit of the byte at `offset`.
pub fn flip_byte(path: &Path, offset: u64) -> io::Result<()> {
    let mut bytes = fs::read(path)?;
    let index = usize::try_from(offset)
        .ok()
        .filter(|i| *i < bytes.len())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset past end of file"))?;
    bytes[index] ^= 0xFF;
    fs::write(path, bytes)
}

/// Cuts `path` down to `len` bytes, like a write torn by a crash.
pub fn truncate(path: &Path, len: u64) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}

/// Removes the last `count` bytes of `path`.
pub fn chop_tail(path: &Path, count: u64) -> io::Result<()> {
    let len = fs::metadata(path)?.len();
    truncate(path, len.saturating_sub(count))
}

/// Damages the first value stored in the newest table file of `dir`.
pub fn corrupt_first_value(dir: &Path) -> io::Result<PathBuf> {
    let table = table_files(dir)?
        .pop()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no table files"))?;
    flip_byte(&table, FIRST_VALUE_OFFSET)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn flip_and_truncate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("000001.sst");
        fs::write(&path, [0u8; 16]).unwrap();
        flip_byte(&path, 3).unwrap();
        assert_eq!(fs::read(&path).unwrap()[3], 0xFF);
        assert!(flip_byte(&path, 16).is_err());
        chop_tail(&path, 6).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 10);
        assert_eq!(table_files(dir.path()).unwrap(), vec![path]);
        assert!(log_files(dir.path()).unwrap().is_empty());
    }
}
