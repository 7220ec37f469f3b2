//! Named database properties.
//!
//! Names are accepted with a `ratdb.` prefix or, for tools written against
//! the leveldb family, a `rocksdb.` or `leveldb.` prefix.

use crate::dir::{file_name, FileKind};
use crate::manifest::TableMeta;
use crate::types::SequenceNumber;
use std::fmt::Write;

const PREFIXES: [&str; 3] = ["ratdb.", "rocksdb.", "leveldb."];
const LEVELS: u32 = 2;

/// Point-in-time figures a property is rendered from.
#[derive(Debug, Clone, Default)]
pub struct PropertySource {
    /// Latest committed sequence.
    pub sequence: SequenceNumber,
    /// Live tables.
    pub tables: Vec<TableMeta>,
    /// Buffered memtable bytes.
    pub memtable_bytes: usize,
    /// Buffered memtable versions.
    pub memtable_versions: usize,
    /// Keys whose newest version is a value.
    pub estimated_keys: usize,
    /// Live snapshots.
    pub snapshots: usize,
    /// File-deletion disable depth.
    pub deletions_disabled: u32,
}

/// Renders property `name`, or `None` if it is unknown.
#[must_use]
pub fn render(source: &PropertySource, name: &str) -> Option<String> {
    let name = PREFIXES.iter().find_map(|p| name.strip_prefix(p))?;

    if let Some(level) = name.strip_prefix("num-files-at-level") {
        let level: u32 = level.parse().ok()?;
        return Some(count_at_level(source, level).to_string());
    }

    match name {
        "stats" => Some(stats(source)),
        "sstables" => Some(sstables(source)),
        "num-snapshots" => Some(source.snapshots.to_string()),
        "estimate-num-keys" => Some(source.estimated_keys.to_string()),
        "cur-size-all-mem-tables" => Some(source.memtable_bytes.to_string()),
        "total-sst-files-size" => Some(
            source
                .tables
                .iter()
                .map(|t| t.file_size)
                .sum::<u64>()
                .to_string(),
        ),
        "is-file-deletions-enabled" => {
            Some(u8::from(source.deletions_disabled == 0).to_string())
        }
        _ => None,
    }
}

fn count_at_level(source: &PropertySource, level: u32) -> usize {
    source.tables.iter().filter(|t| t.level == level).count()
}

fn stats(source: &PropertySource) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "** DB Stats **");
    let _ = writeln!(out, "Sequence: {}", source.sequence.as_u64());
    let _ = writeln!(out, "Keys (estimate): {}", source.estimated_keys);
    let _ = writeln!(
        out,
        "Memtable: {} bytes in {} versions",
        source.memtable_bytes, source.memtable_versions
    );
    let _ = writeln!(out, "Snapshots: {}", source.snapshots);
    let _ = writeln!(
        out,
        "File deletions: {}",
        if source.deletions_disabled == 0 {
            "enabled".to_string()
        } else {
            format!("disabled (depth {})", source.deletions_disabled)
        }
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Level  Files  Size(bytes)  Entries");
    for level in 0..LEVELS {
        let tables = source.tables.iter().filter(|t| t.level == level);
        let (files, bytes, entries) = tables.fold((0, 0, 0), |(f, b, e), t| {
            (f + 1, b + t.file_size, e + t.entries)
        });
        let _ = writeln!(out, "{level:>5}  {files:>5}  {bytes:>11}  {entries:>7}");
    }
    out
}

fn sstables(source: &PropertySource) -> String {
    let mut out = String::new();
    for level in 0..LEVELS {
        let _ = writeln!(out, "--- level {level} ---");
        for table in source.tables.iter().filter(|t| t.level == level) {
            let _ = writeln!(
                out,
                " {}:{}[{} .. {}] entries={}",
                file_name(FileKind::Table, table.number),
                table.file_size,
                String::from_utf8_lossy(&table.smallest),
                String::from_utf8_lossy(&table.largest),
                table.entries
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileNumber;

    fn source() -> PropertySource {
        PropertySource {
            sequence: SequenceNumber::new(12),
            tables: vec![TableMeta {
                number: FileNumber::new(4),
                level: 0,
                file_size: 100,
                entries: 3,
                smallest: b"a".to_vec(),
                largest: b"z".to_vec(),
            }],
            memtable_bytes: 42,
            memtable_versions: 2,
            estimated_keys: 5,
            snapshots: 1,
            deletions_disabled: 0,
        }
    }

    #[test]
    fn level_counts() {
        let s = source();
        assert_eq!(render(&s, "ratdb.num-files-at-level0").as_deref(), Some("1"));
        assert_eq!(render(&s, "ratdb.num-files-at-level1").as_deref(), Some("0"));
        assert_eq!(render(&s, "ratdb.num-files-at-levelx"), None);
    }

    #[test]
    fn prefixes_and_unknown_names() {
        let s = source();
        assert!(render(&s, "rocksdb.stats").unwrap().contains("Sequence: 12"));
        assert_eq!(render(&s, "leveldb.num-snapshots").as_deref(), Some("1"));
        assert_eq!(render(&s, "stats"), None);
        assert_eq!(render(&s, "ratdb.no-such-property"), None);
    }

    #[test]
    fn sizes_and_flags() {
        let mut s = source();
        assert_eq!(render(&s, "ratdb.total-sst-files-size").as_deref(), Some("100"));
        assert_eq!(render(&s, "ratdb.cur-size-all-mem-tables").as_deref(), Some("42"));
        assert_eq!(render(&s, "ratdb.is-file-deletions-enabled").as_deref(), Some("1"));
        s.deletions_disabled = 2;
        assert_eq!(render(&s, "ratdb.is-file-deletions-enabled").as_deref(), Some("0"));
        assert!(render(&s, "ratdb.sstables").unwrap().contains("000004.sst:100[a .. z]"));
    }
}
