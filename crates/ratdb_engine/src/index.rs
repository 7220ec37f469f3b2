//! Multi-version key index.
//!
//! Maps every user key (in comparator order) to its versions, oldest first.
//! A version lives either in the memtable (value held inline) or in a table
//! file (value read on demand). Flush and compaction move versions between
//! homes without changing their sequence numbers, so snapshots stay valid.

use crate::comparator::Comparator;
use crate::error::EngineResult;
use crate::table::{TableReader, ValueHandle};
use crate::types::{FileNumber, SequenceNumber};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// A key ordered by the database comparator.
#[derive(Clone)]
pub struct OrderedKey {
    bytes: Arc<[u8]>,
    comparator: Arc<dyn Comparator>,
}

impl OrderedKey {
    fn new(bytes: Arc<[u8]>, comparator: Arc<dyn Comparator>) -> Self {
        Self { bytes, comparator }
    }

    /// The key bytes.
    #[must_use]
    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }
}

impl PartialEq for OrderedKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedKey {}

impl PartialOrd for OrderedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparator.compare(&self.bytes, &other.bytes)
    }
}

/// Where a value's bytes live.
#[derive(Debug, Clone)]
pub enum ValueRef {
    /// Held in memory.
    Inline(Arc<[u8]>),
    /// Stored in a table file.
    Table {
        /// The table holding the record.
        table: Arc<TableReader>,
        /// Record location.
        handle: ValueHandle,
    },
}

impl ValueRef {
    /// Reads the value bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the table read fails or its checksum does not
    /// match while `verify` is set.
    pub fn load(&self, verify: bool) -> EngineResult<Vec<u8>> {
        match self {
            Self::Inline(bytes) => Ok(bytes.to_vec()),
            Self::Table { table, handle } => table.read_value(*handle, verify),
        }
    }

    /// Bytes occupied in a table file; zero for inline values.
    #[must_use]
    pub fn stored_size(&self) -> u64 {
        match self {
            Self::Inline(_) => 0,
            Self::Table { handle, .. } => handle.record_size(),
        }
    }
}

/// One version of a key.
#[derive(Debug, Clone)]
pub struct Version {
    /// Sequence the version was written at.
    pub sequence: SequenceNumber,
    /// The value, or `None` for a tombstone.
    pub value: Option<ValueRef>,
    /// Table holding the version; `None` while it is in the memtable.
    pub table: Option<FileNumber>,
}

/// A version waiting in the memtable, as handed to flush.
#[derive(Debug, Clone)]
pub struct PendingVersion {
    /// User key.
    pub key: Arc<[u8]>,
    /// Sequence.
    pub sequence: SequenceNumber,
    /// Inline value, `None` for tombstones.
    pub value: Option<Arc<[u8]>>,
}

/// Every version of every key.
pub struct KeyIndex {
    comparator: Arc<dyn Comparator>,
    map: BTreeMap<OrderedKey, Vec<Version>>,
    memtable_bytes: usize,
    memtable_versions: usize,
}

impl KeyIndex {
    /// Creates an empty index.
    pub fn new(comparator: Arc<dyn Comparator>) -> Self {
        Self {
            comparator,
            map: BTreeMap::new(),
            memtable_bytes: 0,
            memtable_versions: 0,
        }
    }

    fn probe(&self, key: &[u8]) -> OrderedKey {
        OrderedKey::new(Arc::from(key), Arc::clone(&self.comparator))
    }

    /// Adds a version. Versions of one key must arrive in ascending
    /// sequence order, except during recovery where tables are loaded in
    /// arbitrary order.
    pub fn insert(&mut self, key: &[u8], version: Version) {
        if version.table.is_none() {
            self.memtable_bytes += key.len()
                + match &version.value {
                    Some(ValueRef::Inline(v)) => v.len(),
                    _ => 0,
                };
            self.memtable_versions += 1;
        }

        let versions = self.map.entry(self.probe(key)).or_default();
        match versions.last() {
            Some(last) if last.sequence > version.sequence => {
                let at = versions.partition_point(|v| v.sequence < version.sequence);
                versions.insert(at, version);
            }
            _ => versions.push(version),
        }
    }

    /// Newest version of `key` with `sequence <= at`.
    #[must_use]
    pub fn get(&self, key: &[u8], at: SequenceNumber) -> Option<&Version> {
        self.map
            .get(&self.probe(key))
            .and_then(|versions| versions.iter().rev().find(|v| v.sequence <= at))
    }

    /// Keys with a live value at `at`, in order, with that value.
    #[must_use]
    pub fn visible(&self, at: SequenceNumber) -> Vec<(Arc<[u8]>, ValueRef)> {
        self.map
            .iter()
            .filter_map(|(key, versions)| {
                let version = versions.iter().rev().find(|v| v.sequence <= at)?;
                let value = version.value.clone()?;
                Some((Arc::clone(key.bytes()), value))
            })
            .collect()
    }

    /// Iterates keys in `[start, limit)`; `None` bounds are unbounded.
    pub fn range<'a>(
        &'a self,
        start: Option<&[u8]>,
        limit: Option<&[u8]>,
    ) -> impl Iterator<Item = (&'a OrderedKey, &'a Vec<Version>)> + 'a {
        let lower = start.map_or(Bound::Unbounded, |s| Bound::Included(self.probe(s)));
        let upper = limit.map_or(Bound::Unbounded, |l| Bound::Excluded(self.probe(l)));
        let empty = matches!((&lower, &upper), (Bound::Included(l), Bound::Excluded(u)) if l >= u);
        let range = if empty {
            None
        } else {
            Some(self.map.range((lower, upper)))
        };
        range.into_iter().flatten()
    }

    /// Approximate bytes of table-resident data for keys in a range.
    #[must_use]
    pub fn approximate_size(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> u64 {
        self.range(start, limit)
            .map(|(key, versions)| {
                versions
                    .iter()
                    .filter(|v| v.table.is_some())
                    .map(|v| {
                        key.bytes().len() as u64
                            + v.value.as_ref().map_or(0, ValueRef::stored_size)
                    })
                    .sum::<u64>()
            })
            .sum()
    }

    /// Memtable versions in table order: ascending key, newest first.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingVersion> {
        let mut out = Vec::with_capacity(self.memtable_versions);
        for (key, versions) in &self.map {
            for version in versions.iter().rev().filter(|v| v.table.is_none()) {
                let value = match &version.value {
                    Some(ValueRef::Inline(bytes)) => Some(Arc::clone(bytes)),
                    _ => None,
                };
                out.push(PendingVersion {
                    key: Arc::clone(key.bytes()),
                    sequence: version.sequence,
                    value,
                });
            }
        }
        out
    }

    /// Points a memtable version at its new table home.
    pub fn relocate(
        &mut self,
        key: &[u8],
        sequence: SequenceNumber,
        table: FileNumber,
        value: Option<ValueRef>,
    ) {
        if let Some(versions) = self.map.get_mut(&self.probe(key)) {
            if let Some(version) = versions
                .iter_mut()
                .find(|v| v.sequence == sequence && v.table.is_none())
            {
                version.table = Some(table);
                version.value = value;
                self.memtable_versions -= 1;
            }
        }
        if self.memtable_versions == 0 {
            self.memtable_bytes = 0;
        }
    }

    /// Replaces every version of `key`; an empty list removes the key.
    pub fn replace_versions(&mut self, key: &[u8], versions: Vec<Version>) {
        let probe = self.probe(key);
        if versions.is_empty() {
            self.map.remove(&probe);
        } else {
            self.map.insert(probe, versions);
        }
    }

    /// Bytes of keys and values buffered in the memtable.
    #[must_use]
    pub fn memtable_bytes(&self) -> usize {
        self.memtable_bytes
    }

    /// Number of versions buffered in the memtable.
    #[must_use]
    pub fn memtable_versions(&self) -> usize {
        self.memtable_versions
    }

    /// Number of distinct keys with at least one version.
    #[must_use]
    pub fn num_keys(&self) -> usize {
        self.map.len()
    }

    /// Number of keys whose newest version is a live value.
    #[must_use]
    pub fn estimate_live_keys(&self) -> usize {
        self.map
            .values()
            .filter(|versions| versions.last().is_some_and(|v| v.value.is_some()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;

    struct Reverse;

    impl Comparator for Reverse {
        fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
            b.cmp(a)
        }

        fn name(&self) -> &str {
            "reverse"
        }
    }

    fn mem(seq: u64, value: Option<&[u8]>) -> Version {
        Version {
            sequence: SequenceNumber::new(seq),
            value: value.map(|v| ValueRef::Inline(Arc::from(v))),
            table: None,
        }
    }

    fn index() -> KeyIndex {
        KeyIndex::new(Arc::new(BytewiseComparator))
    }

    #[test]
    fn reads_see_newest_version_at_sequence() {
        let mut idx = index();
        idx.insert(b"k", mem(1, Some(b"v1")));
        idx.insert(b"k", mem(3, Some(b"v3")));
        idx.insert(b"k", mem(5, None));

        let at = |s| {
            idx.get(b"k", SequenceNumber::new(s))
                .map(|v| v.value.as_ref().map(|r| r.load(true).unwrap()))
        };
        assert_eq!(at(0), None);
        assert_eq!(at(2), Some(Some(b"v1".to_vec())));
        assert_eq!(at(4), Some(Some(b"v3".to_vec())));
        assert_eq!(at(9), Some(None));
    }

    #[test]
    fn out_of_order_insert_keeps_versions_sorted() {
        let mut idx = index();
        idx.insert(b"k", mem(4, Some(b"new")));
        idx.insert(b"k", mem(2, Some(b"old")));
        let v = idx.get(b"k", SequenceNumber::new(3)).unwrap();
        assert_eq!(v.sequence, SequenceNumber::new(2));
    }

    #[test]
    fn visible_skips_tombstones_and_follows_comparator() {
        let mut idx = KeyIndex::new(Arc::new(Reverse));
        idx.insert(b"a", mem(1, Some(b"1")));
        idx.insert(b"b", mem(2, Some(b"2")));
        idx.insert(b"c", mem(3, Some(b"3")));
        idx.insert(b"b", mem(4, None));

        let keys: Vec<_> = idx
            .visible(SequenceNumber::new(10))
            .into_iter()
            .map(|(k, _)| k.to_vec())
            .collect();
        assert_eq!(keys, vec![b"c".to_vec(), b"a".to_vec()]);

        let keys: Vec<_> = idx
            .visible(SequenceNumber::new(3))
            .into_iter()
            .map(|(k, _)| k.to_vec())
            .collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn range_bounds() {
        let mut idx = index();
        for (i, key) in [b"a", b"b", b"c", b"d"].iter().enumerate() {
            idx.insert(*key, mem(i as u64 + 1, Some(b"x")));
        }
        let keys: Vec<_> = idx
            .range(Some(b"b"), Some(b"d"))
            .map(|(k, _)| k.bytes().to_vec())
            .collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(idx.range(Some(b"d"), Some(b"b")).count(), 0);
        assert_eq!(idx.range(None, None).count(), 4);
    }

    #[test]
    fn pending_and_relocation_accounting() {
        let mut idx = index();
        idx.insert(b"a", mem(1, Some(b"xyz")));
        idx.insert(b"a", mem(2, Some(b"w")));
        assert_eq!(idx.memtable_bytes(), 1 + 3 + 1 + 1);

        let pending = idx.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].sequence, SequenceNumber::new(2));

        for p in &pending {
            idx.relocate(
                &p.key,
                p.sequence,
                FileNumber::new(7),
                p.value.clone().map(ValueRef::Inline),
            );
        }
        assert_eq!(idx.memtable_versions(), 0);
        assert_eq!(idx.memtable_bytes(), 0);
        assert!(idx.pending().is_empty());
    }
}
