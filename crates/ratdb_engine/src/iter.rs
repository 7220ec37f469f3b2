//! Engine iterators.

use crate::comparator::Comparator;
use crate::error::EngineError;
use crate::index::ValueRef;
use std::cmp::Ordering;
use std::sync::Arc;

/// Cursor over the keys visible at one sequence.
///
/// The visible key set is fixed when the iterator is created. The current
/// value is loaded when the cursor is positioned; a failed load leaves the
/// cursor invalid and records the error, which stays until the iterator is
/// destroyed.
pub struct EngineIterator {
    entries: Vec<(Arc<[u8]>, ValueRef)>,
    comparator: Arc<dyn Comparator>,
    verify_checksums: bool,
    position: Option<usize>,
    value: Vec<u8>,
    error: Option<EngineError>,
}

impl EngineIterator {
    pub(crate) fn new(
        entries: Vec<(Arc<[u8]>, ValueRef)>,
        comparator: Arc<dyn Comparator>,
        verify_checksums: bool,
    ) -> Self {
        Self {
            entries,
            comparator,
            verify_checksums,
            position: None,
            value: Vec::new(),
            error: None,
        }
    }

    /// An iterator that is never valid and reports `error`.
    pub(crate) fn failed(comparator: Arc<dyn Comparator>, error: EngineError) -> Self {
        let mut iter = Self::new(Vec::new(), comparator, false);
        iter.error = Some(error);
        iter
    }

    /// Returns true if the cursor is at an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.position.is_some()
    }

    /// Positions at the first key.
    pub fn seek_to_first(&mut self) {
        self.position_at(if self.entries.is_empty() { None } else { Some(0) });
    }

    /// Positions at the last key.
    pub fn seek_to_last(&mut self) {
        self.position_at(self.entries.len().checked_sub(1));
    }

    /// Positions at the first key at or after `target`.
    pub fn seek(&mut self, target: &[u8]) {
        let at = self
            .entries
            .partition_point(|(key, _)| self.comparator.compare(key, target) == Ordering::Less);
        let found = (at < self.entries.len()).then_some(at);
        self.position_at(found);
    }

    /// Advances to the next key.
    pub fn next(&mut self) {
        let next = self
            .position
            .map(|p| p + 1)
            .filter(|p| *p < self.entries.len());
        self.position_at(next);
    }

    /// Moves to the previous key.
    pub fn prev(&mut self) {
        let prev = self.position.and_then(|p| p.checked_sub(1));
        self.position_at(prev);
    }

    /// Current key, if positioned.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.position.map(|p| &*self.entries[p].0)
    }

    /// Current value, if positioned.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.position.map(|_| self.value.as_slice())
    }

    /// First error met while loading values.
    #[must_use]
    pub fn error(&self) -> Option<&EngineError> {
        self.error.as_ref()
    }

    fn position_at(&mut self, position: Option<usize>) {
        self.position = None;
        self.value.clear();
        let Some(p) = position else { return };
        match self.entries[p].1.load(self.verify_checksums) {
            Ok(value) => {
                self.value = value;
                self.position = Some(p);
            }
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
        }
    }
}
