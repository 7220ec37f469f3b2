//! Key ordering.

use std::cmp::Ordering;
use std::fmt;

/// Total order over keys.
///
/// The comparator's name is persisted in the manifest; reopening a database
/// with a differently named comparator is rejected.
pub trait Comparator: Send + Sync {
    /// Compares two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Stable name identifying this ordering.
    fn name(&self) -> &str;
}

impl fmt::Debug for dyn Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparator")
            .field("name", &self.name())
            .finish()
    }
}

/// Lexicographic byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl BytewiseComparator {
    /// Name recorded for databases using byte order.
    pub const NAME: &'static str = "ratdb.BytewiseComparator";
}

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
