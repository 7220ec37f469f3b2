//! Key ranges.

/// A half-open key interval `[start, limit)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Range {
    /// First key included.
    pub start: Vec<u8>,
    /// First key excluded.
    pub limit: Vec<u8>,
}

impl Range {
    /// Creates a range.
    pub fn new(start: impl Into<Vec<u8>>, limit: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            limit: limit.into(),
        }
    }
}
