//! Merge operators.
//!
//! A merge record is resolved when the batch carrying it is written: the
//! operator combines the key's current value (if any) with the operands and
//! the result is stored as an ordinary value.

use std::fmt;

/// Combines an existing value with merge operands.
pub trait MergeOperator: Send + Sync {
    /// Produces the merged value, or `None` when the merge fails.
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[&[u8]])
        -> Option<Vec<u8>>;

    /// Name of the operator.
    fn name(&self) -> &str;
}

impl fmt::Debug for dyn MergeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeOperator")
            .field("name", &self.name())
            .finish()
    }
}
