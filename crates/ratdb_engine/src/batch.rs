//! Engine-side write batches.

/// One queued mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Set `key` to `value`.
    Put {
        /// Key.
        key: Vec<u8>,
        /// Value.
        value: Vec<u8>,
    },
    /// Remove `key`.
    Delete {
        /// Key.
        key: Vec<u8>,
    },
    /// Merge `operand` into `key`.
    Merge {
        /// Key.
        key: Vec<u8>,
        /// Merge operand.
        operand: Vec<u8>,
    },
}

impl BatchOp {
    /// Key targeted by the operation.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } | Self::Merge { key, .. } => key,
        }
    }
}

/// Ordered mutations applied atomically by [`crate::Db::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a put.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Queues a deletion.
    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(BatchOp::Delete { key: key.to_vec() });
    }

    /// Queues a merge.
    pub fn merge(&mut self, key: &[u8], operand: &[u8]) {
        self.ops.push(BatchOp::Merge {
            key: key.to_vec(),
            operand: operand.to_vec(),
        });
    }

    /// Removes every queued operation.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Number of queued operations.
    #[must_use]
    pub fn count(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queued operations in order.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_and_clear() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.put(b"k3", b"v3");
        batch.delete(b"k4");
        batch.merge(b"k5", b"+1");
        assert_eq!(batch.count(), 3);
        assert_eq!(batch.ops()[1].key(), b"k4");

        batch.clear();
        assert_eq!(batch.count(), 0);
    }
}
