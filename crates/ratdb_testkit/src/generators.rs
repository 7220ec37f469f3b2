//! Property-based test generators using proptest.

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Arbitrary keys, including the empty key.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    vec(any::<u8>(), 0..24)
}

/// Arbitrary values; empty values are generated often.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        1 => Just(Vec::new()),
        4 => vec(any::<u8>(), 0..256),
    ]
}

/// A map of distinct keys to values.
pub fn contents_strategy(max_keys: usize) -> impl Strategy<Value = BTreeMap<Vec<u8>, Vec<u8>>> {
    btree_map(key_strategy(), value_strategy(), 0..max_keys)
}

/// One mutation of a write batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Store a value.
    Put(Vec<u8>, Vec<u8>),
    /// Remove a key.
    Delete(Vec<u8>),
}

/// A sequence of batch operations over a small key space, so keys repeat.
pub fn batch_ops_strategy(max_ops: usize) -> impl Strategy<Value = Vec<BatchOp>> {
    let key = vec(b'a'..=b'e', 1..3);
    vec(
        prop_oneof![
            (key.clone(), value_strategy()).prop_map(|(k, v)| BatchOp::Put(k, v)),
            key.prop_map(BatchOp::Delete),
        ],
        0..max_ops,
    )
}

/// Applies `ops` to a model map, in order.
pub fn apply_to_model(model: &mut BTreeMap<Vec<u8>, Vec<u8>>, ops: &[BatchOp]) {
    for op in ops {
        match op {
            BatchOp::Put(k, v) => {
                model.insert(k.clone(), v.clone());
            }
            BatchOp::Delete(k) => {
                model.remove(k);
            }
        }
    }
}
