//! Custom comparators and merge operators.

use ratdb::{Comparator, Database, Error, MergeOperator, Options, ReadOptions, WriteBatch, WriteOptions};
use ratdb_testkit::prelude::*;
use std::sync::Arc;

fn reverse() -> Arc<Comparator> {
    Arc::new(Comparator::new("test.reverse", |a, b| b.cmp(a)).unwrap())
}

fn counter() -> Arc<MergeOperator> {
    Arc::new(
        MergeOperator::new("test.counter", |_, existing, operands| {
            let mut total: i64 = match existing {
                Some(bytes) => std::str::from_utf8(bytes).ok()?.parse().ok()?,
                None => 0,
            };
            for op in operands {
                total += std::str::from_utf8(op).ok()?.parse::<i64>().ok()?;
            }
            Some(total.to_string().into_bytes())
        })
        .unwrap(),
    )
}

#[test]
fn comparator_orders_iteration() {
    let db = TestDb::with_options(Options::new().comparator(reverse()));
    populate(&db, 5);
    let keys: Vec<Vec<u8>> = dump(&db).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (0..5).rev().map(key).collect::<Vec<_>>());

    let mut iter = db.iterator(&ReadOptions::new()).unwrap();
    iter.seek(&key(2));
    assert_eq!(iter.key().unwrap().to_vec(), key(2));
    iter.next();
    assert_eq!(iter.key().unwrap().to_vec(), key(1));
}

#[test]
fn comparator_survives_reopen_and_mismatch_is_rejected() {
    let mut db = TestDb::with_options(Options::new().comparator(reverse()));
    populate(&db, 3);
    db.flush(&FlushOptions::new()).unwrap();
    db.reopen();
    assert_eq!(dump(&db)[0].0, key(2));
    db.close();

    let err = Database::open(db.path(), &Options::new()).unwrap_err();
    assert!(matches!(err, Error::EngineOpen { .. }));
    assert!(err.message().contains("test.reverse"), "{err}");

    let other = Options::new().comparator(reverse());
    let reopened = Database::open(db.path(), &other).unwrap();
    assert_eq!(get_vec(&reopened, &key(1)), Some(value(1)));
}

#[test]
fn merge_folds_operands() {
    let db = TestDb::with_options(Options::new().merge_operator(counter()));
    let wo = WriteOptions::new();
    db.merge(&wo, b"hits", b"1").unwrap();
    db.merge(&wo, b"hits", b"41").unwrap();
    assert_eq!(get_vec(&db, b"hits"), Some(b"42".to_vec()));

    db.put(&wo, b"hits", b"100").unwrap();
    let mut batch = WriteBatch::new().unwrap();
    batch.merge(b"hits", b"5");
    batch.merge(b"hits", b"-1");
    batch.delete(b"gone");
    batch.merge(b"gone", b"7");
    db.write(&wo, &batch).unwrap();
    assert_eq!(get_vec(&db, b"hits"), Some(b"104".to_vec()));
    assert_eq!(get_vec(&db, b"gone"), Some(b"7".to_vec()));
}

#[test]
fn merge_results_persist() {
    let mut db = TestDb::with_options(Options::new().merge_operator(counter()));
    db.merge(&WriteOptions::new(), b"n", b"3").unwrap();
    db.reopen();
    db.merge(&WriteOptions::new(), b"n", b"4").unwrap();
    assert_eq!(get_vec(&db, b"n"), Some(b"7".to_vec()));
}

#[test]
fn failed_merge_writes_nothing() {
    let db = TestDb::with_options(Options::new().merge_operator(counter()));
    let mut batch = WriteBatch::new().unwrap();
    batch.put(b"a", b"1");
    batch.merge(b"b", b"not a number");
    let err = db.write(&WriteOptions::new(), &batch).unwrap_err();
    assert!(err.message().contains("test.counter"), "{err}");
    assert!(get_vec(&db, b"a").is_none());
}

#[test]
fn merge_without_operator_is_not_supported() {
    let db = TestDb::new();
    let err = db.merge(&WriteOptions::new(), b"k", b"1").unwrap_err();
    assert!(err.message().starts_with("Not supported"), "{err}");
}
