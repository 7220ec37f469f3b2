//! Damaged files: per-key isolation, cursor errors and recovery.

use ratdb::{Database, Error, ReadOptions, WriteOptions};
use ratdb_testkit::corruption::{chop_tail, corrupt_first_value, flip_byte, log_files};
use ratdb_testkit::prelude::*;

/// A database whose first stored value (`k1`) is damaged on disk.
fn damaged_db() -> TestDb {
    let mut db = TestDb::new();
    let wo = WriteOptions::new();
    db.put(&wo, b"k1", b"value-one").unwrap();
    db.put(&wo, b"k2", b"value-two").unwrap();
    db.flush(&FlushOptions::new()).unwrap();
    db.close();
    corrupt_first_value(db.path()).unwrap();
    db.reopen();
    db
}

#[test]
fn multi_get_isolates_a_corrupted_key() {
    let db = damaged_db();
    let results = db.multi_get(&ReadOptions::new(), &[b"k1", b"k2", b"k3"]).unwrap();
    match &results[0] {
        Err(err @ Error::PartialBatch { index: 0, .. }) => assert!(err.is_corruption(), "{err}"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(results[1].as_ref().unwrap().as_deref(), Some(&b"value-two"[..]));
    assert!(results[2].as_ref().unwrap().is_none());
}

#[test]
fn get_reports_corruption_unless_unverified() {
    let db = damaged_db();
    let err = db.get(&ReadOptions::new(), b"k1").unwrap_err();
    assert!(matches!(err, Error::EngineOperation { .. }));
    assert!(err.is_corruption());

    let unverified = ReadOptions::new().verify_checksums(false);
    let raw = db.get(&unverified, b"k1").unwrap().unwrap();
    assert_eq!(raw.len(), b"value-one".len());
    assert_ne!(raw.as_bytes(), b"value-one");
}

#[test]
fn iterator_surfaces_corruption() {
    let db = damaged_db();
    let mut iter = db.iterator(&ReadOptions::new()).unwrap();
    let items: Vec<_> = iter.entries().collect();
    assert_eq!(items.len(), 1);
    assert!(items[0].as_ref().unwrap_err().is_corruption());
    assert!(iter.status().unwrap_err().is_corruption());

    let mut iter = db.iterator(&ReadOptions::new()).unwrap();
    iter.seek(b"k2");
    assert_eq!(iter.value().unwrap().as_bytes(), b"value-two");
    iter.status().unwrap();
}

#[test]
fn paranoid_open_rejects_damaged_values() {
    let mut db = damaged_db();
    db.close();
    let err = Database::open(db.path(), &db.options().clone().paranoid_checks(true)).unwrap_err();
    assert!(matches!(err, Error::EngineOpen { .. }));
    assert!(err.message().starts_with("Corruption"), "{err}");
}

#[test]
fn torn_log_tail_drops_only_the_last_write() {
    let mut db = TestDb::new();
    let wo = WriteOptions::new();
    db.put(&wo, b"k1", b"v1").unwrap();
    db.put(&wo, b"k2", b"v2").unwrap();
    db.close();
    let logs = log_files(db.path()).unwrap();
    chop_tail(logs.last().unwrap(), 1).unwrap();
    db.reopen();
    assert_eq!(get_vec(&db, b"k1"), Some(b"v1".to_vec()));
    assert!(get_vec(&db, b"k2").is_none());
}

#[test]
fn log_checksum_mismatch_fails_open() {
    let mut db = TestDb::new();
    db.put(&WriteOptions::new(), b"k1", b"v1").unwrap();
    db.close();
    let logs = log_files(db.path()).unwrap();
    flip_byte(logs.last().unwrap(), 12).unwrap();
    let err = db.try_reopen().unwrap_err();
    assert!(err.message().starts_with("Corruption"), "{err}");
}
