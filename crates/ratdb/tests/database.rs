//! Integration tests for reads, writes, snapshots, batches and iteration.

use proptest::prelude::*;
use ratdb::{Database, Error, Options, ReadOptions, WriteBatch, WriteOptions};
use ratdb_testkit::generators::{apply_to_model, batch_ops_strategy, contents_strategy, BatchOp};
use ratdb_testkit::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

fn wo() -> WriteOptions {
    WriteOptions::new()
}

#[test]
fn absent_and_empty_are_distinct() {
    let db = TestDb::new();
    db.put(&wo(), b"empty", b"").unwrap();
    let present = db.get(&ReadOptions::new(), b"empty").unwrap();
    assert!(present.is_some_and(|b| b.is_empty()));
    assert!(db.get(&ReadOptions::new(), b"never").unwrap().is_none());
}

#[test]
fn host_buffers_may_be_reused_after_put() {
    let db = TestDb::new();
    let mut key = b"k1".to_vec();
    let mut value = b"v1".to_vec();
    db.put(&wo(), &key, &value).unwrap();
    key[1] = b'9';
    value.clear();
    assert_eq!(get_vec(&db, b"k1"), Some(b"v1".to_vec()));
}

#[test]
fn snapshot_isolation() {
    let db = TestDb::new();
    db.put(&wo(), b"k1", b"v1").unwrap();
    let snapshot = db.snapshot().unwrap();
    db.put(&wo(), b"k2", b"v5").unwrap();
    db.delete(&wo(), b"k1").unwrap();

    let at_snapshot = ReadOptions::new().snapshot(&snapshot);
    assert!(db.get(&at_snapshot, b"k2").unwrap().is_none());
    assert_eq!(db.get(&at_snapshot, b"k1").unwrap().unwrap().to_vec(), b"v1");
    assert_eq!(get_vec(&db, b"k2"), Some(b"v5".to_vec()));
    assert!(get_vec(&db, b"k1").is_none());

    let later = db.snapshot().unwrap();
    assert_eq!(later.get(b"k2").unwrap().unwrap().to_vec(), b"v5");
    db.release_snapshot(later).unwrap();
    db.release_snapshot(snapshot).unwrap();
}

#[test]
fn snapshot_survives_flush_and_compaction() {
    let db = TestDb::new();
    populate(&db, 20);
    let snapshot = db.snapshot().unwrap();
    for i in 0..20 {
        db.put(&wo(), &key(i), b"overwritten").unwrap();
    }
    db.flush(&FlushOptions::new()).unwrap();
    db.compact_all().unwrap();
    assert_eq!(snapshot.get(&key(7)).unwrap().unwrap().to_vec(), value(7));
    assert_eq!(get_vec(&db, &key(7)), Some(b"overwritten".to_vec()));
    let mut iter = snapshot.iterator().unwrap();
    let entries: Vec<_> = iter.entries().collect::<ratdb::Result<_>>().unwrap();
    assert_eq!(entries.len(), 20);
    assert_eq!(entries[0], (key(0), value(0)));
}

#[test]
fn snapshot_of_another_database_is_rejected() {
    let a = TestDb::new();
    let b = TestDb::new();
    let snapshot = a.snapshot().unwrap();
    let foreign = ReadOptions::new().snapshot(&snapshot);
    assert!(matches!(b.get(&foreign, b"k"), Err(Error::ProgrammerMisuse { .. })));
    assert!(matches!(b.multi_get(&foreign, &[b"k"]), Err(Error::ProgrammerMisuse { .. })));
    assert!(matches!(b.iterator(&foreign), Err(Error::ProgrammerMisuse { .. })));
    assert!(matches!(b.release_snapshot(snapshot), Err(Error::ProgrammerMisuse { .. })));
    assert_eq!(a.property_value("ratdb.num-snapshots").unwrap().as_deref(), Some("0"));
}

#[test]
fn batch_applies_in_order() {
    let db = TestDb::new();
    let mut batch = WriteBatch::new().unwrap();
    batch.put(b"k3", b"v3");
    batch.put(b"k4", b"v4");
    batch.delete(b"k4");
    db.write(&wo(), &batch).unwrap();
    assert_eq!(get_vec(&db, b"k3"), Some(b"v3".to_vec()));
    assert!(get_vec(&db, b"k4").is_none());

    db.delete(&wo(), b"k3").unwrap();
    db.write(&wo(), &batch).unwrap();
    assert_eq!(get_vec(&db, b"k3"), Some(b"v3".to_vec()));
    assert_eq!(batch.count(), 3);
}

#[test]
fn multi_get_preserves_order_and_absence() {
    let db = TestDb::new();
    db.put(&wo(), b"k1", b"v1").unwrap();
    db.put(&wo(), b"k2", b"v2").unwrap();
    db.put(&wo(), b"k5", b"").unwrap();
    let keys: [&[u8]; 4] = [b"k1", b"k3", b"k2", b"k5"];
    let results = db.multi_get(&ReadOptions::new(), &keys).unwrap();
    let results: Vec<Option<Vec<u8>>> = results
        .into_iter()
        .map(|r| r.unwrap().map(|b| b.to_vec()))
        .collect();
    assert_eq!(
        results,
        vec![Some(b"v1".to_vec()), None, Some(b"v2".to_vec()), Some(Vec::new())]
    );
    assert!(db.multi_get::<&[u8]>(&ReadOptions::new(), &[]).unwrap().is_empty());
}

#[test]
fn multi_get_at_snapshot() {
    let db = TestDb::new();
    db.put(&wo(), b"a", b"1").unwrap();
    let snapshot = db.snapshot().unwrap();
    db.put(&wo(), b"a", b"2").unwrap();
    db.put(&wo(), b"b", b"3").unwrap();
    let results = db.multi_get(&snapshot.read_options(), &[b"a", b"b"]).unwrap();
    assert_eq!(results[0].as_ref().unwrap().as_deref(), Some(&b"1"[..]));
    assert!(results[1].as_ref().unwrap().is_none());
}

#[test]
fn iteration_bounds() {
    let db = TestDb::new();
    for i in 1..=5 {
        db.put(&wo(), format!("k{i}").as_bytes(), b"v").unwrap();
    }
    let mut iter = db.iterator(&ReadOptions::new()).unwrap();
    iter.seek(b"k2");
    let mut seen = Vec::new();
    while iter.valid() {
        seen.push(iter.key().unwrap().to_vec());
        iter.next();
    }
    iter.status().unwrap();
    assert_eq!(seen, vec![b"k2".to_vec(), b"k3".to_vec(), b"k4".to_vec(), b"k5".to_vec()]);

    iter.seek_to_last();
    assert_eq!(iter.key().unwrap().as_bytes(), b"k5");
    iter.prev();
    assert_eq!(iter.key().unwrap().as_bytes(), b"k4");
    iter.seek(b"k9");
    assert!(!iter.valid());
    assert!(iter.key().is_none());
    iter.close();
}

#[test]
fn iterator_view_is_fixed_at_creation() {
    let db = TestDb::new();
    populate(&db, 3);
    let mut iter = db.iterator(&ReadOptions::new()).unwrap();
    db.put(&wo(), b"zzz", b"late").unwrap();
    assert_eq!(iter.entries().count(), 3);
}

#[test]
fn reopen_restores_everything() {
    let mut db = TestDb::new();
    populate(&db, 100);
    db.flush(&FlushOptions::new()).unwrap();
    for i in 100..150 {
        db.put(&wo(), &key(i), &value(i)).unwrap();
    }
    db.delete(&wo(), &key(5)).unwrap();
    db.reopen();
    assert_eq!(dump(&db).len(), 149);
    assert!(get_vec(&db, &key(5)).is_none());
    assert_eq!(get_vec(&db, &key(120)), Some(value(120)));
}

#[test]
fn error_if_exists_and_destroy() {
    let mut db = TestDb::new();
    populate(&db, 1);
    let path = db.path().to_path_buf();
    db.close();
    let err = Database::open(&path, &Options::new().error_if_exists(true)).unwrap_err();
    assert!(matches!(err, Error::EngineOpen { .. }));

    Database::destroy(&path, &Options::new()).unwrap();
    assert!(!path.exists());
    Database::destroy(&path, &Options::new()).unwrap();
    let err = Database::open(&path, &Options::new()).unwrap_err();
    assert!(matches!(err, Error::EngineOpen { .. }));
}

#[test]
fn second_open_is_locked() {
    let db = TestDb::new();
    let err = Database::open(db.path(), &Options::new()).unwrap_err();
    assert!(err.message().starts_with("IO error"), "{err}");
}

#[test]
fn concurrent_readers_and_writers() {
    let db = Arc::new(TestDb::new());
    populate(&db, 50);
    thread::scope(|scope| {
        for t in 0..4u8 {
            let db = Arc::clone(&db);
            scope.spawn(move || {
                for i in 0..100usize {
                    let k = format!("t{t}-{i}");
                    db.put(&WriteOptions::new(), k.as_bytes(), &[t]).unwrap();
                    assert_eq!(get_vec(&db, k.as_bytes()), Some(vec![t]));
                    assert_eq!(get_vec(&db, &key(i % 50)), Some(value(i % 50)));
                }
            });
        }
        let db = Arc::clone(&db);
        scope.spawn(move || {
            for _ in 0..20 {
                let snapshot = db.snapshot().unwrap();
                let mut iter = snapshot.iterator().unwrap();
                assert!(iter.entries().count() >= 50);
            }
        });
    });
    assert_eq!(dump(&db).len(), 50 + 4 * 100);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn round_trip(contents in contents_strategy(40)) {
        let db = TestDb::new();
        for (k, v) in &contents {
            db.put(&wo(), k, v).unwrap();
        }
        for (k, v) in &contents {
            let got = get_vec(&db, k);
            prop_assert_eq!(got.as_ref(), Some(v));
        }
        let keys: Vec<&Vec<u8>> = contents.keys().collect();
        let results = db.multi_get(&ReadOptions::new(), &keys).unwrap();
        for (result, v) in results.into_iter().zip(contents.values()) {
            let got = result.unwrap().map(|b| b.to_vec());
            prop_assert_eq!(got.as_ref(), Some(v));
        }
        prop_assert_eq!(dump(&db), contents.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn batches_match_model(ops in batch_ops_strategy(30)) {
        let db = TestDb::new();
        let mut batch = WriteBatch::new().unwrap();
        for op in &ops {
            match op {
                BatchOp::Put(k, v) => batch.put(k, v),
                BatchOp::Delete(k) => batch.delete(k),
            }
        }
        db.write(&wo(), &batch).unwrap();
        let mut model = BTreeMap::new();
        apply_to_model(&mut model, &ops);
        prop_assert_eq!(dump(&db), model.into_iter().collect::<Vec<_>>());
    }
}
