//! Benchmark utilities.

use rand::Rng;
use ratdb::{Database, FlushOptions, Options, WriteBatch, WriteOptions};
use tempfile::TempDir;

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Fixed-width key for index `i`, so byte order matches numeric order.
pub fn bench_key(i: usize) -> Vec<u8> {
    format!("bench{i:010}").into_bytes()
}

/// A database in a temporary directory, dropped together with it.
pub struct BenchDb {
    /// Open handle.
    pub db: Database,
    _dir: TempDir,
}

/// Opens an empty database in a fresh temporary directory.
pub fn open_empty() -> BenchDb {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path(), &Options::new().create_if_missing(true)).unwrap();
    BenchDb { db, _dir: dir }
}

/// Opens a database holding `count` keys with `value_size`-byte values.
///
/// With `flush` the data is moved to a table so reads hit the file path.
pub fn open_populated(count: usize, value_size: usize, flush: bool) -> BenchDb {
    let bench = open_empty();
    let mut batch = WriteBatch::new().unwrap();
    for i in 0..count {
        batch.put(&bench_key(i), &random_data(value_size));
        if batch.count() == 1000 {
            bench.db.write(&WriteOptions::new(), &batch).unwrap();
            batch.clear();
        }
    }
    bench.db.write(&WriteOptions::new(), &batch).unwrap();
    if flush {
        bench.db.flush(&FlushOptions::new()).unwrap();
    }
    bench
}
