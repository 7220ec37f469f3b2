//! # ratdb
//!
//! Safe Rust bindings to the ratdb embedded ordered key-value engine.
//!
//! The engine is reached only through its C ABI. This crate owns the
//! boundary rules:
//! - every engine handle has exactly one owner inside this crate, which
//!   frees it once, on any thread; callers never see raw handles;
//! - values returned by reads are [`RecycledBuffer`]s that view engine
//!   memory without copying and free it on drop, while cursor keys and
//!   values are [`BorrowedBuffer`]s that cannot outlive the cursor position;
//! - [`Database::multi_get`] resolves many keys in one engine call with
//!   independent per-key results;
//! - snapshots and iterators borrow the [`Database`] that created them.
//!
//! ```rust,no_run
//! use ratdb::{Database, Options, ReadOptions, WriteOptions};
//!
//! let db = Database::open("/tmp/ratdb-demo", &Options::new().create_if_missing(true))?;
//! db.put(&WriteOptions::new(), b"k1", b"v1")?;
//!
//! let snapshot = db.snapshot()?;
//! db.put(&WriteOptions::new(), b"k2", b"v2")?;
//! assert!(snapshot.get(b"k2")?.is_none());
//! assert_eq!(db.get(&ReadOptions::new(), b"k2")?.as_deref(), Some(&b"v2"[..]));
//! # Ok::<(), ratdb::Error>(())
//! ```
//!
//! Handle ownership is not part of the public API, so a caller cannot wrap
//! a handle a second time:
//!
//! ```rust,compile_fail
//! use ratdb::HandleGuard;
//! ```

#![warn(missing_docs)]

mod backup;
mod batch;
mod buffer;
mod comparator;
mod database;
mod error;
mod ffi;
mod handle;
mod iterator;
mod merge;
mod multi_get;
mod options;
mod range;
mod snapshot;

pub use backup::{BackupInfo, FileDeletionGuard, LiveFiles};
pub use batch::WriteBatch;
pub use buffer::{BorrowedBuffer, RecycledBuffer};
pub use comparator::Comparator;
pub use database::Database;
pub use error::{Error, Result};
pub use iterator::{DbIterator, Entries};
pub use merge::MergeOperator;
pub use options::{FlushOptions, Options, ReadOptions, WriteOptions, DEFAULT_WRITE_BUFFER_SIZE};
pub use range::Range;
pub use snapshot::Snapshot;
