//! # ratdb engine
//!
//! Embedded ordered key-value engine for ratdb.
//!
//! The engine is consumed exclusively through its C ABI ([`capi`]); the
//! Rust modules behind it are public so they can be tested directly.
//!
//! This crate provides:
//! - Write-ahead log with one checksummed record per atomic batch
//! - Sorted table files with per-value CRC32 checksums
//! - A multi-version key index backing snapshots and iterators
//! - Manual compaction, live-file enumeration and file-deletion control
//! - Engine-owned buffers released through [`capi::ratdb_free`]

#![warn(missing_docs)]

pub mod batch;
pub mod capi;
pub mod comparator;
pub mod config;
pub mod db;
pub mod dir;
pub mod error;
pub mod index;
pub mod iter;
pub mod manifest;
pub mod merge;
pub mod properties;
pub mod storage;
pub mod table;
pub mod types;
pub mod wal;

pub use batch::{BatchOp, WriteBatch};
pub use comparator::{BytewiseComparator, Comparator};
pub use config::{Config, FlushOptions, ReadOptions, WriteOptions};
pub use db::{Db, LiveFiles, SnapshotToken};
pub use error::{EngineError, EngineResult};
pub use iter::EngineIterator;
pub use merge::MergeOperator;
pub use types::{FileNumber, SequenceNumber, ValueKind};
