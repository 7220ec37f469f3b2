//! Byte-store backends underneath logs, tables and the manifest.
//!
//! Backends are opaque: they read, append and sync bytes. Every file
//! format (log records, table blocks, manifest edits) is interpreted by the
//! engine modules layered on top.

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
