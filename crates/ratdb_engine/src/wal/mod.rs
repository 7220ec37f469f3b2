//! Record log shared by the write-ahead log and the manifest.
//!
//! ## Record Format
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! The checksum covers header and payload. One committed write batch is
//! exactly one [`RecordType::Batch`] record, so a batch is either replayed
//! whole or not at all.
//!
//! ## Recovery Policy
//!
//! - A truncated header or payload at the end of the file is a clean end of
//!   log (a crash mid-append).
//! - A checksum mismatch, bad magic, unknown type or unsupported version is
//!   fatal: opening fails with a corruption error.

mod reader;
pub(crate) mod record;
mod writer;

pub use reader::LogReader;
pub use record::{
    decode_envelope_header, encode_envelope, BatchRecord, LoggedOp, RecordType, CRC_SIZE,
    HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};
pub use writer::LogWriter;
