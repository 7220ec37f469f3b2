//! Sorted table files.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ value records: crc32(4) | len(4) | value     │
//! ├──────────────────────────────────────────────┤
//! │ index: count(4) | entries                     │
//! │   key_len(4) key seq(8) kind(1) off(8) len(4) │
//! ├──────────────────────────────────────────────┤
//! │ footer: index_off(8) index_len(8)             │
//! │         index_crc(4) magic(4)                 │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Entries are ordered by key (comparator order), newest version first.
//! Opening a table reads only the footer and index; values are read on
//! demand and their checksum is verified when the read asks for it. A
//! damaged value therefore fails only the reads that touch it.

mod builder;
mod format;
mod reader;

pub use builder::TableBuilder;
pub use format::{Footer, TableEntry, ValueHandle, FOOTER_SIZE, TABLE_MAGIC};
pub use reader::TableReader;
