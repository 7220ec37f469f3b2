//! # ratdb testkit
//!
//! Test utilities for ratdb.
//!
//! This crate provides:
//! - Temporary databases that can be closed and reopened in place
//! - Helpers that damage on-disk files the way crashes and bad disks do
//! - Property-based test generators using proptest
//! - One-line test logging setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ratdb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_database() {
//!     let db = TestDb::new();
//!     db.put(&WriteOptions::new(), b"k", b"v").unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod corruption;
pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::corruption::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::init_test_logging;
    pub use ratdb::{
        Database, FlushOptions, Options, Range, ReadOptions, WriteBatch, WriteOptions,
    };
}

pub use fixtures::*;
pub use logging::init_test_logging;
