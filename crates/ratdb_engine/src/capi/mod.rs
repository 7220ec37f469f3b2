//! C ABI of the engine.
//!
//! Conventions:
//! - Handles are opaque pointers created and destroyed by paired
//!   `*_create`/`*_destroy` (or `open`/`close`) functions.
//! - Fallible calls take `errptr: *mut *mut c_char`. On failure a
//!   NUL-terminated status string is stored there (replacing and freeing
//!   any previous one); on success it is left untouched.
//! - Every buffer handed out (values, error strings, property strings,
//!   live-file arrays and names) is released with [`ratdb_free`].
//!   Pointers returned by [`ratdb_iter_key`] and [`ratdb_iter_value`] are
//!   borrowed from the iterator and must not be freed.
//! - Keys and values cross as `(pointer, length)`; a zero length may come
//!   with a null pointer.

#![allow(clippy::missing_safety_doc)]

mod batch;
mod callbacks;
mod db;
mod iterator;
mod memory;
mod options;
mod types;

pub use batch::*;
pub use callbacks::*;
pub use db::*;
pub use iterator::*;
pub use memory::ratdb_free;
pub use options::*;
pub use types::*;
