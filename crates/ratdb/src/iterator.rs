//! Cursors over the key order.

use crate::buffer::BorrowedBuffer;
use crate::database::Database;
use crate::error::Result;
use crate::ffi::{self, raw_parts, ErrorSlot};
use crate::handle::{HandleGuard, IteratorKind};
use ratdb_engine::capi::{self, RatDbIterator};
use std::fmt;
use std::marker::PhantomData;

/// A cursor over the keys visible to the read options it was created with.
///
/// Starts unpositioned; call a seek before reading. [`DbIterator::key`]
/// and [`DbIterator::value`] borrow engine memory for the current
/// position, and the borrow checker prevents moving the cursor while such
/// a view is alive. A cursor may be sent to another thread but not shared.
pub struct DbIterator<'a> {
    guard: HandleGuard<IteratorKind>,
    positioned: bool,
    _source: PhantomData<&'a Database>,
}

impl<'a> DbIterator<'a> {
    pub(crate) fn new(raw: *mut RatDbIterator) -> Result<Self> {
        Ok(Self {
            guard: HandleGuard::acquire(raw)?,
            positioned: false,
            _source: PhantomData,
        })
    }

    fn raw(&self) -> *mut RatDbIterator {
        self.guard.as_ptr()
    }

    /// Returns true if the cursor is at an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        // SAFETY: live cursor.
        unsafe { capi::ratdb_iter_valid(self.raw()) != 0 }
    }

    /// Moves to the first key.
    pub fn seek_to_first(&mut self) {
        self.positioned = true;
        // SAFETY: live cursor.
        unsafe { capi::ratdb_iter_seek_to_first(self.raw()) };
    }

    /// Moves to the last key.
    pub fn seek_to_last(&mut self) {
        self.positioned = true;
        // SAFETY: live cursor.
        unsafe { capi::ratdb_iter_seek_to_last(self.raw()) };
    }

    /// Moves to the first key at or after `key`.
    pub fn seek(&mut self, key: &[u8]) {
        self.positioned = true;
        let (k, klen) = raw_parts(key);
        // SAFETY: live cursor; key valid for the call.
        unsafe { capi::ratdb_iter_seek(self.raw(), k, klen) };
    }

    /// Advances to the next key.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) {
        // SAFETY: live cursor.
        unsafe { capi::ratdb_iter_next(self.raw()) };
    }

    /// Steps back to the previous key.
    pub fn prev(&mut self) {
        // SAFETY: live cursor.
        unsafe { capi::ratdb_iter_prev(self.raw()) };
    }

    /// Current key, or `None` when not valid.
    #[must_use]
    pub fn key(&self) -> Option<BorrowedBuffer<'_>> {
        let mut len = 0;
        // SAFETY: the engine keeps the key until the cursor moves, which
        // needs &mut self.
        unsafe {
            let data = capi::ratdb_iter_key(self.raw(), &mut len);
            BorrowedBuffer::from_raw(data, len)
        }
    }

    /// Current value, or `None` when not valid.
    #[must_use]
    pub fn value(&self) -> Option<BorrowedBuffer<'_>> {
        let mut len = 0;
        // SAFETY: as for key.
        unsafe {
            let data = capi::ratdb_iter_value(self.raw(), &mut len);
            BorrowedBuffer::from_raw(data, len)
        }
    }

    /// The first error met while iterating, such as a corrupted value.
    ///
    /// # Errors
    ///
    /// Returns the engine's error, if any.
    pub fn status(&self) -> Result<()> {
        let mut err = ErrorSlot::new();
        // SAFETY: live cursor and error slot.
        unsafe { capi::ratdb_iter_get_error(self.raw(), err.as_out()) };
        err.check(ffi::operation)
    }

    /// Owned `(key, value)` pairs from the current position onward, or
    /// from the first key if no seek happened yet. A cursor error ends
    /// the sequence with `Err`.
    pub fn entries(&mut self) -> Entries<'_, 'a> {
        if !self.positioned {
            self.seek_to_first();
        }
        Entries {
            iter: self,
            done: false,
        }
    }

    /// Destroys the cursor.
    pub fn close(self) {
        drop(self);
    }
}

impl fmt::Debug for DbIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbIterator")
            .field("valid", &self.valid())
            .finish()
    }
}

/// Adaptor returned by [`DbIterator::entries`].
#[derive(Debug)]
pub struct Entries<'i, 'a> {
    iter: &'i mut DbIterator<'a>,
    done: bool,
}

impl Iterator for Entries<'_, '_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let entry = match (self.iter.key(), self.iter.value()) {
            (Some(key), Some(value)) => Some((key.to_vec(), value.to_vec())),
            _ => None,
        };
        match entry {
            Some(entry) => {
                self.iter.next();
                Some(Ok(entry))
            }
            None => {
                self.done = true;
                self.iter.status().err().map(Err)
            }
        }
    }
}
