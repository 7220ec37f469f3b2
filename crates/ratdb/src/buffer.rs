//! Views over engine-allocated bytes.
//!
//! Two kinds of buffer cross the boundary and they are deliberately
//! different types:
//! - [`RecycledBuffer`] owns a per-call engine allocation and frees it
//!   exactly once, on [`RecycledBuffer::release`] or drop.
//! - [`BorrowedBuffer`] views memory the engine keeps for a cursor
//!   position. It has no release at all, and its lifetime ends when the
//!   cursor moves.
//!
//! Neither copies on construction.

use ratdb_engine::capi;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

/// Bytes allocated by the engine for one call and owned by this value.
///
/// A present zero-length value is a `RecycledBuffer` of length zero;
/// absence is expressed by the surrounding `Option`.
pub struct RecycledBuffer {
    data: *mut u8,
    len: usize,
}

// SAFETY: the buffer is exclusively owned and `ratdb_free` may run on any
// thread.
unsafe impl Send for RecycledBuffer {}
// SAFETY: shared access is read-only.
unsafe impl Sync for RecycledBuffer {}

impl RecycledBuffer {
    /// Takes ownership of `len` bytes at `data`. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// `data` must be null or an engine allocation of at least `len` bytes
    /// that nothing else will free.
    pub(crate) unsafe fn from_raw(data: *mut std::ffi::c_char, len: usize) -> Option<Self> {
        if data.is_null() {
            None
        } else {
            Some(Self {
                data: data.cast(),
                len,
            })
        }
    }

    /// The bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: data is a live allocation of len bytes until drop.
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }

    /// Copies the bytes into host memory.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Frees the engine allocation now rather than at drop.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for RecycledBuffer {
    fn drop(&mut self) {
        // SAFETY: data came from the engine and is freed only here.
        unsafe { capi::ratdb_free(self.data.cast()) };
    }
}

impl Deref for RecycledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for RecycledBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq<[u8]> for RecycledBuffer {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl fmt::Debug for RecycledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecycledBuffer")
            .field("len", &self.len)
            .finish()
    }
}

/// Bytes the engine keeps for the current cursor position.
///
/// The lifetime ties the view to a shared borrow of the cursor, so moving
/// the cursor ends it; use [`BorrowedBuffer::to_vec`] to keep the bytes.
#[derive(Clone, Copy)]
pub struct BorrowedBuffer<'a> {
    data: *const u8,
    len: usize,
    _cursor: PhantomData<&'a [u8]>,
}

impl<'a> BorrowedBuffer<'a> {
    /// Views `len` bytes at `data`. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// The bytes must stay valid and unchanged for `'a`.
    pub(crate) unsafe fn from_raw(data: *const std::ffi::c_char, len: usize) -> Option<Self> {
        if data.is_null() {
            None
        } else {
            Some(Self {
                data: data.cast(),
                len,
                _cursor: PhantomData,
            })
        }
    }

    /// The bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: valid for 'a by construction.
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }

    /// Copies the bytes out so they survive cursor movement.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl Deref for BorrowedBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for BorrowedBuffer<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for BorrowedBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BorrowedBuffer")
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratdb_engine::capi::*;
    use std::ffi::CString;
    use std::ptr;
    use tempfile::TempDir;

    /// Fetches `key` with the engine directly so the buffer comes from a
    /// real engine allocation.
    fn engine_get(value: &[u8]) -> (TempDir, Option<RecycledBuffer>, Option<RecycledBuffer>) {
        let dir = TempDir::new().unwrap();
        let name = CString::new(dir.path().join("db").to_str().unwrap()).unwrap();
        unsafe {
            let options = ratdb_options_create();
            ratdb_options_set_create_if_missing(options, 1);
            let mut err = ptr::null_mut();
            let db = ratdb_open(options, name.as_ptr(), &mut err);
            assert!(err.is_null());
            let wo = ratdb_writeoptions_create();
            let ro = ratdb_readoptions_create();
            ratdb_put(db, wo, b"k".as_ptr().cast(), 1, value.as_ptr().cast(), value.len(), &mut err);
            let mut len = 0;
            let present = ratdb_get(db, ro, b"k".as_ptr().cast(), 1, &mut len, &mut err);
            let present = RecycledBuffer::from_raw(present, len);
            let absent = ratdb_get(db, ro, b"x".as_ptr().cast(), 1, &mut len, &mut err);
            let absent = RecycledBuffer::from_raw(absent, len);
            assert!(err.is_null());
            ratdb_readoptions_destroy(ro);
            ratdb_writeoptions_destroy(wo);
            ratdb_close(db);
            ratdb_options_destroy(options);
            (dir, present, absent)
        }
    }

    #[test]
    fn recycled_buffer_views_without_copy() {
        let (_dir, present, absent) = engine_get(b"value");
        let present = present.unwrap();
        assert_eq!(&*present, b"value");
        assert!(absent.is_none());
        present.release();
    }

    #[test]
    fn empty_value_is_present() {
        let (_dir, present, _) = engine_get(b"");
        let present = present.unwrap();
        assert!(present.is_empty());
        assert_eq!(present.to_vec(), Vec::<u8>::new());
    }

    #[test]
    fn recycled_buffer_drops_on_another_thread() {
        let (_dir, present, _) = engine_get(b"v");
        let present = present.unwrap();
        std::thread::spawn(move || assert_eq!(present.as_bytes(), b"v"))
            .join()
            .unwrap();
    }

    #[test]
    fn borrowed_buffer_copies_out() {
        let bytes = b"cursor".to_vec();
        let view = unsafe { BorrowedBuffer::from_raw(bytes.as_ptr().cast(), bytes.len()) }.unwrap();
        assert_eq!(view.to_vec(), b"cursor");
        assert!(unsafe { BorrowedBuffer::from_raw(ptr::null(), 0) }.is_none());
    }
}
