//! Cursor entry points.

use super::db::db_ref;
use super::memory::{bytes, save_error};
use super::options::read_options;
use super::types::{RatDbHandle, RatDbIterator, RatDbReadOptions};
use crate::error::EngineError;
use crate::iter::EngineIterator;
use std::ffi::c_char;
use std::ptr;
use std::sync::Arc;

unsafe fn iter_mut<'a>(iter: *mut RatDbIterator) -> Option<&'a mut EngineIterator> {
    iter.cast::<EngineIterator>().as_mut()
}

unsafe fn iter_ref<'a>(iter: *const RatDbIterator) -> Option<&'a EngineIterator> {
    iter.cast::<EngineIterator>().as_ref()
}

/// Creates an unpositioned cursor over the state visible through
/// `options`. If the read options are unusable (for example a released
/// snapshot) the cursor is never valid and reports the problem through
/// [`ratdb_iter_get_error`]. Returns null only for a null `db`.
///
/// # Safety
///
/// `db` and `options` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn ratdb_create_iterator(
    db: *mut RatDbHandle,
    options: *const RatDbReadOptions,
) -> *mut RatDbIterator {
    let Some(db) = db_ref(db) else {
        return ptr::null_mut();
    };
    let iter = match read_options(options) {
        Some(ro) => db
            .iterator(ro)
            .unwrap_or_else(|e| EngineIterator::failed(Arc::clone(db.comparator()), e)),
        None => EngineIterator::failed(
            Arc::clone(db.comparator()),
            EngineError::invalid_argument("null read options"),
        ),
    };
    Box::into_raw(Box::new(iter)).cast()
}

/// Destroys a cursor. Null is ignored.
///
/// # Safety
///
/// `iter` must be null or a live cursor, not used afterwards.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_destroy(iter: *mut RatDbIterator) {
    if !iter.is_null() {
        drop(Box::from_raw(iter.cast::<EngineIterator>()));
    }
}

/// Returns 1 if the cursor is at an entry.
///
/// # Safety
///
/// `iter` must be a live cursor.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_valid(iter: *const RatDbIterator) -> u8 {
    iter_ref(iter).map_or(0, |it| u8::from(it.valid()))
}

/// # Safety
///
/// `iter` must be a live cursor.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_seek_to_first(iter: *mut RatDbIterator) {
    if let Some(it) = iter_mut(iter) {
        it.seek_to_first();
    }
}

/// # Safety
///
/// `iter` must be a live cursor.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_seek_to_last(iter: *mut RatDbIterator) {
    if let Some(it) = iter_mut(iter) {
        it.seek_to_last();
    }
}

/// Positions at the first key at or after `k`.
///
/// # Safety
///
/// `iter` must be a live cursor and `k` point at `klen` bytes.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_seek(iter: *mut RatDbIterator, k: *const c_char, klen: usize) {
    if let Some(it) = iter_mut(iter) {
        it.seek(bytes(k, klen));
    }
}

/// # Safety
///
/// `iter` must be a live cursor.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_next(iter: *mut RatDbIterator) {
    if let Some(it) = iter_mut(iter) {
        it.next();
    }
}

/// # Safety
///
/// `iter` must be a live cursor.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_prev(iter: *mut RatDbIterator) {
    if let Some(it) = iter_mut(iter) {
        it.prev();
    }
}

unsafe fn borrowed(slice: Option<&[u8]>, len: *mut usize) -> *const c_char {
    let (data, n) = match slice {
        Some(s) => (s.as_ptr().cast::<c_char>(), s.len()),
        None => (ptr::null(), 0),
    };
    if !len.is_null() {
        *len = n;
    }
    data
}

/// Current key, borrowed until the cursor moves or is destroyed. Null when
/// the cursor is not valid.
///
/// # Safety
///
/// `iter` must be a live cursor and `klen` writable.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_key(iter: *const RatDbIterator, klen: *mut usize) -> *const c_char {
    borrowed(iter_ref(iter).and_then(EngineIterator::key), klen)
}

/// Current value, borrowed like [`ratdb_iter_key`].
///
/// # Safety
///
/// `iter` must be a live cursor and `vlen` writable.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_value(
    iter: *const RatDbIterator,
    vlen: *mut usize,
) -> *const c_char {
    borrowed(iter_ref(iter).and_then(EngineIterator::value), vlen)
}

/// Stores the first error the cursor met, if any, into `*errptr`.
///
/// # Safety
///
/// `iter` must be a live cursor and `errptr` a valid error slot.
#[no_mangle]
pub unsafe extern "C" fn ratdb_iter_get_error(iter: *const RatDbIterator, errptr: *mut *mut c_char) {
    if let Some(e) = iter_ref(iter).and_then(EngineIterator::error) {
        save_error(errptr, e);
    }
}
