//! Write batch entry points.

use super::memory::bytes;
use super::types::RatDbWriteBatch;
use crate::batch::WriteBatch;
use std::ffi::{c_char, c_int};

unsafe fn batch_mut<'a>(batch: *mut RatDbWriteBatch) -> Option<&'a mut WriteBatch> {
    batch.cast::<WriteBatch>().as_mut()
}

/// Creates an empty batch.
#[no_mangle]
pub extern "C" fn ratdb_writebatch_create() -> *mut RatDbWriteBatch {
    Box::into_raw(Box::new(WriteBatch::new())).cast()
}

/// Destroys a batch. Null is ignored.
///
/// # Safety
///
/// `batch` must be null or a live batch, not used afterwards.
#[no_mangle]
pub unsafe extern "C" fn ratdb_writebatch_destroy(batch: *mut RatDbWriteBatch) {
    if !batch.is_null() {
        drop(Box::from_raw(batch.cast::<WriteBatch>()));
    }
}

/// Removes every operation.
///
/// # Safety
///
/// `batch` must be a live batch.
#[no_mangle]
pub unsafe extern "C" fn ratdb_writebatch_clear(batch: *mut RatDbWriteBatch) {
    if let Some(b) = batch_mut(batch) {
        b.clear();
    }
}

/// Number of operations, saturating at `c_int::MAX`.
///
/// # Safety
///
/// `batch` must be a live batch.
#[no_mangle]
pub unsafe extern "C" fn ratdb_writebatch_count(batch: *const RatDbWriteBatch) -> c_int {
    batch
        .cast::<WriteBatch>()
        .as_ref()
        .map_or(0, |b| c_int::try_from(b.count()).unwrap_or(c_int::MAX))
}

/// Appends a put. Key and value are copied.
///
/// # Safety
///
/// `batch` must be a live batch; `key`/`val` must point at `klen`/`vlen`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn ratdb_writebatch_put(
    batch: *mut RatDbWriteBatch,
    key: *const c_char,
    klen: usize,
    val: *const c_char,
    vlen: usize,
) {
    if let Some(b) = batch_mut(batch) {
        b.put(bytes(key, klen), bytes(val, vlen));
    }
}

/// Appends a delete.
///
/// # Safety
///
/// As for [`ratdb_writebatch_put`].
#[no_mangle]
pub unsafe extern "C" fn ratdb_writebatch_delete(
    batch: *mut RatDbWriteBatch,
    key: *const c_char,
    klen: usize,
) {
    if let Some(b) = batch_mut(batch) {
        b.delete(bytes(key, klen));
    }
}

/// Appends a merge operand.
///
/// # Safety
///
/// As for [`ratdb_writebatch_put`].
#[no_mangle]
pub unsafe extern "C" fn ratdb_writebatch_merge(
    batch: *mut RatDbWriteBatch,
    key: *const c_char,
    klen: usize,
    val: *const c_char,
    vlen: usize,
) {
    if let Some(b) = batch_mut(batch) {
        b.merge(bytes(key, klen), bytes(val, vlen));
    }
}
