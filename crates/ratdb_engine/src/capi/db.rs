//! Database entry points.

use super::memory::{alloc_array, alloc_copy, alloc_cstring, bytes, save_error, save_message, str_arg};
use super::options::{config_ref, flush_options, read_options, write_options};
use super::types::{
    RatDbFlushOptions, RatDbHandle, RatDbOptions, RatDbReadOptions, RatDbSnapshot, RatDbWriteBatch,
    RatDbWriteOptions,
};
use crate::batch::WriteBatch;
use crate::config::Config;
use crate::db::{Db, SnapshotToken};
use crate::error::{EngineError, EngineResult};
use std::ffi::{c_char, c_int};
use std::path::Path;
use std::ptr;
use tracing::{debug, warn};

pub(crate) unsafe fn db_ref<'a>(db: *const RatDbHandle) -> Option<&'a Db> {
    db.cast::<Db>().as_ref()
}

/// Runs `f` with the database, reporting a null handle or `f`'s error
/// through `errptr`.
unsafe fn with_db<T>(
    db: *const RatDbHandle,
    errptr: *mut *mut c_char,
    f: impl FnOnce(&Db) -> EngineResult<T>,
) -> Option<T> {
    let Some(db) = db_ref(db) else {
        save_message(errptr, "Invalid argument: null database handle");
        return None;
    };
    match f(db) {
        Ok(value) => Some(value),
        Err(e) => {
            save_error(errptr, &e);
            None
        }
    }
}

fn missing(what: &str) -> EngineError {
    EngineError::invalid_argument(format!("null {what}"))
}

/// Opens the database at `name`. Returns null and sets `*errptr` on
/// failure.
///
/// # Safety
///
/// `options` must be a live options handle, `name` a NUL-terminated UTF-8
/// path and `errptr` a valid error slot.
#[no_mangle]
pub unsafe extern "C" fn ratdb_open(
    options: *const RatDbOptions,
    name: *const c_char,
    errptr: *mut *mut c_char,
) -> *mut RatDbHandle {
    let opened = (|| {
        let config: Config = config_ref(options).ok_or_else(|| missing("options"))?.clone();
        let path = str_arg(name, "database name")?;
        Db::open(Path::new(path), config)
    })();
    match opened {
        Ok(db) => {
            let handle = Box::into_raw(Box::new(db));
            debug!(handle = ?handle, "database handle created");
            handle.cast()
        }
        Err(e) => {
            save_error(errptr, &e);
            ptr::null_mut()
        }
    }
}

/// Closes a database. Null is ignored.
///
/// # Safety
///
/// `db` must be null or a live handle from [`ratdb_open`]. Iterators
/// created from it must be destroyed first.
#[no_mangle]
pub unsafe extern "C" fn ratdb_close(db: *mut RatDbHandle) {
    if !db.is_null() {
        drop(Box::from_raw(db.cast::<Db>()));
        debug!(handle = ?db, "database handle released");
    }
}

/// Removes the database at `name`. A missing directory is not an error.
///
/// # Safety
///
/// As for [`ratdb_open`]; `options` may be null.
#[no_mangle]
pub unsafe extern "C" fn ratdb_destroy_db(
    _options: *const RatDbOptions,
    name: *const c_char,
    errptr: *mut *mut c_char,
) {
    let result = str_arg(name, "database name").and_then(|path| Db::destroy(Path::new(path)));
    if let Err(e) = result {
        save_error(errptr, &e);
    }
}

/// Stores `key` -> `val`.
///
/// # Safety
///
/// `db` and `options` must be live handles; `key`/`val` must point at
/// `keylen`/`vallen` readable bytes (null is allowed for zero lengths).
#[no_mangle]
pub unsafe extern "C" fn ratdb_put(
    db: *mut RatDbHandle,
    options: *const RatDbWriteOptions,
    key: *const c_char,
    keylen: usize,
    val: *const c_char,
    vallen: usize,
    errptr: *mut *mut c_char,
) {
    with_db(db, errptr, |db| {
        let wo = write_options(options).ok_or_else(|| missing("write options"))?;
        db.put(wo, bytes(key, keylen), bytes(val, vallen))
    });
}

/// Deletes `key`. Deleting an absent key succeeds.
///
/// # Safety
///
/// As for [`ratdb_put`].
#[no_mangle]
pub unsafe extern "C" fn ratdb_delete(
    db: *mut RatDbHandle,
    options: *const RatDbWriteOptions,
    key: *const c_char,
    keylen: usize,
    errptr: *mut *mut c_char,
) {
    with_db(db, errptr, |db| {
        let wo = write_options(options).ok_or_else(|| missing("write options"))?;
        db.delete(wo, bytes(key, keylen))
    });
}

/// Merges `val` into `key` with the configured merge operator.
///
/// # Safety
///
/// As for [`ratdb_put`].
#[no_mangle]
pub unsafe extern "C" fn ratdb_merge(
    db: *mut RatDbHandle,
    options: *const RatDbWriteOptions,
    key: *const c_char,
    keylen: usize,
    val: *const c_char,
    vallen: usize,
    errptr: *mut *mut c_char,
) {
    with_db(db, errptr, |db| {
        let wo = write_options(options).ok_or_else(|| missing("write options"))?;
        db.merge(wo, bytes(key, keylen), bytes(val, vallen))
    });
}

/// Applies every operation in `batch` atomically.
///
/// # Safety
///
/// `db`, `options` and `batch` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn ratdb_write(
    db: *mut RatDbHandle,
    options: *const RatDbWriteOptions,
    batch: *const RatDbWriteBatch,
    errptr: *mut *mut c_char,
) {
    with_db(db, errptr, |db| {
        let wo = write_options(options).ok_or_else(|| missing("write options"))?;
        let batch = batch
            .cast::<WriteBatch>()
            .as_ref()
            .ok_or_else(|| missing("write batch"))?;
        db.write(wo, batch)
    });
}

/// Reads `key`. Returns an engine-allocated value (free with
/// [`super::ratdb_free`]) and its length, or null with `*vallen = 0` when
/// the key is absent or on error.
///
/// # Safety
///
/// `db` and `options` must be live handles, `key` must point at `keylen`
/// bytes and `vallen` must be writable.
#[no_mangle]
pub unsafe extern "C" fn ratdb_get(
    db: *mut RatDbHandle,
    options: *const RatDbReadOptions,
    key: *const c_char,
    keylen: usize,
    vallen: *mut usize,
    errptr: *mut *mut c_char,
) -> *mut c_char {
    let found = with_db(db, errptr, |db| {
        let ro = read_options(options).ok_or_else(|| missing("read options"))?;
        db.get(ro, bytes(key, keylen))
    })
    .flatten();
    match found {
        Some(value) => {
            if !vallen.is_null() {
                *vallen = value.len();
            }
            alloc_copy(&value)
        }
        None => {
            if !vallen.is_null() {
                *vallen = 0;
            }
            ptr::null_mut()
        }
    }
}

/// Reads `num_keys` keys at one sequence.
///
/// The caller provides three output arrays of `num_keys` elements. For
/// each key exactly one of the following holds:
/// - `errs[i]` is a diagnostic string (and `values_list[i]` is null),
/// - `values_list[i]` is null: the key is absent,
/// - `values_list[i]` is an engine-allocated value of
///   `values_list_sizes[i]` bytes, possibly zero.
///
/// `errs` must be zeroed by the caller.
///
/// # Safety
///
/// `keys_list` and `keys_list_sizes` must hold `num_keys` readable
/// entries; the three output arrays `num_keys` writable entries.
#[no_mangle]
pub unsafe extern "C" fn ratdb_multi_get(
    db: *mut RatDbHandle,
    options: *const RatDbReadOptions,
    num_keys: usize,
    keys_list: *const *const c_char,
    keys_list_sizes: *const usize,
    values_list: *mut *mut c_char,
    values_list_sizes: *mut usize,
    errs: *mut *mut c_char,
) {
    if num_keys == 0 {
        return;
    }
    let keys: Vec<&[u8]> = (0..num_keys)
        .map(|i| bytes(*keys_list.add(i), *keys_list_sizes.add(i)))
        .collect();
    let results: Vec<EngineResult<Option<Vec<u8>>>> = match (db_ref(db), read_options(options)) {
        (Some(db), Some(ro)) => db.multi_get(ro, &keys),
        (None, _) => (0..num_keys).map(|_| Err(missing("database handle"))).collect(),
        (_, None) => (0..num_keys).map(|_| Err(missing("read options"))).collect(),
    };
    for (i, result) in results.into_iter().enumerate() {
        let (value, len) = match result {
            Ok(Some(value)) => (alloc_copy(&value), value.len()),
            Ok(None) => (ptr::null_mut(), 0),
            Err(e) => {
                save_error(errs.add(i), &e);
                (ptr::null_mut(), 0)
            }
        };
        *values_list.add(i) = value;
        *values_list_sizes.add(i) = len;
    }
}

/// Pins the current state. Release with [`ratdb_release_snapshot`] on the
/// same database.
///
/// # Safety
///
/// `db` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_create_snapshot(db: *mut RatDbHandle) -> *const RatDbSnapshot {
    match db_ref(db) {
        Some(db) => Box::into_raw(Box::new(db.create_snapshot())).cast_const().cast(),
        None => ptr::null(),
    }
}

/// Releases a snapshot and frees its handle.
///
/// # Safety
///
/// `db` must be the live handle that created `snapshot`, and `snapshot`
/// must not be used again.
#[no_mangle]
pub unsafe extern "C" fn ratdb_release_snapshot(
    db: *mut RatDbHandle,
    snapshot: *const RatDbSnapshot,
) {
    if snapshot.is_null() {
        return;
    }
    let token = *Box::from_raw(snapshot.cast::<SnapshotToken>().cast_mut());
    match db_ref(db) {
        Some(db) => {
            db.release_snapshot(token);
        }
        None => warn!(sequence = token.sequence().as_u64(), "snapshot released without a database"),
    }
}

/// Returns a NUL-terminated engine-allocated property value, or null for
/// unknown names.
///
/// # Safety
///
/// `db` must be a live handle and `propname` a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ratdb_property_value(
    db: *mut RatDbHandle,
    propname: *const c_char,
) -> *mut c_char {
    let (Some(db), Ok(name)) = (db_ref(db), str_arg(propname, "property name")) else {
        return ptr::null_mut();
    };
    match db.property_value(name) {
        Some(value) => alloc_cstring(&value),
        None => ptr::null_mut(),
    }
}

/// Fills `sizes[i]` with the approximate stored bytes in
/// `[range_start_key[i], range_limit_key[i])`.
///
/// # Safety
///
/// The four key arrays must hold `num_ranges` entries and `sizes` must
/// have room for `num_ranges` values.
#[no_mangle]
pub unsafe extern "C" fn ratdb_approximate_sizes(
    db: *mut RatDbHandle,
    num_ranges: c_int,
    range_start_key: *const *const c_char,
    range_start_key_len: *const usize,
    range_limit_key: *const *const c_char,
    range_limit_key_len: *const usize,
    sizes: *mut u64,
) {
    let Some(db) = db_ref(db) else {
        return;
    };
    let n = usize::try_from(num_ranges).unwrap_or(0);
    let ranges: Vec<(&[u8], &[u8])> = (0..n)
        .map(|i| {
            (
                bytes(*range_start_key.add(i), *range_start_key_len.add(i)),
                bytes(*range_limit_key.add(i), *range_limit_key_len.add(i)),
            )
        })
        .collect();
    for (i, size) in db.approximate_sizes(&ranges).into_iter().enumerate() {
        *sizes.add(i) = size;
    }
}

/// Compacts the tables overlapping `[start_key, limit_key]`. A null key
/// leaves that end unbounded.
///
/// # Safety
///
/// `db` must be a live handle; non-null keys must point at their lengths
/// in bytes.
#[no_mangle]
pub unsafe extern "C" fn ratdb_compact_range(
    db: *mut RatDbHandle,
    start_key: *const c_char,
    start_key_len: usize,
    limit_key: *const c_char,
    limit_key_len: usize,
    errptr: *mut *mut c_char,
) {
    let start = (!start_key.is_null()).then(|| bytes(start_key, start_key_len));
    let limit = (!limit_key.is_null()).then(|| bytes(limit_key, limit_key_len));
    with_db(db, errptr, |db| db.compact_range(start, limit));
}

/// Writes buffered updates to a table file.
///
/// # Safety
///
/// `db` and `options` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn ratdb_flush(
    db: *mut RatDbHandle,
    options: *const RatDbFlushOptions,
    errptr: *mut *mut c_char,
) {
    with_db(db, errptr, |db| {
        let fo = flush_options(options).ok_or_else(|| missing("flush options"))?;
        db.flush(fo)
    });
}

/// Stops deleting obsolete files until a matching enable. Calls nest.
///
/// # Safety
///
/// `db` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_disable_file_deletions(db: *mut RatDbHandle) {
    if let Some(db) = db_ref(db) {
        db.disable_file_deletions();
    }
}

/// Undoes one disable, or all of them when `force` is non-zero.
///
/// # Safety
///
/// `db` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_enable_file_deletions(db: *mut RatDbHandle, force: u8) {
    if let Some(db) = db_ref(db) {
        db.enable_file_deletions(force != 0);
    }
}

/// Lists the files needed to reconstruct the database.
///
/// On success `*names` and `*lens` are engine-allocated arrays of `*count`
/// entries; each name (not NUL-terminated, with a leading `/`) and both
/// arrays are freed with [`super::ratdb_free`]. `*manifest_size` is the
/// number of MANIFEST bytes that belong to this file set.
///
/// # Safety
///
/// `db` must be a live handle and every out-pointer writable.
#[no_mangle]
pub unsafe extern "C" fn ratdb_get_live_files(
    db: *mut RatDbHandle,
    flush: u8,
    names: *mut *mut *mut c_char,
    lens: *mut *mut usize,
    count: *mut c_int,
    manifest_size: *mut u64,
    errptr: *mut *mut c_char,
) {
    let Some(live) = with_db(db, errptr, |db| db.live_files(flush != 0)) else {
        return;
    };
    let Ok(n) = c_int::try_from(live.files.len()) else {
        save_message(errptr, "Not supported: too many live files");
        return;
    };
    let name_ptrs: Vec<*mut c_char> = live.files.iter().map(|f| alloc_copy(f.as_bytes())).collect();
    let name_lens: Vec<usize> = live.files.iter().map(String::len).collect();
    *names = alloc_array(&name_ptrs);
    *lens = alloc_array(&name_lens);
    *count = n;
    *manifest_size = live.manifest_size;
}
