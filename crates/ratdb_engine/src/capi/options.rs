//! Option handles.

use super::callbacks::{ComparatorRef, ForeignComparator, ForeignMergeOperator, MergeOperatorRef};
use super::types::{
    RatDbComparator, RatDbFlushOptions, RatDbMergeOperator, RatDbOptions, RatDbReadOptions,
    RatDbSnapshot, RatDbWriteOptions,
};
use crate::config::{Config, FlushOptions, ReadOptions, SnapshotRef, WriteOptions};
use crate::db::SnapshotToken;
use std::sync::Arc;

pub(crate) unsafe fn config_ref<'a>(options: *const RatDbOptions) -> Option<&'a Config> {
    options.cast::<Config>().as_ref()
}

pub(crate) unsafe fn read_options<'a>(options: *const RatDbReadOptions) -> Option<&'a ReadOptions> {
    options.cast::<ReadOptions>().as_ref()
}

pub(crate) unsafe fn write_options<'a>(
    options: *const RatDbWriteOptions,
) -> Option<&'a WriteOptions> {
    options.cast::<WriteOptions>().as_ref()
}

pub(crate) unsafe fn flush_options<'a>(
    options: *const RatDbFlushOptions,
) -> Option<&'a FlushOptions> {
    options.cast::<FlushOptions>().as_ref()
}

/// Creates open options with defaults (`create_if_missing` off).
#[no_mangle]
pub extern "C" fn ratdb_options_create() -> *mut RatDbOptions {
    Box::into_raw(Box::new(Config::default())).cast()
}

/// Destroys open options. Null is ignored.
///
/// # Safety
///
/// `options` must be null or come from [`ratdb_options_create`], not yet
/// destroyed.
#[no_mangle]
pub unsafe extern "C" fn ratdb_options_destroy(options: *mut RatDbOptions) {
    if !options.is_null() {
        drop(Box::from_raw(options.cast::<Config>()));
    }
}

unsafe fn with_config(options: *mut RatDbOptions, f: impl FnOnce(&mut Config)) {
    if let Some(config) = options.cast::<Config>().as_mut() {
        f(config);
    }
}

/// # Safety
///
/// `options` must be a live options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_options_set_create_if_missing(options: *mut RatDbOptions, v: u8) {
    with_config(options, |c| c.create_if_missing = v != 0);
}

/// # Safety
///
/// `options` must be a live options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_options_set_error_if_exists(options: *mut RatDbOptions, v: u8) {
    with_config(options, |c| c.error_if_exists = v != 0);
}

/// # Safety
///
/// `options` must be a live options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_options_set_paranoid_checks(options: *mut RatDbOptions, v: u8) {
    with_config(options, |c| c.paranoid_checks = v != 0);
}

/// # Safety
///
/// `options` must be a live options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_options_set_write_buffer_size(
    options: *mut RatDbOptions,
    size: usize,
) {
    with_config(options, |c| c.write_buffer_size = size);
}

/// Uses `comparator` for key ordering. The comparator is stored by
/// reference.
///
/// # Safety
///
/// `options` must be a live options handle. `comparator` must stay alive
/// until these options and every database opened with them are gone.
#[no_mangle]
pub unsafe extern "C" fn ratdb_options_set_comparator(
    options: *mut RatDbOptions,
    comparator: *const RatDbComparator,
) {
    if comparator.is_null() {
        return;
    }
    let target = ComparatorRef::new(comparator.cast::<ForeignComparator>());
    with_config(options, |c| c.comparator = Arc::new(target));
}

/// Uses `operator` to resolve merges. Stored by reference, like
/// comparators.
///
/// # Safety
///
/// As for [`ratdb_options_set_comparator`].
#[no_mangle]
pub unsafe extern "C" fn ratdb_options_set_merge_operator(
    options: *mut RatDbOptions,
    operator: *const RatDbMergeOperator,
) {
    if operator.is_null() {
        with_config(options, |c| c.merge_operator = None);
        return;
    }
    let target = MergeOperatorRef::new(operator.cast::<ForeignMergeOperator>());
    with_config(options, |c| c.merge_operator = Some(Arc::new(target)));
}

/// Creates read options (checksums verified, no snapshot).
#[no_mangle]
pub extern "C" fn ratdb_readoptions_create() -> *mut RatDbReadOptions {
    Box::into_raw(Box::new(ReadOptions::default())).cast()
}

/// # Safety
///
/// `options` must be null or a live read options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_readoptions_destroy(options: *mut RatDbReadOptions) {
    if !options.is_null() {
        drop(Box::from_raw(options.cast::<ReadOptions>()));
    }
}

/// # Safety
///
/// `options` must be a live read options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_readoptions_set_verify_checksums(
    options: *mut RatDbReadOptions,
    v: u8,
) {
    if let Some(ro) = options.cast::<ReadOptions>().as_mut() {
        ro.verify_checksums = v != 0;
    }
}

/// # Safety
///
/// `options` must be a live read options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_readoptions_set_fill_cache(options: *mut RatDbReadOptions, v: u8) {
    if let Some(ro) = options.cast::<ReadOptions>().as_mut() {
        ro.fill_cache = v != 0;
    }
}

/// Reads through these options see `snapshot`; null clears it. The
/// snapshot identity is copied, so the options may outlive the handle,
/// but reads after release fail with `Invalid argument`.
///
/// # Safety
///
/// `options` must be a live read options handle and `snapshot` null or
/// a live snapshot handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_readoptions_set_snapshot(
    options: *mut RatDbReadOptions,
    snapshot: *const RatDbSnapshot,
) {
    let Some(ro) = options.cast::<ReadOptions>().as_mut() else {
        return;
    };
    ro.snapshot = snapshot
        .cast::<SnapshotToken>()
        .as_ref()
        .map(|token| SnapshotRef {
            db_id: token.db_id(),
            sequence: token.sequence(),
        });
}

/// Creates write options (no sync).
#[no_mangle]
pub extern "C" fn ratdb_writeoptions_create() -> *mut RatDbWriteOptions {
    Box::into_raw(Box::new(WriteOptions::default())).cast()
}

/// # Safety
///
/// `options` must be null or a live write options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_writeoptions_destroy(options: *mut RatDbWriteOptions) {
    if !options.is_null() {
        drop(Box::from_raw(options.cast::<WriteOptions>()));
    }
}

/// # Safety
///
/// `options` must be a live write options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_writeoptions_set_sync(options: *mut RatDbWriteOptions, v: u8) {
    if let Some(wo) = options.cast::<WriteOptions>().as_mut() {
        wo.sync = v != 0;
    }
}

/// Creates flush options (wait on).
#[no_mangle]
pub extern "C" fn ratdb_flushoptions_create() -> *mut RatDbFlushOptions {
    Box::into_raw(Box::new(FlushOptions::default())).cast()
}

/// # Safety
///
/// `options` must be null or a live flush options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_flushoptions_destroy(options: *mut RatDbFlushOptions) {
    if !options.is_null() {
        drop(Box::from_raw(options.cast::<FlushOptions>()));
    }
}

/// # Safety
///
/// `options` must be a live flush options handle.
#[no_mangle]
pub unsafe extern "C" fn ratdb_flushoptions_set_wait(options: *mut RatDbFlushOptions, v: u8) {
    if let Some(fo) = options.cast::<FlushOptions>().as_mut() {
        fo.wait = v != 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_reach_config() {
        unsafe {
            let options = ratdb_options_create();
            ratdb_options_set_create_if_missing(options, 1);
            ratdb_options_set_write_buffer_size(options, 1024);
            let config = config_ref(options).unwrap();
            assert!(config.create_if_missing);
            assert_eq!(config.write_buffer_size, 1024);
            ratdb_options_destroy(options);
        }
    }

    #[test]
    fn snapshot_identity_is_copied() {
        let token = SnapshotToken::for_tests(7, 42);
        unsafe {
            let ro = ratdb_readoptions_create();
            ratdb_readoptions_set_snapshot(ro, (&token as *const SnapshotToken).cast());
            let snap = read_options(ro).unwrap().snapshot.unwrap();
            assert_eq!(snap.db_id, 7);
            assert_eq!(snap.sequence.as_u64(), 42);
            ratdb_readoptions_set_snapshot(ro, std::ptr::null());
            assert!(read_options(ro).unwrap().snapshot.is_none());
            ratdb_readoptions_destroy(ro);
        }
    }

    #[test]
    fn null_handles_are_ignored() {
        unsafe {
            ratdb_options_destroy(std::ptr::null_mut());
            ratdb_readoptions_set_verify_checksums(std::ptr::null_mut(), 0);
            ratdb_writeoptions_set_sync(std::ptr::null_mut(), 1);
            ratdb_flushoptions_destroy(std::ptr::null_mut());
        }
    }
}
