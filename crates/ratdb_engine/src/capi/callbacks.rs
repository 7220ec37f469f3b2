//! Caller-supplied comparators and merge operators.
//!
//! A callback object owns an opaque `state` pointer and a destructor that
//! runs exactly once, when the object is destroyed. Options hold callback
//! objects by reference, so the creator keeps them alive for as long as
//! any database uses them.

use super::types::{RatDbComparator, RatDbMergeOperator};
use crate::comparator::Comparator;
use crate::merge::MergeOperator;
use std::cmp::Ordering;
use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr;
use tracing::warn;

/// Releases callback state.
pub type RatDbDestructorFn = unsafe extern "C" fn(state: *mut c_void);

/// Returns the NUL-terminated name of a callback object.
pub type RatDbNameFn = unsafe extern "C" fn(state: *mut c_void) -> *const c_char;

/// Three-way comparison: negative, zero or positive.
pub type RatDbCompareFn = unsafe extern "C" fn(
    state: *mut c_void,
    a: *const c_char,
    alen: usize,
    b: *const c_char,
    blen: usize,
) -> c_int;

/// Folds `operands` (oldest first) onto `existing_value` (null if the key
/// has none). On success sets `*success` to 1 and returns the merged
/// value, which the engine copies and hands back through the delete
/// callback.
pub type RatDbFullMergeFn = unsafe extern "C" fn(
    state: *mut c_void,
    key: *const c_char,
    key_length: usize,
    existing_value: *const c_char,
    existing_value_length: usize,
    operands_list: *const *const c_char,
    operands_list_length: *const usize,
    num_operands: c_int,
    success: *mut u8,
    new_value_length: *mut usize,
) -> *mut c_char;

/// Releases a value returned by [`RatDbFullMergeFn`].
pub type RatDbDeleteValueFn =
    unsafe extern "C" fn(state: *mut c_void, value: *const c_char, value_length: usize);

unsafe fn read_name(state: *mut c_void, name: RatDbNameFn) -> String {
    let raw = name(state);
    if raw.is_null() {
        return String::new();
    }
    CStr::from_ptr(raw).to_string_lossy().into_owned()
}

pub(crate) struct ForeignComparator {
    state: *mut c_void,
    destructor: Option<RatDbDestructorFn>,
    compare: RatDbCompareFn,
    name: String,
}

impl Drop for ForeignComparator {
    fn drop(&mut self) {
        if let Some(destructor) = self.destructor {
            // SAFETY: the creator handed us `state` with this destructor.
            unsafe { destructor(self.state) };
        }
    }
}

/// A comparator borrowed from its callback object.
pub(crate) struct ComparatorRef(*const ForeignComparator);

impl ComparatorRef {
    pub(crate) fn new(target: *const ForeignComparator) -> Self {
        Self(target)
    }

    fn target(&self) -> &ForeignComparator {
        // SAFETY: the creator keeps the callback object alive while any
        // options or database reference it.
        unsafe { &*self.0 }
    }
}

// SAFETY: callbacks must be callable from any thread; the state pointer is
// only handed back to them.
unsafe impl Send for ComparatorRef {}
unsafe impl Sync for ComparatorRef {}

impl Comparator for ComparatorRef {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let target = self.target();
        // SAFETY: slices outlive the call.
        let result = unsafe {
            (target.compare)(
                target.state,
                a.as_ptr().cast(),
                a.len(),
                b.as_ptr().cast(),
                b.len(),
            )
        };
        result.cmp(&0)
    }

    fn name(&self) -> &str {
        &self.target().name
    }
}

pub(crate) struct ForeignMergeOperator {
    state: *mut c_void,
    destructor: Option<RatDbDestructorFn>,
    full_merge: RatDbFullMergeFn,
    delete_value: Option<RatDbDeleteValueFn>,
    name: String,
}

impl Drop for ForeignMergeOperator {
    fn drop(&mut self) {
        if let Some(destructor) = self.destructor {
            // SAFETY: as for comparators.
            unsafe { destructor(self.state) };
        }
    }
}

/// A merge operator borrowed from its callback object.
pub(crate) struct MergeOperatorRef(*const ForeignMergeOperator);

impl MergeOperatorRef {
    pub(crate) fn new(target: *const ForeignMergeOperator) -> Self {
        Self(target)
    }

    fn target(&self) -> &ForeignMergeOperator {
        // SAFETY: see ComparatorRef::target.
        unsafe { &*self.0 }
    }
}

// SAFETY: see ComparatorRef.
unsafe impl Send for MergeOperatorRef {}
unsafe impl Sync for MergeOperatorRef {}

impl MergeOperator for MergeOperatorRef {
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[&[u8]]) -> Option<Vec<u8>> {
        let target = self.target();
        let Ok(count) = c_int::try_from(operands.len()) else {
            warn!(operands = operands.len(), "too many merge operands");
            return None;
        };
        let pointers: Vec<*const c_char> = operands.iter().map(|op| op.as_ptr().cast()).collect();
        let lengths: Vec<usize> = operands.iter().map(|op| op.len()).collect();
        let (existing_ptr, existing_len) = match existing {
            Some(value) => (value.as_ptr().cast::<c_char>(), value.len()),
            None => (ptr::null(), 0),
        };
        let mut success = 0u8;
        let mut len = 0usize;
        // SAFETY: every pointer refers to a slice that outlives the call.
        let raw = unsafe {
            (target.full_merge)(
                target.state,
                key.as_ptr().cast(),
                key.len(),
                existing_ptr,
                existing_len,
                pointers.as_ptr(),
                lengths.as_ptr(),
                count,
                &mut success,
                &mut len,
            )
        };
        let merged = if success == 0 {
            None
        } else if raw.is_null() {
            Some(Vec::new())
        } else {
            // SAFETY: the callback reported `len` bytes at `raw`.
            Some(unsafe { std::slice::from_raw_parts(raw.cast::<u8>(), len) }.to_vec())
        };
        if !raw.is_null() {
            if let Some(delete_value) = target.delete_value {
                // SAFETY: handing the callback's own buffer back to it.
                unsafe { delete_value(target.state, raw, len) };
            }
        }
        merged
    }

    fn name(&self) -> &str {
        &self.target().name
    }
}

/// Creates a comparator. The name is read once, here; it is persisted by
/// databases created with the comparator.
///
/// # Safety
///
/// `compare` and `name` must be safe to call from any thread with `state`.
/// `destructor`, if given, is called with `state` once, by
/// [`ratdb_comparator_destroy`].
#[no_mangle]
pub unsafe extern "C" fn ratdb_comparator_create(
    state: *mut c_void,
    destructor: Option<RatDbDestructorFn>,
    compare: RatDbCompareFn,
    name: RatDbNameFn,
) -> *mut RatDbComparator {
    let comparator = ForeignComparator {
        state,
        destructor,
        compare,
        name: read_name(state, name),
    };
    Box::into_raw(Box::new(comparator)).cast()
}

/// Destroys a comparator and runs its destructor.
///
/// # Safety
///
/// `comparator` must be null or a live comparator that no open database
/// or options handle still uses.
#[no_mangle]
pub unsafe extern "C" fn ratdb_comparator_destroy(comparator: *mut RatDbComparator) {
    if !comparator.is_null() {
        drop(Box::from_raw(comparator.cast::<ForeignComparator>()));
    }
}

/// Creates a merge operator.
///
/// # Safety
///
/// As for [`ratdb_comparator_create`]. `delete_value`, if given, receives
/// every non-null value `full_merge` returns.
#[no_mangle]
pub unsafe extern "C" fn ratdb_mergeoperator_create(
    state: *mut c_void,
    destructor: Option<RatDbDestructorFn>,
    full_merge: RatDbFullMergeFn,
    delete_value: Option<RatDbDeleteValueFn>,
    name: RatDbNameFn,
) -> *mut RatDbMergeOperator {
    let operator = ForeignMergeOperator {
        state,
        destructor,
        full_merge,
        delete_value,
        name: read_name(state, name),
    };
    Box::into_raw(Box::new(operator)).cast()
}

/// Destroys a merge operator and runs its destructor.
///
/// # Safety
///
/// As for [`ratdb_comparator_destroy`].
#[no_mangle]
pub unsafe extern "C" fn ratdb_mergeoperator_destroy(operator: *mut RatDbMergeOperator) {
    if !operator.is_null() {
        drop(Box::from_raw(operator.cast::<ForeignMergeOperator>()));
    }
}
