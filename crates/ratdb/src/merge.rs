//! Merge operators.
//!
//! Transported like [`Comparator`](crate::Comparator): boxed closure state,
//! `extern "C"` trampolines, engine-held by reference. The merged value is
//! handed to the engine as a boxed slice and comes back through the
//! delete callback, which frees it.

use crate::error::Result;
use crate::ffi::c_string;
use crate::handle::{HandleGuard, MergeOperatorKind};
use ratdb_engine::capi::{self, RatDbMergeOperator};
use std::ffi::{c_char, c_int, c_void, CString};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use tracing::error;

type FullMergeFn = dyn Fn(&[u8], Option<&[u8]>, &[&[u8]]) -> Option<Vec<u8>> + Send + Sync;

struct State {
    name: CString,
    full_merge: Box<FullMergeFn>,
}

unsafe fn slice<'a>(data: *const c_char, len: usize) -> &'a [u8] {
    if len == 0 || data.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(data.cast(), len)
    }
}

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn full_merge_trampoline(
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
) -> *mut c_char {
    let state = &*state.cast::<State>();
    let count = usize::try_from(num_operands).unwrap_or(0);
    let operands: Vec<&[u8]> = (0..count)
        .map(|i| slice(*operands_list.add(i), *operands_list_length.add(i)))
        .collect();
    let existing = (!existing_value.is_null()).then(|| slice(existing_value, existing_value_length));
    let key = slice(key, key_length);

    let merged = catch_unwind(AssertUnwindSafe(|| (state.full_merge)(key, existing, &operands)))
        .unwrap_or_else(|_| {
            error!(operator = ?state.name, "merge operator panicked");
            None
        });
    match merged {
        Some(value) => {
            *success = 1;
            *new_value_length = value.len();
            Box::into_raw(value.into_boxed_slice()).cast()
        }
        None => {
            *success = 0;
            *new_value_length = 0;
            ptr::null_mut()
        }
    }
}

unsafe extern "C" fn delete_value_trampoline(
    _state: *mut c_void,
    value: *const c_char,
    value_length: usize,
) {
    let raw = ptr::slice_from_raw_parts_mut(value.cast::<u8>().cast_mut(), value_length);
    drop(Box::from_raw(raw));
}

unsafe extern "C" fn name_trampoline(state: *mut c_void) -> *const c_char {
    (*state.cast::<State>()).name.as_ptr()
}

unsafe extern "C" fn destroy_trampoline(state: *mut c_void) {
    drop(Box::from_raw(state.cast::<State>()));
}

/// A merge operator implemented by a closure.
///
/// The closure receives the key, the existing value (if any) and the
/// operands oldest first, and returns the merged value or `None` to fail
/// the write.
pub struct MergeOperator {
    guard: HandleGuard<MergeOperatorKind>,
    name: String,
}

// SAFETY: as for Comparator.
unsafe impl Send for MergeOperator {}
unsafe impl Sync for MergeOperator {}

impl MergeOperator {
    /// Creates a merge operator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `name` contains a NUL byte.
    pub fn new<F>(name: &str, full_merge: F) -> Result<Self>
    where
        F: Fn(&[u8], Option<&[u8]>, &[&[u8]]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        let state = Box::into_raw(Box::new(State {
            name: c_string(name, "merge operator name")?,
            full_merge: Box::new(full_merge),
        }));
        // SAFETY: see Comparator::new.
        let raw = unsafe {
            capi::ratdb_mergeoperator_create(
                state.cast(),
                Some(destroy_trampoline),
                full_merge_trampoline,
                Some(delete_value_trampoline),
                name_trampoline,
            )
        };
        Ok(Self {
            guard: HandleGuard::acquire(raw)?,
            name: name.to_string(),
        })
    }

    /// The operator's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn raw(&self) -> Result<*const RatDbMergeOperator> {
        Ok(self.guard.get()?.cast_const())
    }
}

impl fmt::Debug for MergeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeOperator").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trampoline_round_trips_the_merged_value() {
        let operator = MergeOperator::new("test.concat", |_, existing, operands| {
            let mut out = existing.unwrap_or_default().to_vec();
            for op in operands {
                out.extend_from_slice(op);
            }
            Some(out)
        })
        .unwrap();
        let state = Box::into_raw(Box::new(State {
            name: CString::new("direct").unwrap(),
            full_merge: Box::new(|_: &[u8], _: Option<&[u8]>, ops: &[&[u8]]| Some(ops.concat())),
        }));
        let operands: [&[u8]; 2] = [b"ab", b"c"];
        let ptrs: Vec<*const c_char> = operands.iter().map(|o| o.as_ptr().cast()).collect();
        let lens: Vec<usize> = operands.iter().map(|o| o.len()).collect();
        let mut success = 0u8;
        let mut len = 0usize;
        unsafe {
            let value = full_merge_trampoline(
                state.cast(),
                b"k".as_ptr().cast(),
                1,
                ptr::null(),
                0,
                ptrs.as_ptr(),
                lens.as_ptr(),
                2,
                &mut success,
                &mut len,
            );
            assert_eq!(success, 1);
            assert_eq!(slice(value, len), b"abc");
            delete_value_trampoline(state.cast(), value, len);
            destroy_trampoline(state.cast());
        }
        assert_eq!(operator.name(), "test.concat");
    }

    #[test]
    fn panicking_closure_reports_failure() {
        let state = Box::into_raw(Box::new(State {
            name: CString::new("panics").unwrap(),
            full_merge: Box::new(|_: &[u8], _: Option<&[u8]>, _: &[&[u8]]| -> Option<Vec<u8>> {
                panic!("boom")
            }),
        }));
        let mut success = 1u8;
        let mut len = 9usize;
        unsafe {
            let value = full_merge_trampoline(
                state.cast(),
                ptr::null(),
                0,
                ptr::null(),
                0,
                ptr::null(),
                ptr::null(),
                0,
                &mut success,
                &mut len,
            );
            assert!(value.is_null());
            assert_eq!(success, 0);
            destroy_trampoline(state.cast());
        }
    }
}
