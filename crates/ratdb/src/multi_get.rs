//! Batched point reads.
//!
//! All keys go to the engine in one call: the host keys are laid out as
//! parallel pointer and length arrays, and the engine fills three parallel
//! output arrays. Each slot is decoded right here into an [`Outcome`], so
//! the error, absent and empty-but-present cases never leave this module
//! as raw pointers.

use crate::buffer::RecycledBuffer;
use crate::error::{Error, Result};
use crate::ffi::ErrorSlot;
use ratdb_engine::capi::{self, RatDbHandle, RatDbReadOptions};
use std::ffi::c_char;
use std::ptr;

/// Result of one key.
#[derive(Debug)]
pub(crate) enum Outcome {
    Error(String),
    Absent,
    Present(RecycledBuffer),
}

impl Outcome {
    /// Decodes one output slot, taking ownership of whatever the engine
    /// allocated in it.
    ///
    /// # Safety
    ///
    /// `value` and `error` must be null or engine allocations from this
    /// slot; `size` is the length of `value`.
    unsafe fn decode(value: *mut c_char, size: usize, error: *mut c_char) -> Self {
        let buffer = RecycledBuffer::from_raw(value, size);
        if let Some(message) = ErrorSlot::from_raw(error).take() {
            return Self::Error(message);
        }
        match buffer {
            Some(buffer) => Self::Present(buffer),
            None => Self::Absent,
        }
    }

    pub(crate) fn into_result(self, index: usize) -> Result<Option<RecycledBuffer>> {
        match self {
            Self::Error(message) => Err(Error::PartialBatch { index, message }),
            Self::Absent => Ok(None),
            Self::Present(buffer) => Ok(Some(buffer)),
        }
    }
}

/// Reads `keys` in one engine call, returning outcomes in key order.
///
/// # Safety
///
/// `db` and `options` must be live handles.
pub(crate) unsafe fn multi_get(
    db: *mut RatDbHandle,
    options: *const RatDbReadOptions,
    keys: &[&[u8]],
) -> Vec<Outcome> {
    let n = keys.len();
    if n == 0 {
        return Vec::new();
    }
    let key_ptrs: Vec<*const c_char> = keys.iter().map(|k| k.as_ptr().cast()).collect();
    let key_lens: Vec<usize> = keys.iter().map(|k| k.len()).collect();
    let mut values: Vec<*mut c_char> = vec![ptr::null_mut(); n];
    let mut sizes: Vec<usize> = vec![0; n];
    let mut errors: Vec<*mut c_char> = vec![ptr::null_mut(); n];

    capi::ratdb_multi_get(
        db,
        options,
        n,
        key_ptrs.as_ptr(),
        key_lens.as_ptr(),
        values.as_mut_ptr(),
        sizes.as_mut_ptr(),
        errors.as_mut_ptr(),
    );

    values
        .into_iter()
        .zip(sizes)
        .zip(errors)
        .map(|((value, size), error)| Outcome::decode(value, size, error))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_makes_no_call() {
        let outcomes = unsafe { multi_get(ptr::null_mut(), ptr::null(), &[]) };
        assert!(outcomes.is_empty());
    }

    #[test]
    fn null_slot_is_absent() {
        let outcome = unsafe { Outcome::decode(ptr::null_mut(), 0, ptr::null_mut()) };
        assert!(matches!(outcome, Outcome::Absent));
        assert!(outcome.into_result(0).unwrap().is_none());
    }

    #[test]
    fn null_database_fails_every_key() {
        let keys: [&[u8]; 2] = [b"a", b"b"];
        let outcomes = unsafe { multi_get(ptr::null_mut(), ptr::null(), &keys) };
        assert_eq!(outcomes.len(), 2);
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome.into_result(i) {
                Err(Error::PartialBatch { index, message }) => {
                    assert_eq!(index, i);
                    assert!(message.starts_with("Invalid argument"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
