//! Helpers for calling the engine C ABI.

use crate::error::{Error, Result};
use ratdb_engine::capi;
use std::ffi::{c_char, CStr, CString};
use std::ptr;

/// The `errptr` out-parameter of one engine call.
///
/// The engine allocates the message; [`ErrorSlot::take`] copies it into
/// host memory and frees the original. A message never taken is freed on
/// drop.
pub(crate) struct ErrorSlot {
    raw: *mut c_char,
}

impl ErrorSlot {
    pub(crate) fn new() -> Self {
        Self {
            raw: ptr::null_mut(),
        }
    }

    /// Adopts a message the engine wrote into a caller-provided array.
    pub(crate) fn from_raw(raw: *mut c_char) -> Self {
        Self { raw }
    }

    pub(crate) fn as_out(&mut self) -> *mut *mut c_char {
        &mut self.raw
    }

    /// Takes the message, if the engine stored one.
    pub(crate) fn take(&mut self) -> Option<String> {
        if self.raw.is_null() {
            return None;
        }
        // SAFETY: the engine stores NUL-terminated strings here.
        let message = unsafe { CStr::from_ptr(self.raw) }
            .to_string_lossy()
            .into_owned();
        // SAFETY: the engine allocated it; ownership ends here.
        unsafe { capi::ratdb_free(self.raw.cast()) };
        self.raw = ptr::null_mut();
        Some(message)
    }

    /// Converts a stored message with `make`, or succeeds.
    pub(crate) fn check(mut self, make: fn(String) -> Error) -> Result<()> {
        match self.take() {
            Some(message) => Err(make(message)),
            None => Ok(()),
        }
    }
}

impl Drop for ErrorSlot {
    fn drop(&mut self) {
        self.take();
    }
}

/// `(pointer, length)` for a key or value.
pub(crate) fn raw_parts(bytes: &[u8]) -> (*const c_char, usize) {
    (bytes.as_ptr().cast(), bytes.len())
}

/// A NUL-terminated copy of `text` for the engine.
pub(crate) fn c_string(text: &str, what: &str) -> Result<CString> {
    CString::new(text).map_err(|_| Error::invalid_argument(format!("{what} contains a NUL byte")))
}

pub(crate) fn operation(message: String) -> Error {
    Error::EngineOperation { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_checks_ok() {
        assert!(ErrorSlot::new().check(operation).is_ok());
    }

    #[test]
    fn nul_in_name_is_rejected() {
        let err = c_string("a\0b", "path").unwrap_err();
        assert_eq!(err.message(), "path contains a NUL byte");
    }
}
