//! Engine allocations and error reporting.

use crate::error::EngineError;
use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ffi::{c_char, c_void, CStr};
use std::ptr;

/// Every allocation starts with a header recording its total size, so
/// [`ratdb_free`] needs only the pointer.
const HEADER: usize = 16;
const ALIGN: usize = 16;

/// Allocates `len` bytes owned by the engine. Never returns null for a
/// representable size; zero-length allocations get a unique pointer.
pub(crate) fn alloc_raw(len: usize) -> *mut u8 {
    let Some(total) = len.checked_add(HEADER) else {
        return ptr::null_mut();
    };
    let Ok(layout) = Layout::from_size_align(total, ALIGN) else {
        return ptr::null_mut();
    };
    // SAFETY: layout has non-zero size (at least HEADER).
    unsafe {
        let base = alloc(layout);
        if base.is_null() {
            handle_alloc_error(layout);
        }
        base.cast::<usize>().write(total);
        base.add(HEADER)
    }
}

/// Copies bytes into a fresh engine allocation.
pub(crate) fn alloc_copy(bytes: &[u8]) -> *mut c_char {
    let out = alloc_raw(bytes.len());
    if !out.is_null() {
        // SAFETY: out has room for bytes.len() bytes.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len()) };
    }
    out.cast()
}

/// Copies a string into a NUL-terminated engine allocation. Interior NULs
/// are replaced so the text is not silently cut short.
pub(crate) fn alloc_cstring(text: &str) -> *mut c_char {
    let mut bytes: Vec<u8> = text.bytes().map(|b| if b == 0 { b'?' } else { b }).collect();
    bytes.push(0);
    alloc_copy(&bytes)
}

/// Allocates an array of `n` elements of `T`.
pub(crate) fn alloc_array<T: Copy>(items: &[T]) -> *mut T {
    let out = alloc_raw(std::mem::size_of_val(items)).cast::<T>();
    if !out.is_null() {
        // SAFETY: out is 16-byte aligned with room for items.len() elements.
        unsafe { ptr::copy_nonoverlapping(items.as_ptr(), out, items.len()) };
    }
    out
}

/// Stores `err` into `errptr`, freeing a message already there.
pub(crate) unsafe fn save_error(errptr: *mut *mut c_char, err: &EngineError) {
    save_message(errptr, &err.to_string());
}

pub(crate) unsafe fn save_message(errptr: *mut *mut c_char, message: &str) {
    if errptr.is_null() {
        return;
    }
    if !(*errptr).is_null() {
        ratdb_free((*errptr).cast());
    }
    *errptr = alloc_cstring(message);
}

/// Borrows `(ptr, len)` as a byte slice. A zero length may use a null
/// pointer.
pub(crate) unsafe fn bytes<'a>(data: *const c_char, len: usize) -> &'a [u8] {
    if len == 0 || data.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(data.cast::<u8>(), len)
    }
}

/// Reads a NUL-terminated UTF-8 string argument.
pub(crate) unsafe fn str_arg<'a>(data: *const c_char, what: &str) -> Result<&'a str, EngineError> {
    if data.is_null() {
        return Err(EngineError::invalid_argument(format!("null {what}")));
    }
    CStr::from_ptr(data)
        .to_str()
        .map_err(|_| EngineError::invalid_argument(format!("{what} is not valid UTF-8")))
}

/// Frees a buffer allocated by the engine. Null is ignored.
///
/// # Safety
///
/// `ptr` must be null or a pointer the engine handed out for freeing, not
/// yet freed.
#[no_mangle]
pub unsafe extern "C" fn ratdb_free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    let base = ptr.cast::<u8>().sub(HEADER);
    let total = base.cast::<usize>().read();
    dealloc(base, Layout::from_size_align_unchecked(total, ALIGN));
}
