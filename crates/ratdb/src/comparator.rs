//! Custom key ordering.
//!
//! The closure lives in a boxed state handed to the engine by pointer,
//! with `extern "C"` trampolines calling back into it. The engine holds
//! the comparator by reference, so [`Options`](crate::Options) keeps an
//! `Arc` and every [`Database`](crate::Database) opened with it keeps a
//! clone until it is closed.

use crate::error::Result;
use crate::ffi::c_string;
use crate::handle::{ComparatorKind, HandleGuard};
use ratdb_engine::capi::{self, RatDbComparator};
use std::cmp::Ordering;
use std::ffi::{c_char, c_int, c_void, CString};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

type CompareFn = dyn Fn(&[u8], &[u8]) -> Ordering + Send + Sync;

struct State {
    name: CString,
    compare: Box<CompareFn>,
}

unsafe fn slice<'a>(data: *const c_char, len: usize) -> &'a [u8] {
    if len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(data.cast(), len)
    }
}

unsafe extern "C" fn compare_trampoline(
    state: *mut c_void,
    a: *const c_char,
    alen: usize,
    b: *const c_char,
    blen: usize,
) -> c_int {
    let state = &*state.cast::<State>();
    match compare_guarded(state, slice(a, alen), slice(b, blen)) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) => 1,
        // No ordering can be reported to the engine, and unwinding across
        // the C ABI is undefined.
        None => std::process::abort(),
    }
}

/// Runs the closure, logging and returning `None` if it panics.
fn compare_guarded(state: &State, a: &[u8], b: &[u8]) -> Option<Ordering> {
    catch_unwind(AssertUnwindSafe(|| (state.compare)(a, b)))
        .map_err(|_| error!(comparator = ?state.name, "comparator panicked; aborting"))
        .ok()
}

unsafe extern "C" fn name_trampoline(state: *mut c_void) -> *const c_char {
    (*state.cast::<State>()).name.as_ptr()
}

unsafe extern "C" fn destroy_trampoline(state: *mut c_void) {
    drop(Box::from_raw(state.cast::<State>()));
}

/// A key ordering implemented by a closure.
pub struct Comparator {
    guard: HandleGuard<ComparatorKind>,
    name: String,
}

// SAFETY: the closure is Send + Sync and the engine calls it from any
// thread; the handle is only released on drop.
unsafe impl Send for Comparator {}
unsafe impl Sync for Comparator {}

impl Comparator {
    /// Creates a comparator. `name` is persisted with the database and must
    /// match on every later open.
    ///
    /// The engine calls `compare` from its own frames, so a panic cannot
    /// unwind back to the caller: it is logged and the process aborts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `name` contains a NUL byte.
    pub fn new<F>(name: &str, compare: F) -> Result<Self>
    where
        F: Fn(&[u8], &[u8]) -> Ordering + Send + Sync + 'static,
    {
        let state = Box::into_raw(Box::new(State {
            name: c_string(name, "comparator name")?,
            compare: Box::new(compare),
        }));
        // SAFETY: the trampolines match State, and the engine calls the
        // destructor exactly once when the handle is destroyed.
        let raw = unsafe {
            capi::ratdb_comparator_create(
                state.cast(),
                Some(destroy_trampoline),
                compare_trampoline,
                name_trampoline,
            )
        };
        Ok(Self {
            guard: HandleGuard::acquire(raw)?,
            name: name.to_string(),
        })
    }

    /// The persisted name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn raw(&self) -> Result<*const RatDbComparator> {
        Ok(self.guard.get()?.cast_const())
    }
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparator").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::Arc;

    #[test]
    fn closure_state_is_dropped_with_the_comparator() {
        let dropped = Arc::new(AtomicBool::new(false));
        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, AtomicOrdering::SeqCst);
            }
        }
        let flag = Flag(Arc::clone(&dropped));
        let comparator = Comparator::new("test.flag", move |a, b| {
            let _ = &flag;
            a.cmp(b)
        })
        .unwrap();
        assert_eq!(comparator.name(), "test.flag");
        assert!(!dropped.load(AtomicOrdering::SeqCst));
        drop(comparator);
        assert!(dropped.load(AtomicOrdering::SeqCst));
    }

    #[test]
    fn panicking_closure_is_caught_before_the_engine() {
        let state = State {
            name: CString::new("test.boom").unwrap(),
            compare: Box::new(|a: &[u8], b: &[u8]| {
                assert_ne!(a, b"boom", "boom");
                a.cmp(b)
            }),
        };
        assert_eq!(compare_guarded(&state, b"a", b"b"), Some(Ordering::Less));
        assert_eq!(compare_guarded(&state, b"boom", b"b"), None);
    }

    #[test]
    fn nul_in_name_is_rejected() {
        assert!(Comparator::new("bad\0name", |a, b| a.cmp(b)).is_err());
    }
}
