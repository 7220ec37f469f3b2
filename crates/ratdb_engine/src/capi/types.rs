//! Opaque handle types.
//!
//! Never dereferenced by callers; each points at the engine object named in
//! its documentation.

/// An open database.
#[repr(C)]
pub struct RatDbHandle {
    _private: [u8; 0],
}

/// Open-time options.
#[repr(C)]
pub struct RatDbOptions {
    _private: [u8; 0],
}

/// Per-read options.
#[repr(C)]
pub struct RatDbReadOptions {
    _private: [u8; 0],
}

/// Per-write options.
#[repr(C)]
pub struct RatDbWriteOptions {
    _private: [u8; 0],
}

/// Flush options.
#[repr(C)]
pub struct RatDbFlushOptions {
    _private: [u8; 0],
}

/// A cursor.
#[repr(C)]
pub struct RatDbIterator {
    _private: [u8; 0],
}

/// A pinned read sequence.
#[repr(C)]
pub struct RatDbSnapshot {
    _private: [u8; 0],
}

/// A batch of mutations.
#[repr(C)]
pub struct RatDbWriteBatch {
    _private: [u8; 0],
}

/// A caller-supplied key ordering.
#[repr(C)]
pub struct RatDbComparator {
    _private: [u8; 0],
}

/// A caller-supplied merge operator.
#[repr(C)]
pub struct RatDbMergeOperator {
    _private: [u8; 0],
}
