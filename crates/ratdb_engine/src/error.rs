//! Error types for the engine.
//!
//! The `Display` form of [`EngineError`] is the status string that crosses
//! the C ABI, so the prefixes (`Corruption:`, `IO error:`, ...) are part of
//! the contract with bindings.

use crate::storage::StorageError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Persistent data failed validation.
    #[error("Corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Storage backend error.
    #[error("IO error: {0}")]
    Storage(#[from] StorageError),

    /// The database directory is locked by another handle.
    #[error("IO error: lock {}: already held by another process", path.display())]
    Locked {
        /// Path of the lock file.
        path: PathBuf,
    },

    /// Caller supplied an argument the engine cannot honor.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Operation needs a capability that is not configured.
    #[error("Not supported: {message}")]
    NotSupported {
        /// Description of the missing capability.
        message: String,
    },
}

impl EngineError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Returns true if this error reports corrupted data.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
            || matches!(self, Self::Storage(StorageError::Corrupted(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_prefixes() {
        assert_eq!(
            EngineError::corruption("bad block").to_string(),
            "Corruption: bad block"
        );
        assert_eq!(
            EngineError::invalid_argument("x").to_string(),
            "Invalid argument: x"
        );
        assert_eq!(
            EngineError::not_supported("merge").to_string(),
            "Not supported: merge"
        );
        let io = EngineError::from(io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(io.to_string().starts_with("IO error: "));
    }

    #[test]
    fn corruption_detection() {
        assert!(EngineError::corruption("x").is_corruption());
        assert!(EngineError::from(StorageError::Corrupted("y".into())).is_corruption());
        assert!(!EngineError::invalid_argument("z").is_corruption());
    }
}
