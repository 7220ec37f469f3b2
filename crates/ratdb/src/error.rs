//! Error types for the bindings.

use thiserror::Error;

/// Result type for binding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers.
///
/// Engine failures carry the engine's diagnostic text unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be opened.
    #[error("failed to open database: {message}")]
    EngineOpen {
        /// Engine diagnostic.
        message: String,
    },

    /// A read, write, iteration or admin call failed inside the engine.
    #[error("engine operation failed: {message}")]
    EngineOperation {
        /// Engine diagnostic.
        message: String,
    },

    /// A resource was used in a way the API forbids, such as reading
    /// through a snapshot that belongs to another database.
    #[error("programmer misuse: {message}")]
    ProgrammerMisuse {
        /// What went wrong.
        message: String,
    },

    /// One key of a multi-key read failed; sibling keys are unaffected.
    #[error("key {index} failed: {message}")]
    PartialBatch {
        /// Position of the key in the request.
        index: usize,
        /// Engine diagnostic.
        message: String,
    },

    /// An argument could not be passed to the engine.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was rejected.
        message: String,
    },

    /// The engine returned no handle and no diagnostic.
    #[error("engine returned a null {kind} handle")]
    NullHandle {
        /// Kind of resource requested.
        kind: &'static str,
    },

    /// Host-side file I/O (backups).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an open error.
    pub fn open(message: impl Into<String>) -> Self {
        Self::EngineOpen {
            message: message.into(),
        }
    }

    /// Creates an operation error.
    pub fn operation(message: impl Into<String>) -> Self {
        Self::EngineOperation {
            message: message.into(),
        }
    }

    /// Creates a misuse error.
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::ProgrammerMisuse {
            message: message.into(),
        }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// The underlying diagnostic without the binding's prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::EngineOpen { message }
            | Self::EngineOperation { message }
            | Self::ProgrammerMisuse { message }
            | Self::PartialBatch { message, .. }
            | Self::InvalidArgument { message } => message.clone(),
            Self::NullHandle { kind } => format!("null {kind} handle"),
            Self::Io(e) => e.to_string(),
        }
    }

    /// Returns true if the engine reported corrupted data.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::EngineOperation { message } | Self::PartialBatch { message, .. }
                if message.starts_with("Corruption")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_engine_text() {
        let err = Error::operation("Corruption: block checksum mismatch");
        assert_eq!(err.message(), "Corruption: block checksum mismatch");
        assert!(err.is_corruption());
        assert_eq!(
            err.to_string(),
            "engine operation failed: Corruption: block checksum mismatch"
        );
    }

    #[test]
    fn partial_batch_keeps_index() {
        let err = Error::PartialBatch {
            index: 2,
            message: "IO error: disk".into(),
        };
        assert_eq!(err.to_string(), "key 2 failed: IO error: disk");
        assert!(!err.is_corruption());
    }
}
