//! Error Types and Handling
//!
//! Error taxonomy for the mnemo semantic cache. The primary lookup and store
//! paths always surface failures; the only path permitted to degrade silently
//! is the hit-count bookkeeping, and that degradation happens in the cache
//! controller (logged, not returned), never here.
//!
//! # Example
//!
//! ```
//! use mnemo::error::{MnemoError, Result};
//!
//! fn check_dims(expected: usize, got: usize) -> Result<()> {
//!     if expected != got {
//!         return Err(MnemoError::DimensionMismatch { expected, got });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_dims(384, 128).is_err());
//! ```

use thiserror::Error;

/// Error types for mnemo cache operations
#[must_use]
#[derive(Error, Debug)]
pub enum MnemoError {
    /// The durable entry store was unreachable or a read/write could not
    /// complete. Callers own retry policy; the cache never retries
    /// internally (retrying an insert risks duplicate entries).
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Underlying filesystem failure (creating the database directory, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The vector encoder failed to produce an embedding
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// An embedding's dimensionality disagrees with the configured dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension the cache was configured with
        expected: usize,
        /// Dimension actually produced or decoded
        got: usize,
    },

    /// Persisted state could not be interpreted: bad embedding encoding,
    /// or a startup rebuild that cannot establish the slot/id invariant.
    /// Fatal at rebuild time: serving answers from a diverged index is
    /// worse than refusing to start.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Invalid cache configuration (threshold out of range, zero dimension)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias using [`MnemoError`]
pub type Result<T> = std::result::Result<T, MnemoError>;

impl MnemoError {
    /// Whether the error may succeed on retry (transient storage/IO trouble)
    pub fn is_retryable(&self) -> bool {
        matches!(self, MnemoError::Storage(_) | MnemoError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MnemoError::DimensionMismatch {
            expected: 384,
            got: 512,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 384, got 512");

        let err = MnemoError::Corruption("id_map length 3, index length 2".into());
        assert!(err.to_string().contains("Corruption"));
    }

    #[test]
    fn test_retryable_classification() {
        let io: MnemoError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(io.is_retryable());
        assert!(!MnemoError::InvalidConfig("threshold".into()).is_retryable());
        assert!(!MnemoError::Corruption("bad magic".into()).is_retryable());
    }
}
