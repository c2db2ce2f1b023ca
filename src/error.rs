//! Error types for the sage optimization engine.
//!
//! Errors are internal to the engine: the public `optimize` surface never
//! returns one. The orchestrator converts every error into a failed
//! [`OptimizationResponse`](crate::OptimizationResponse) whose message keeps
//! the validation/computation distinction, so callers can tell bad input
//! apart from an internal failure.

use thiserror::Error;

/// The primary error type for sage operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SageError {
    /// The request was malformed or incomplete. Detected before any
    /// sub-component runs.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A sub-component failed unexpectedly (e.g. malformed statistics).
    #[error("optimization failed: {message}")]
    Computation { message: String },

    /// Engine-level failure outside any sub-component (worker pool, task
    /// join). Indicates a bug or resource exhaustion, not bad input.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SageError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a computation error.
    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error was raised by request validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result type alias for sage operations.
pub type Result<T> = std::result::Result<T, SageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SageError::validation("query must not be empty");
        assert_eq!(err.to_string(), "validation error: query must not be empty");

        let err = SageError::computation("statistics out of range");
        assert_eq!(
            err.to_string(),
            "optimization failed: statistics out of range"
        );
    }

    #[test]
    fn test_validation_is_distinguishable() {
        assert!(SageError::validation("x").is_validation());
        assert!(!SageError::computation("x").is_validation());
        assert!(!SageError::internal("x").is_validation());
    }
}
