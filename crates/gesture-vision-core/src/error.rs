//! Error types for the gesture-vision system.
//!
//! This module provides error handling using [`thiserror`] for automatic
//! `Display` and `Error` trait implementations.
//!
//! # Example
//!
//! ```rust
//! use gesture_vision_core::error::CoreError;
//!
//! fn check_landmark_count(n: usize) -> Result<(), CoreError> {
//!     if n != 21 {
//!         return Err(CoreError::validation(format!("expected 21 landmarks, got {n}")));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// A specialized `Result` type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for the gesture-vision core.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Validation error for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what validation failed
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
    },

    /// Invalid state for the requested operation
    #[error("Invalid state: expected {expected}, found {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

impl CoreError {
    /// Creates a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new invalid state error.
    #[must_use]
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = CoreError::validation("confidence out of range");
        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("confidence out of range"));
    }

    #[test]
    fn test_configuration_error_display() {
        let err = CoreError::configuration("pinch_enter must be below pinch_exit");
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_invalid_state_error_display() {
        let err = CoreError::invalid_state("Idle", "Cooldown");
        assert!(err.to_string().contains("expected Idle"));
        assert!(err.to_string().contains("found Cooldown"));
    }
}
