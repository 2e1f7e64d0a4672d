//! Error types for the sgd-ts library.

use thiserror::Error;

/// Result type alias for bandit operations.
pub type Result<T> = std::result::Result<T, BanditError>;

/// Errors that can occur during bandit operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BanditError {
    /// A construction-time parameter violates its constraint.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A context vector or matrix does not match the configured shape.
    #[error("dimension mismatch: {message}")]
    DimensionMismatch { message: String },

    /// Malformed input such as a reward outside {0, 1} or a call out of order.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A computation produced a degenerate covariance or a non-finite value.
    #[error("numerical instability: {message}")]
    NumericalInstability { message: String },
}

impl BanditError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub(crate) fn dimension(what: &str, expected: usize, got: usize) -> Self {
        Self::DimensionMismatch {
            message: format!("{what}: expected {expected}, got {got}"),
        }
    }

    pub(crate) fn input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn numerical(message: impl Into<String>) -> Self {
        Self::NumericalInstability {
            message: message.into(),
        }
    }
}
