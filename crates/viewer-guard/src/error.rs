//! Error types for the access-control engine.

use thiserror::Error;

/// Errors that can occur in access-control operations.
///
/// Addressing a rule that does not exist is not an error: deletions report
/// `false` or `0` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// A required field was missing or blank.
    #[error("{0}")]
    InvalidInput(String),

    /// The duration token is not part of the accepted vocabulary.
    #[error("invalid duration '{token}', expected one of: {expected}")]
    InvalidDuration {
        /// The rejected token.
        token: String,
        /// Comma-separated list of accepted tokens.
        expected: String,
    },

    /// The backing store failed to read or persist rules.
    #[error("storage error: {0}")]
    Storage(String),
}

impl GuardError {
    /// Shorthand for a missing or blank IP address.
    #[must_use]
    pub fn missing_address() -> Self {
        Self::InvalidInput("ip_address is required".to_string())
    }

    /// Whether the error was caused by the caller's input rather than the store.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidDuration { .. })
    }
}

impl From<std::io::Error> for GuardError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for access-control operations.
pub type GuardResult<T> = Result<T, GuardError>;
