//! Failures reported by queue backends.
//!
//! Most callers only need [`QueueError::is_transient`] to decide between
//! retrying in place and giving up.

use thiserror::Error;

/// Error returned by every [`QueueProvider`](crate::QueueProvider) operation
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backend could not be reached or is refusing work for now
    #[error("Queue backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Queue {queue} does not exist")]
    QueueNotFound { queue: String },

    /// The receipt was already used, or its visibility window lapsed
    #[error("Receipt {receipt} is no longer valid")]
    ReceiptNotFound { receipt: String },

    #[error("Backend rejected the credentials: {message}")]
    AuthenticationFailed { message: String },

    #[error("Message of {size} bytes exceeds the {max_size} byte limit")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("{provider} returned {code}: {message}")]
    ProviderFailure {
        provider: String,
        code: String,
        message: String,
    },

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("Invalid backend configuration: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl QueueError {
    /// Whether repeating the same call later can succeed
    ///
    /// Provider failures count as transient (throttling, internal errors)
    /// apart from a bounded queue refusing a message.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::BackendUnavailable { .. } => true,
            Self::ProviderFailure { code, .. } => code != QUEUE_FULL_CODE,
            Self::QueueNotFound { .. }
            | Self::ReceiptNotFound { .. }
            | Self::AuthenticationFailed { .. }
            | Self::MessageTooLarge { .. }
            | Self::Serialization(_)
            | Self::Configuration { .. }
            | Self::Validation(_) => false,
        }
    }
}

/// Provider error code used when a bounded queue refuses a message.
pub(crate) const QUEUE_FULL_CODE: &str = "QueueFull";

/// Message bodies or provider responses that could not be decoded
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Unreadable provider response: {message}")]
    MalformedResponse { message: String },
}

/// Identifier rejected before it reaches a backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} contains {character:?}; only ASCII letters, digits, '-' and '_' are allowed")]
    InvalidCharacter { field: &'static str, character: char },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
