//! Error types for the counter relay.

use queue_runtime::ValidationError;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

/// Errors that stop a relay
///
/// Backend failures are retried inside the relay and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A message body was not a non-negative decimal integer
    #[error("Malformed payload on queue {queue}: {body:?} is not a non-negative decimal integer")]
    MalformedPayload { queue: String, body: String },

    #[error("Invalid queue name '{name}': {source}")]
    InvalidQueueName {
        name: String,
        #[source]
        source: ValidationError,
    },
}

/// Invalid relay configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid queue name in {field}: {source}")]
    InvalidQueueName {
        field: String,
        #[source]
        source: ValidationError,
    },
}
