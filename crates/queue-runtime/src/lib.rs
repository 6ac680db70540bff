//! # Queue Runtime
//!
//! Provider-agnostic queue operations over AWS SQS (or any SQS-compatible
//! endpoint such as LocalStack) and an in-memory backend.
//!
//! This library provides:
//! - Queue lookup and idempotent creation by name
//! - Sending, long-poll receiving, and deleting messages
//! - Error classification into transient and permanent failures
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Message structures and receipt handles
//! - [`provider`] - Provider types and configuration
//! - [`client`] - Provider trait and factory
//! - [`providers`] - Concrete provider implementations

pub mod client;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use client::{QueueClientFactory, QueueProvider};
pub use error::{QueueError, SerializationError, ValidationError};
pub use message::{
    Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceivedMessage,
};
pub use provider::{AwsSqsConfig, InMemoryConfig, ProviderConfig, ProviderType};
pub use providers::{AwsError, AwsSqsProvider, InMemoryProvider};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
