//! Queue names, message payloads and receipts.

use crate::error::{SerializationError, ValidationError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest queue name SQS accepts.
pub const MAX_QUEUE_NAME_LENGTH: usize = 80;

/// A queue name both backends accept: 1 to 80 ASCII letters, digits, `-` or `_`
///
/// FIFO names (`.fifo` suffix) are rejected along with every other `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: String) -> Result<Self, ValidationError> {
        const FIELD: &str = "queue name";

        if name.is_empty() {
            return Err(ValidationError::Empty { field: FIELD });
        }
        if name.len() > MAX_QUEUE_NAME_LENGTH {
            return Err(ValidationError::TooLong {
                field: FIELD,
                max: MAX_QUEUE_NAME_LENGTH,
            });
        }
        if let Some(character) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(ValidationError::InvalidCharacter {
                field: FIELD,
                character,
            });
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(value: QueueName) -> Self {
        value.0
    }
}

/// Address a backend hands out for a resolved queue
///
/// SQS returns a full URL. The in-memory backend reuses the queue name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueUrl(String);

impl QueueUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend-assigned message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Fresh random identifier, for backends that do not assign their own
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "message id" });
        }
        Ok(Self(s.to_string()))
    }
}

/// Outgoing message
#[derive(Debug, Clone)]
pub struct Message {
    pub body: Bytes,
}

impl Message {
    pub fn new(body: Bytes) -> Self {
        Self { body }
    }

    /// Message whose body is `text` verbatim
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(Bytes::from(text.into()))
    }
}

/// A message taken off a queue and hidden from other consumers until it is
/// deleted or its receipt lapses
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub body: Bytes,
    pub receipt_handle: ReceiptHandle,
    /// How many times this message has been handed out, starting at 1
    pub delivery_count: u32,
}

impl ReceivedMessage {
    pub fn body_text(&self) -> Result<&str, SerializationError> {
        std::str::from_utf8(&self.body).map_err(|_| SerializationError::InvalidUtf8)
    }

    /// True when an earlier delivery was never acknowledged
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// Token that deletes one specific delivery of a message
///
/// It stops working once the queue's visibility timeout lapses, at which
/// point the backend answers [`QueueError::ReceiptNotFound`].
///
/// [`QueueError::ReceiptNotFound`]: crate::QueueError::ReceiptNotFound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn handle(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
