//! Provider trait and factory for queue operations.

use crate::error::QueueError;
use crate::message::{Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceivedMessage};
use crate::provider::{ProviderConfig, ProviderType};
use crate::providers::{AwsSqsProvider, InMemoryProvider};
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Interface implemented by specific queue providers (AWS SQS, in-memory)
///
/// Every operation may fail with a transient error when the backend is
/// unreachable; callers decide whether to retry via [`QueueError::is_transient`].
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Probe the backend for reachability
    async fn health_check(&self) -> Result<(), QueueError>;

    /// Look up an existing queue by name
    ///
    /// Fails with [`QueueError::QueueNotFound`] when the queue does not exist.
    async fn get_queue_url(&self, queue: &QueueName) -> Result<QueueUrl, QueueError>;

    /// Create a queue, returning the existing one if the name is taken
    async fn create_queue(&self, queue: &QueueName) -> Result<QueueUrl, QueueError>;

    /// Send single message
    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: &Message,
    ) -> Result<MessageId, QueueError>;

    /// Receive up to `max_messages`, waiting at most `wait` for the first one
    ///
    /// An empty result is a normal outcome.
    async fn receive_messages(
        &self,
        queue: &QueueUrl,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Remove a received message from its queue
    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Get maximum batch size
    fn max_batch_size(&self) -> u32 {
        self.provider_type().max_batch_size()
    }
}

/// Factory for creating providers from configuration
pub struct QueueClientFactory;

impl QueueClientFactory {
    /// Build a provider without contacting the backend
    pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn QueueProvider>, QueueError> {
        let provider: Arc<dyn QueueProvider> = match config {
            ProviderConfig::AwsSqs(aws_config) => Arc::new(
                AwsSqsProvider::new(aws_config.clone()).map_err(QueueError::from)?,
            ),
            ProviderConfig::InMemory(in_memory_config) => {
                Arc::new(InMemoryProvider::new(in_memory_config.clone()))
            }
        };

        Ok(provider)
    }

    /// Build a provider and confirm the backend is reachable
    pub async fn connect(config: &ProviderConfig) -> Result<Arc<dyn QueueProvider>, QueueError> {
        let provider = Self::create_provider(config)?;
        provider.health_check().await?;
        Ok(provider)
    }
}
