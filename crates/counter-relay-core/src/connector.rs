//! Backend connector.
//!
//! Establishes a handle to the queue backend, waiting for as long as it takes
//! for the backend to come up.

use crate::retry::{retry_forever, RetryPolicy};
use async_trait::async_trait;
use queue_runtime::{
    InMemoryProvider, ProviderConfig, ProviderType, QueueClientFactory, QueueError, QueueProvider,
};
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[cfg(test)]
#[path = "connector_tests.rs"]
mod tests;

/// Live connection to a queue backend
///
/// Cheap to clone; clones share the underlying provider.
#[derive(Clone)]
pub struct BackendHandle {
    provider: Arc<dyn QueueProvider>,
}

impl BackendHandle {
    pub fn new(provider: Arc<dyn QueueProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &dyn QueueProvider {
        self.provider.as_ref()
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider.provider_type()
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("provider", &self.provider.provider_type())
            .finish()
    }
}

/// A single attempt at reaching the backend
#[async_trait]
pub trait Connect: Send + Sync {
    async fn try_connect(&self) -> Result<BackendHandle, QueueError>;
}

#[async_trait]
impl Connect for ProviderConfig {
    async fn try_connect(&self) -> Result<BackendHandle, QueueError> {
        QueueClientFactory::connect(self)
            .await
            .map(BackendHandle::new)
    }
}

/// Connecting to an in-memory provider shares its storage with the caller
#[async_trait]
impl Connect for InMemoryProvider {
    async fn try_connect(&self) -> Result<BackendHandle, QueueError> {
        self.health_check().await?;
        Ok(BackendHandle::new(Arc::new(self.clone())))
    }
}

/// Connect to the backend, retrying at a fixed interval until it answers
///
/// Never fails: an unreachable backend produces one `warn` per attempt for as
/// long as it stays down.
pub async fn connect<C>(connector: &C, policy: &RetryPolicy) -> BackendHandle
where
    C: Connect + ?Sized,
{
    let handle = retry_forever(policy, "connect", |_| connector.try_connect()).await;
    info!(provider = %handle.provider_type(), "Connected to queue backend");
    handle
}
