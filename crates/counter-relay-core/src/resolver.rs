//! Queue resolution: look a queue up by name, creating it when absent.

use crate::connector::BackendHandle;
use crate::retry::{retry_forever, RetryPolicy};
use queue_runtime::{
    Message, MessageId, QueueError, QueueName, QueueUrl, ReceiptHandle, ReceivedMessage,
};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

/// A resolved queue bound to the backend it was resolved from
#[derive(Clone)]
pub struct QueueRef {
    name: QueueName,
    url: QueueUrl,
    backend: BackendHandle,
}

impl QueueRef {
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    pub fn url(&self) -> &QueueUrl {
        &self.url
    }

    /// Receive up to `max_messages`, long-polling for at most `wait`
    pub async fn receive(
        &self,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let wait = chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::zero());
        self.backend
            .provider()
            .receive_messages(&self.url, max_messages, wait)
            .await
    }

    pub async fn send(&self, body: &str) -> Result<MessageId, QueueError> {
        self.backend
            .provider()
            .send_message(&self.url, &Message::from_text(body))
            .await
    }

    pub async fn delete(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.backend
            .provider()
            .delete_message(&self.url, receipt)
            .await
    }
}

impl fmt::Debug for QueueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueRef")
            .field("name", &self.name)
            .field("url", &self.url)
            .finish()
    }
}

impl fmt::Display for QueueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A queue reference plus whether this resolution created it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub queue: QueueRef,
    pub created: bool,
}

/// Obtains queue references, creating queues that do not exist yet
pub struct QueueResolver {
    backend: BackendHandle,
    policy: RetryPolicy,
}

impl QueueResolver {
    pub fn new(backend: BackendHandle, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Resolve `name`, sending `seed` into the queue if this call created it
    ///
    /// Never fails. Lookup and creation are retried at the policy interval
    /// until one of them succeeds, and the seed send is retried in place so a
    /// freshly created queue is never left without its seed.
    pub async fn resolve(&self, name: &QueueName, seed: Option<&str>) -> QueueRef {
        let resolution = self.provision(name).await;
        if resolution.created {
            if let Some(seed) = seed {
                self.seed(&resolution.queue, seed).await;
            }
        }
        resolution.queue
    }

    /// Look `name` up, or create it when the lookup fails for any reason
    ///
    /// Creation is idempotent on every backend, so a lookup that failed
    /// transiently for a queue that does exist still resolves to that queue.
    pub async fn provision(&self, name: &QueueName) -> Resolution {
        let (url, created) = retry_forever(&self.policy, "resolve_queue", |_| {
            self.lookup_or_create(name)
        })
        .await;

        Resolution {
            queue: QueueRef {
                name: name.clone(),
                url,
                backend: self.backend.clone(),
            },
            created,
        }
    }

    /// Send `body` into `queue`, retrying until the backend accepts it
    pub async fn seed(&self, queue: &QueueRef, body: &str) {
        let message_id = retry_forever(&self.policy, "seed_queue", |_| queue.send(body)).await;
        info!(queue = %queue.name(), seed = body, message_id = %message_id, "Seeded queue");
    }

    async fn lookup_or_create(&self, name: &QueueName) -> Result<(QueueUrl, bool), QueueError> {
        let provider = self.backend.provider();
        match provider.get_queue_url(name).await {
            Ok(url) => {
                debug!(queue = %name, url = %url, "Found existing queue");
                Ok((url, false))
            }
            Err(lookup_error) => {
                debug!(queue = %name, error = %lookup_error, "Queue lookup failed, creating queue");
                match provider.create_queue(name).await {
                    Ok(url) => {
                        info!(queue = %name, url = %url, "Created queue");
                        Ok((url, true))
                    }
                    Err(create_error) => {
                        warn!(
                            queue = %name,
                            lookup_error = %lookup_error,
                            "Queue lookup and creation both failed"
                        );
                        Err(create_error)
                    }
                }
            }
        }
    }
}
