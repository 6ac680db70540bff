//! In-memory queue provider implementation for testing and development.
//!
//! This module provides a fully functional in-memory queue implementation that:
//! - Looks up and idempotently creates named queues
//! - Implements visibility timeouts and redelivery of unacknowledged messages
//! - Supports long polling on empty queues
//! - Can simulate backend outages so retry paths can be exercised
//!
//! Clones share the same storage, so several consumers in one process observe
//! the same set of queues.

use crate::client::QueueProvider;
use crate::error::{QueueError, QUEUE_FULL_CODE};
use crate::message::{
    Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceivedMessage,
};
use crate::provider::{InMemoryConfig, ProviderType};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for all queues
struct QueueStorage {
    queues: HashMap<QueueName, InMemoryQueue>,
    config: InMemoryConfig,
}

impl QueueStorage {
    fn new(config: InMemoryConfig) -> Self {
        Self {
            queues: HashMap::new(),
            config,
        }
    }

    fn queue_mut(&mut self, url: &QueueUrl) -> Result<&mut InMemoryQueue, QueueError> {
        self.queues
            .iter_mut()
            .find(|(name, _)| name.as_str() == url.as_str())
            .map(|(_, queue)| queue)
            .ok_or_else(|| QueueError::QueueNotFound {
                queue: url.as_str().to_string(),
            })
    }
}

/// Internal queue state for a single queue
struct InMemoryQueue {
    /// Main message queue (FIFO order)
    messages: VecDeque<StoredMessage>,
    /// In-flight messages keyed by receipt handle
    in_flight: HashMap<String, InFlightMessage>,
    /// Wakes long-polling receivers when a message arrives
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            in_flight: HashMap::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    fn len(&self) -> usize {
        self.messages.len() + self.in_flight.len()
    }

    /// Return in-flight messages whose visibility timeout lapsed to the head of
    /// the queue, oldest first.
    fn release_expired(&mut self) {
        let now = Instant::now();
        let mut expired: Vec<StoredMessage> = Vec::new();
        self.in_flight.retain(|_, in_flight| {
            if in_flight.visible_again_at <= now {
                expired.push(in_flight.message.clone());
                false
            } else {
                true
            }
        });

        expired.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        for message in expired {
            self.messages.push_front(message);
        }
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    sequence: u64,
    delivery_count: u32,
}

/// A message currently being processed
struct InFlightMessage {
    message: StoredMessage,
    visible_again_at: Instant,
}

/// Failure injection switches shared by all clones
#[derive(Default)]
struct FaultState {
    unavailable: AtomicBool,
    fail_next: AtomicU32,
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue provider implementation
#[derive(Clone)]
pub struct InMemoryProvider {
    storage: Arc<RwLock<QueueStorage>>,
    faults: Arc<FaultState>,
    sequence: Arc<std::sync::atomic::AtomicU64>,
}

impl InMemoryProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(QueueStorage::new(config))),
            faults: Arc::new(FaultState::default()),
            sequence: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    /// Make every operation fail with a connection error until re-enabled
    pub fn set_available(&self, available: bool) {
        self.faults.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Fail the next `count` operations with a connection error
    pub fn fail_next(&self, count: u32) {
        self.faults.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of queues that exist
    pub fn queue_count(&self) -> usize {
        self.storage.read().map(|s| s.queues.len()).unwrap_or(0)
    }

    /// Number of visible messages waiting in a queue
    pub fn visible_count(&self, queue: &QueueName) -> Option<usize> {
        let storage = self.storage.read().ok()?;
        storage.queues.get(queue).map(|q| q.messages.len())
    }

    /// Number of messages received but not yet deleted
    pub fn in_flight_count(&self, queue: &QueueName) -> Option<usize> {
        let storage = self.storage.read().ok()?;
        storage.queues.get(queue).map(|q| q.in_flight.len())
    }

    fn check_available(&self) -> Result<(), QueueError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::BackendUnavailable {
                message: "in-memory backend is unavailable".to_string(),
            });
        }

        let injected = self
            .faults
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(QueueError::BackendUnavailable {
                message: "injected in-memory backend failure".to_string(),
            });
        }

        Ok(())
    }

    fn write_storage(&self) -> Result<std::sync::RwLockWriteGuard<'_, QueueStorage>, QueueError> {
        self.storage.write().map_err(|_| poisoned())
    }

    fn read_storage(&self) -> Result<std::sync::RwLockReadGuard<'_, QueueStorage>, QueueError> {
        self.storage.read().map_err(|_| poisoned())
    }

    /// Move up to `max_messages` visible messages into flight
    fn take_available(
        &self,
        queue: &QueueUrl,
        max_messages: u32,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let mut storage = self.write_storage()?;
        let visibility = std::time::Duration::from_secs(storage.config.visibility_timeout_seconds);
        let in_memory_queue = storage.queue_mut(queue)?;
        in_memory_queue.release_expired();

        let mut received = Vec::new();
        while received.len() < max_messages as usize {
            let Some(mut stored) = in_memory_queue.messages.pop_front() else {
                break;
            };
            stored.delivery_count += 1;

            let receipt = uuid::Uuid::new_v4().to_string();
            received.push(ReceivedMessage {
                message_id: stored.message_id.clone(),
                body: stored.body.clone(),
                receipt_handle: ReceiptHandle::new(receipt.clone()),
                delivery_count: stored.delivery_count,
            });

            in_memory_queue.in_flight.insert(
                receipt,
                InFlightMessage {
                    message: stored,
                    visible_again_at: Instant::now() + visibility,
                },
            );
        }

        Ok(received)
    }

    fn queue_notify(&self, queue: &QueueUrl) -> Result<Arc<Notify>, QueueError> {
        let mut storage = self.write_storage()?;
        Ok(storage.queue_mut(queue)?.notify.clone())
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

/// A panic while holding the lock leaves the storage unusable for good
fn poisoned() -> QueueError {
    QueueError::Configuration {
        message: "in-memory storage lock was poisoned".to_string(),
    }
}

#[async_trait]
impl QueueProvider for InMemoryProvider {
    async fn health_check(&self) -> Result<(), QueueError> {
        self.check_available()
    }

    async fn get_queue_url(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        self.check_available()?;
        let storage = self.read_storage()?;
        if storage.queues.contains_key(queue) {
            Ok(QueueUrl::new(queue.as_str()))
        } else {
            Err(QueueError::QueueNotFound {
                queue: queue.to_string(),
            })
        }
    }

    async fn create_queue(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        self.check_available()?;
        let mut storage = self.write_storage()?;
        if !storage.queues.contains_key(queue) {
            debug!(queue = %queue, "Creating in-memory queue");
            storage.queues.insert(queue.clone(), InMemoryQueue::new());
        }
        Ok(QueueUrl::new(queue.as_str()))
    }

    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: &Message,
    ) -> Result<MessageId, QueueError> {
        self.check_available()?;

        let max_size = ProviderType::InMemory.max_message_size();
        if message.body.len() > max_size {
            return Err(QueueError::MessageTooLarge {
                size: message.body.len(),
                max_size,
            });
        }

        let mut storage = self.write_storage()?;
        let max_queue_size = storage.config.max_queue_size;
        let in_memory_queue = storage.queue_mut(queue)?;
        if in_memory_queue.len() >= max_queue_size {
            return Err(QueueError::ProviderFailure {
                provider: ProviderType::InMemory.to_string(),
                code: QUEUE_FULL_CODE.to_string(),
                message: format!("queue {} holds {} messages", queue, max_queue_size),
            });
        }

        let message_id = MessageId::generate();
        in_memory_queue.messages.push_back(StoredMessage {
            message_id: message_id.clone(),
            body: message.body.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            delivery_count: 0,
        });
        in_memory_queue.notify.notify_waiters();

        Ok(message_id)
    }

    async fn receive_messages(
        &self,
        queue: &QueueUrl,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.check_available()?;

        let max_messages = max_messages.clamp(1, self.max_batch_size());
        let wait = wait.to_std().unwrap_or_default();
        let deadline = Instant::now() + wait;

        loop {
            // Register interest before looking so a concurrent send is not missed
            let notify = self.queue_notify(queue)?;
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let messages = self.take_available(queue, max_messages)?;
            if !messages.is_empty() || Instant::now() >= deadline {
                return Ok(messages);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.take_available(queue, max_messages);
            }
        }
    }

    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        self.check_available()?;
        let mut storage = self.write_storage()?;
        let in_memory_queue = storage.queue_mut(queue)?;
        match in_memory_queue.in_flight.remove(receipt.handle()) {
            Some(_) => Ok(()),
            None => Err(QueueError::ReceiptNotFound {
                receipt: receipt.handle().to_string(),
            }),
        }
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
