//! Tests for the backend connector.

use super::*;
use queue_runtime::InMemoryConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Connector that fails a fixed number of times before succeeding
struct FlakyConnector {
    failures: u32,
    attempts: AtomicU32,
    backend: InMemoryProvider,
}

impl FlakyConnector {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            attempts: AtomicU32::new(0),
            backend: InMemoryProvider::default(),
        }
    }
}

#[async_trait]
impl Connect for FlakyConnector {
    async fn try_connect(&self) -> Result<BackendHandle, QueueError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Err(QueueError::BackendUnavailable {
                message: format!("refused on attempt {}", attempt),
            })
        } else {
            self.backend.try_connect().await
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_returns_on_attempt_after_failures() {
    for failures in [0u32, 1, 5] {
        let connector = FlakyConnector::new(failures);
        let started = Instant::now();

        let handle = connect(&connector, &RetryPolicy::default()).await;

        assert_eq!(connector.attempts.load(Ordering::SeqCst), failures + 1);
        assert_eq!(started.elapsed(), Duration::from_secs(failures as u64));
        assert_eq!(handle.provider_type(), ProviderType::InMemory);
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_waits_for_backend_to_come_up() {
    let backend = InMemoryProvider::default();
    backend.set_available(false);

    let switch = backend.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        switch.set_available(true);
    });

    let started = Instant::now();
    let handle = connect(&backend, &RetryPolicy::default()).await;

    // Attempts at 0s..3s fail, the one at 4s succeeds
    assert_eq!(started.elapsed(), Duration::from_secs(4));
    assert!(handle.provider().health_check().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_connect_ignores_attempt_cap() {
    let connector = FlakyConnector::new(3);
    let policy = RetryPolicy::default().with_max_attempts(1);

    connect(&connector, &policy).await;
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_provider_config_connects_in_memory() {
    let config = ProviderConfig::InMemory(InMemoryConfig::default());
    let handle = config.try_connect().await.unwrap();
    assert_eq!(handle.provider_type(), ProviderType::InMemory);
    assert_eq!(format!("{:?}", handle), "BackendHandle { provider: InMemory }");
}

#[tokio::test]
async fn test_in_memory_connection_shares_storage() {
    let backend = InMemoryProvider::default();
    let handle = backend.try_connect().await.unwrap();

    let name = queue_runtime::QueueName::new("shared".to_string()).unwrap();
    handle.provider().create_queue(&name).await.unwrap();
    assert_eq!(backend.queue_count(), 1);
}
