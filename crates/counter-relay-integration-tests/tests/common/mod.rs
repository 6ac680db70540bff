//! Common test utilities for counter relay integration tests
//!
//! This module provides:
//! - A bootstrapped pair of relays wired A -> B and B -> A over one backend
//! - Helpers for collecting relay events with a deadline

use counter_relay_core::{
    bootstrap, connect, CounterValue, QueuePair, Relay, RelayError, RelayEvent, RelaySettings,
    RetryPolicy,
};
use queue_runtime::{InMemoryProvider, QueueName};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Two relays bouncing a counter between queues A and B
#[allow(dead_code)]
pub struct RelayLoop {
    pub backend: InMemoryProvider,
    pub events: mpsc::UnboundedReceiver<RelayEvent>,
    tasks: Vec<JoinHandle<Result<(), RelayError>>>,
}

#[allow(dead_code)]
impl RelayLoop {
    /// Bootstrap A and B on `backend`, then start X (A -> B) and Y (B -> A)
    pub async fn start(backend: InMemoryProvider, settings: RelaySettings) -> Self {
        let policy = RetryPolicy::default();
        let handle = connect(&backend, &policy).await;
        let pair = QueuePair::from_names("A", "B").unwrap();

        let provisioned = bootstrap(&handle, &pair, &CounterValue::from(1), &policy).await;
        let (tx, events) = mpsc::unbounded_channel();

        let x = Relay::new(
            provisioned.first.clone(),
            provisioned.second.clone(),
            settings.clone(),
        )
        .with_observer(tx.clone());
        let y = Relay::new(provisioned.second, provisioned.first, settings).with_observer(tx);

        let tasks = vec![
            tokio::spawn(async move { x.run().await }),
            tokio::spawn(async move { y.run().await }),
        ];

        Self {
            backend,
            events,
            tasks,
        }
    }

    /// Wait for the next `count` forwarded values, as (output queue, value)
    pub async fn next_forwarded(&mut self, count: usize) -> Vec<(String, CounterValue)> {
        collect_forwarded(&mut self.events, count).await
    }
}

impl Drop for RelayLoop {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Collect `count` forwarded events, failing the test after a generous deadline
#[allow(dead_code)]
pub async fn collect_forwarded(
    events: &mut mpsc::UnboundedReceiver<RelayEvent>,
    count: usize,
) -> Vec<(String, CounterValue)> {
    let mut forwarded = Vec::with_capacity(count);
    while forwarded.len() < count {
        let event = tokio::time::timeout(Duration::from_secs(300), events.recv())
            .await
            .expect("timed out waiting for relay events")
            .expect("relays stopped");
        if let RelayEvent::Forwarded { output, value, .. } = event {
            forwarded.push((output.to_string(), value));
        }
    }
    forwarded
}

#[allow(dead_code)]
pub fn queue_name(name: &str) -> QueueName {
    QueueName::new(name.to_string()).unwrap()
}
