//! Provisioning of a relay topology: create both queues of a pair and seed
//! the first one so the counter has somewhere to start.

use crate::connector::BackendHandle;
use crate::counter::CounterValue;
use crate::resolver::{QueueRef, QueueResolver};
use crate::retry::RetryPolicy;
use queue_runtime::{QueueName, ValidationError};
use tracing::info;

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;

pub const DEFAULT_FIRST_QUEUE: &str = "A";
pub const DEFAULT_SECOND_QUEUE: &str = "B";

/// The two queues a pair of relays pass the counter between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePair {
    /// Receives the seed
    pub first: QueueName,
    pub second: QueueName,
}

impl QueuePair {
    pub fn new(first: QueueName, second: QueueName) -> Self {
        Self { first, second }
    }

    /// Build a pair from unvalidated names
    pub fn from_names(first: &str, second: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            first: QueueName::new(first.to_string())?,
            second: QueueName::new(second.to_string())?,
        })
    }

    /// Payload to place on `queue` if it has to be created
    ///
    /// Only the first queue of the pair carries the counter.
    pub fn seed_for<'a>(&self, queue: &QueueName, seed: &'a CounterValue) -> Option<&'a str> {
        (*queue == self.first).then(|| seed.as_str())
    }
}

/// References to a provisioned pair
#[derive(Debug, Clone)]
pub struct ProvisionedPair {
    pub first: QueueRef,
    pub second: QueueRef,
    /// Whether the seed was sent by this run
    pub seeded: bool,
}

/// Create both queues of `topology` and seed the first with `seed`
///
/// The seed is only sent when this run created the first queue, so running
/// the bootstrap against an already provisioned backend adds no messages.
pub async fn bootstrap(
    handle: &BackendHandle,
    topology: &QueuePair,
    seed: &CounterValue,
    policy: &RetryPolicy,
) -> ProvisionedPair {
    let resolver = QueueResolver::new(handle.clone(), policy.clone());

    let first = resolver.provision(&topology.first).await;
    let second = resolver.provision(&topology.second).await;

    if first.created {
        resolver.seed(&first.queue, seed.as_str()).await;
    } else {
        info!(queue = %topology.first, "Queue already existed, not seeding");
    }

    info!(
        first = %topology.first,
        second = %topology.second,
        "Queue pair provisioned"
    );

    ProvisionedPair {
        first: first.queue,
        second: second.queue,
        seeded: first.created,
    }
}

/// Resolve the input and output queues of one relay
///
/// Whichever process creates the first queue of `topology` seeds it, be it
/// the bootstrap, the relay reading from it or the relay writing to it. The
/// counter is therefore put in circulation exactly once whatever order the
/// processes start in.
pub async fn resolve_relay_queues(
    handle: &BackendHandle,
    topology: &QueuePair,
    input: &QueueName,
    output: &QueueName,
    seed: &CounterValue,
    policy: &RetryPolicy,
) -> (QueueRef, QueueRef) {
    let resolver = QueueResolver::new(handle.clone(), policy.clone());

    let input = resolver.resolve(input, topology.seed_for(input, seed)).await;
    let output = resolver.resolve(output, topology.seed_for(output, seed)).await;

    (input, output)
}
