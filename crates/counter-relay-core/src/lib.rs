//! # Counter Relay Core
//!
//! A relay reads integer counters from one queue, adds one and forwards the
//! result to another. Two relays wired in opposite directions bounce the
//! counter between a pair of queues indefinitely.
//!
//! ## Module Organization
//!
//! - [`connector`] - Reaching a backend that may not be up yet
//! - [`resolver`] - Looking up or creating queues by name
//! - [`relay`] - The poll, increment, forward, acknowledge loop
//! - [`bootstrap`] - Provisioning and seeding a queue pair
//! - [`counter`] - Arbitrary-precision counter values
//! - [`retry`] - Fixed-interval retry
//! - [`config`] - Configuration shape and validation
//! - [`error`] - Error types

pub mod bootstrap;
pub mod config;
pub mod connector;
pub mod counter;
pub mod error;
pub mod relay;
pub mod resolver;
pub mod retry;

pub use bootstrap::{bootstrap, resolve_relay_queues, ProvisionedPair, QueuePair};
pub use config::{LogFormat, RelayConfig};
pub use connector::{connect, BackendHandle, Connect};
pub use counter::{CounterValue, InvalidCounterValue};
pub use error::{ConfigError, RelayError};
pub use relay::{AckOrder, MalformedPolicy, PollOutcome, Relay, RelayEvent, RelaySettings};
pub use resolver::{QueueRef, QueueResolver, Resolution};
pub use retry::{retry_forever, retry_with_fixed_delay, RetryError, RetryPolicy};
