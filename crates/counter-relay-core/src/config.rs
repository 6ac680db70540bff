//! Relay configuration.
//!
//! Every field carries a serde default, so an empty document yields a working
//! configuration pointed at the local SQS endpoint. Loading (files, env vars)
//! is the binary's job; this module defines the shape and its validation.

use crate::bootstrap::{QueuePair, DEFAULT_FIRST_QUEUE, DEFAULT_SECOND_QUEUE};
use crate::counter::CounterValue;
use crate::error::ConfigError;
use crate::relay::{AckOrder, MalformedPolicy, RelaySettings};
use crate::retry::RetryPolicy;
use queue_runtime::{ProviderConfig, QueueName};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Largest batch SQS returns from one receive
pub const MAX_BATCH_SIZE: u32 = 10;

/// Longest long-poll wait SQS accepts
pub const MAX_RECEIVE_WAIT_SECONDS: u64 = 20;

/// Top-level configuration for the relay and bootstrap commands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub backend: ProviderConfig,
    pub retry: RetryConfig,
    pub relay: RelayLoopConfig,
    pub bootstrap: BootstrapConfig,
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Check every section, reporting the first invalid field
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.relay.validate()?;
        self.bootstrap.validate()?;
        Ok(())
    }

    /// Relay loop settings derived from the `relay` and `retry` sections
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            max_messages: self.relay.max_messages,
            receive_wait: Duration::from_secs(self.relay.receive_wait_seconds),
            operation_retry: self.retry.operation_policy(),
            ack_order: self.relay.ack_order,
            malformed_policy: self.relay.malformed_policy,
        }
    }
}

/// Fixed retry intervals, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Between attempts to reach the backend at startup
    pub connect_interval_ms: u64,

    /// Between lookup-or-create rounds while resolving a queue
    pub resolve_interval_ms: u64,

    /// Between attempts of receive, send and delete
    pub operation_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            connect_interval_ms: 1000,
            resolve_interval_ms: 1000,
            operation_interval_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn connect_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(self.connect_interval_ms)
    }

    pub fn resolve_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(self.resolve_interval_ms)
    }

    pub fn operation_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(self.operation_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("retry.connect_interval_ms", self.connect_interval_ms),
            ("retry.resolve_interval_ms", self.resolve_interval_ms),
            ("retry.operation_interval_ms", self.operation_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayLoopConfig {
    pub max_messages: u32,
    pub receive_wait_seconds: u64,
    pub ack_order: AckOrder,
    pub malformed_policy: MalformedPolicy,
}

impl Default for RelayLoopConfig {
    fn default() -> Self {
        Self {
            max_messages: MAX_BATCH_SIZE,
            receive_wait_seconds: 1,
            ack_order: AckOrder::default(),
            malformed_policy: MalformedPolicy::default(),
        }
    }
}

impl RelayLoopConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.max_messages) {
            return Err(ConfigError::InvalidValue {
                field: "relay.max_messages".to_string(),
                message: format!("must be between 1 and {}", MAX_BATCH_SIZE),
            });
        }
        if self.receive_wait_seconds > MAX_RECEIVE_WAIT_SECONDS {
            return Err(ConfigError::InvalidValue {
                field: "relay.receive_wait_seconds".to_string(),
                message: format!("must be at most {}", MAX_RECEIVE_WAIT_SECONDS),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub first_queue: String,
    pub second_queue: String,
    pub seed_value: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            first_queue: DEFAULT_FIRST_QUEUE.to_string(),
            second_queue: DEFAULT_SECOND_QUEUE.to_string(),
            seed_value: "1".to_string(),
        }
    }
}

impl BootstrapConfig {
    pub fn topology(&self) -> Result<QueuePair, ConfigError> {
        Ok(QueuePair::new(
            parse_queue_name("bootstrap.first_queue", &self.first_queue)?,
            parse_queue_name("bootstrap.second_queue", &self.second_queue)?,
        ))
    }

    pub fn seed(&self) -> Result<CounterValue, ConfigError> {
        self.seed_value
            .parse::<CounterValue>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "bootstrap.seed_value".to_string(),
                message: e.to_string(),
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let topology = self.topology()?;
        if topology.first == topology.second {
            return Err(ConfigError::InvalidValue {
                field: "bootstrap.second_queue".to_string(),
                message: "must differ from bootstrap.first_queue".to_string(),
            });
        }
        self.seed()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Validate a queue name, naming the config field on failure
pub fn parse_queue_name(field: &str, name: &str) -> Result<QueueName, ConfigError> {
    QueueName::new(name.to_string()).map_err(|source| ConfigError::InvalidQueueName {
        field: field.to_string(),
        source,
    })
}
