//! # Relay Loop
//!
//! Polls an input queue, increments each counter value by one, forwards the
//! result to an output queue and acknowledges the original message.
//!
//! Messages within a batch are handled strictly one after the other. Backend
//! failures on send and delete are retried in place, so an outage in the
//! middle of a message never skips a step. A failed receive is polled again
//! after the operation interval.

use crate::counter::CounterValue;
use crate::error::RelayError;
use crate::resolver::QueueRef;
use crate::retry::{retry_forever, retry_if, RetryPolicy};
use queue_runtime::{QueueError, QueueName, ReceivedMessage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;

/// Order in which a message is forwarded and acknowledged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckOrder {
    /// Send the incremented value, then delete the input message.
    /// A crash in between duplicates the increment.
    #[default]
    ForwardThenDelete,

    /// Delete the input message, then send the incremented value.
    /// A crash in between loses the increment.
    DeleteThenForward,
}

/// What to do with a message whose body is not a counter value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Log the payload, delete it and carry on
    #[default]
    Skip,

    /// Stop the relay, leaving the message on the input queue
    Terminate,
}

/// Tuning for a relay instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Largest batch requested per poll
    pub max_messages: u32,

    /// Backend-side long-poll wait; zero short-polls
    pub receive_wait: Duration,

    /// Spacing of retries for receive, send and delete
    pub operation_retry: RetryPolicy,

    pub ack_order: AckOrder,
    pub malformed_policy: MalformedPolicy,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_messages: 10,
            receive_wait: Duration::from_secs(1),
            operation_retry: RetryPolicy::default(),
            ack_order: AckOrder::default(),
            malformed_policy: MalformedPolicy::default(),
        }
    }
}

/// Notification emitted for every message the relay finishes with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Forwarded {
        input: QueueName,
        output: QueueName,
        value: CounterValue,
    },
    Rejected {
        input: QueueName,
        body: String,
    },
}

/// What a single poll achieved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Values sent to the output queue, in order
    pub forwarded: Vec<CounterValue>,

    /// Malformed messages dropped under [`MalformedPolicy::Skip`]
    pub rejected: usize,
}

impl PollOutcome {
    pub fn is_empty(&self) -> bool {
        self.forwarded.is_empty() && self.rejected == 0
    }
}

/// Moves counter values from one queue to another, adding one on the way
pub struct Relay {
    input: QueueRef,
    output: QueueRef,
    settings: RelaySettings,
    observer: Option<mpsc::UnboundedSender<RelayEvent>>,
}

impl Relay {
    pub fn new(input: QueueRef, output: QueueRef, settings: RelaySettings) -> Self {
        Self {
            input,
            output,
            settings,
            observer: None,
        }
    }

    /// Report every finished message to `observer`
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<RelayEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Relay until a malformed payload arrives under [`MalformedPolicy::Terminate`]
    ///
    /// Backend errors never end the loop, whether transient or not. A deleted
    /// queue or revoked credentials are logged and retried until an operator
    /// fixes them.
    pub async fn run(&self) -> Result<(), RelayError> {
        info!(
            input = %self.input,
            output = %self.output,
            ack_order = ?self.settings.ack_order,
            "Relay started"
        );

        loop {
            let outcome = self.poll_once().await?;
            if outcome.is_empty() {
                // No sleep in steady state; let other tasks run between polls
                tokio::task::yield_now().await;
            }
        }
    }

    /// Receive one batch and relay every message in it
    pub async fn poll_once(&self) -> Result<PollOutcome, RelayError> {
        let mut outcome = PollOutcome::default();

        let messages = match self
            .input
            .receive(self.settings.max_messages, self.settings.receive_wait)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                let retry_in_ms = self.settings.operation_retry.interval.as_millis() as u64;
                if e.is_transient() {
                    warn!(queue = %self.input, error = %e, retry_in_ms, "Receive failed, polling again");
                } else {
                    error!(queue = %self.input, error = %e, retry_in_ms, "Receive failed, polling again");
                }
                tokio::time::sleep(self.settings.operation_retry.interval).await;
                return Ok(outcome);
            }
        };

        if !messages.is_empty() {
            debug!(queue = %self.input, count = messages.len(), "Received messages");
        }

        for message in &messages {
            self.handle(message, &mut outcome).await?;
        }

        Ok(outcome)
    }

    async fn handle(
        &self,
        message: &ReceivedMessage,
        outcome: &mut PollOutcome,
    ) -> Result<(), RelayError> {
        let value = match self.parse(message) {
            Ok(value) => value,
            Err(e) => return self.reject(message, e, outcome).await,
        };

        if message.is_redelivery() {
            warn!(
                queue = %self.input,
                message_id = %message.message_id,
                delivery_count = message.delivery_count,
                "Counter value redelivered after an unacknowledged attempt"
            );
        }

        let next = value.increment();
        match self.settings.ack_order {
            AckOrder::ForwardThenDelete => {
                self.forward(&next).await;
                self.acknowledge(message).await;
            }
            AckOrder::DeleteThenForward => {
                self.acknowledge(message).await;
                self.forward(&next).await;
            }
        }

        info!(
            input = %self.input,
            output = %self.output,
            received = %value,
            forwarded = %next,
            "Relayed counter value"
        );
        self.notify(RelayEvent::Forwarded {
            input: self.input.name().clone(),
            output: self.output.name().clone(),
            value: next.clone(),
        });
        outcome.forwarded.push(next);

        Ok(())
    }

    fn parse(&self, message: &ReceivedMessage) -> Result<CounterValue, RelayError> {
        message
            .body_text()
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| RelayError::MalformedPayload {
                queue: self.input.name().to_string(),
                body: String::from_utf8_lossy(&message.body).into_owned(),
            })
    }

    async fn reject(
        &self,
        message: &ReceivedMessage,
        error: RelayError,
        outcome: &mut PollOutcome,
    ) -> Result<(), RelayError> {
        match self.settings.malformed_policy {
            MalformedPolicy::Terminate => {
                error!(queue = %self.input, error = %error, "Malformed payload, stopping relay");
                Err(error)
            }
            MalformedPolicy::Skip => {
                error!(
                    queue = %self.input,
                    message_id = %message.message_id,
                    error = %error,
                    "Malformed payload, dropping message"
                );
                self.acknowledge(message).await;
                outcome.rejected += 1;
                self.notify(RelayEvent::Rejected {
                    input: self.input.name().clone(),
                    body: String::from_utf8_lossy(&message.body).into_owned(),
                });
                Ok(())
            }
        }
    }

    async fn forward(&self, value: &CounterValue) {
        let body = value.as_str();
        retry_forever(&self.settings.operation_retry, "send_message", |_| {
            self.output.send(body)
        })
        .await;
    }

    async fn acknowledge(&self, message: &ReceivedMessage) {
        // Every failure but a lapsed receipt is retried without limit
        let policy = RetryPolicy::new(self.settings.operation_retry.interval);
        let result = retry_if(
            &policy,
            "delete_message",
            |e| !matches!(e, QueueError::ReceiptNotFound { .. }),
            |_| self.input.delete(&message.receipt_handle),
        )
        .await;

        if let Err(e) = result {
            // The backend will deliver the message again
            warn!(
                queue = %self.input,
                message_id = %message.message_id,
                error = %e.into_inner(),
                "Receipt no longer valid, message will be redelivered"
            );
        }
    }

    fn notify(&self, event: RelayEvent) {
        if let Some(observer) = &self.observer {
            // A dropped receiver only means nobody is listening any more
            let _ = observer.send(event);
        }
    }
}
