//! Resend and remove operations on peeked messages
//!
//! Batches run strictly sequentially in selection order. What happens after
//! a failed item is decided by a [`BatchPolicy`]; a message that was already
//! consumed elsewhere never counts as a failure when removing.

use crate::broker::{MessageHandle, OutgoingMessage};
use crate::catalog::EntityTarget;
use crate::connection::ConnectionRegistry;
use crate::error::{ConsoleError, ConsoleResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Behaviour of a batch after one of its items failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Stop at the first failure; remaining items are reported as skipped
    AbortOnError,
    /// Record the failure and carry on with the next item
    ContinueOnError,
}

/// Per-message result of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: Vec<i64>,
    /// Messages that were gone before they could be removed
    pub already_gone: Vec<i64>,
    pub failed: Vec<(i64, ConsoleError)>,
    pub skipped: Vec<i64>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// First hard failure, if any
    pub fn first_error(&self) -> Option<&ConsoleError> {
        self.failed.first().map(|(_, e)| e)
    }
}

pub struct MessageOperationExecutor {
    registry: Arc<ConnectionRegistry>,
}

impl MessageOperationExecutor {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends a copy of `message` (body and properties) to the target queue,
    /// or to the target's topic for subscriptions. The source message stays.
    pub async fn resend(&self, target: &EntityTarget, message: &MessageHandle) -> ConsoleResult<()> {
        let address = target.address();
        let destination = address.send_target();
        let client = self.registry.client(&target.connection).await?;
        client
            .send(destination, OutgoingMessage::from(message))
            .await?;
        debug!(
            "Resent message {} from {} to {}",
            message.sequence_number, address, destination
        );
        Ok(())
    }

    /// Deletes `message` from the target's main or dead-letter sub-queue.
    /// Fails with `MessageNotFound` if it was consumed in the meantime.
    pub async fn remove(&self, target: &EntityTarget, message: &MessageHandle) -> ConsoleResult<()> {
        let sub_queue = target.sub_queue();
        let client = self.registry.client(&target.connection).await?;
        client.complete(&sub_queue, message).await?;
        debug!("Removed message {} from {}", message.sequence_number, sub_queue);
        Ok(())
    }

    /// Sends a new message built from scratch
    pub async fn send(&self, target: &EntityTarget, message: OutgoingMessage) -> ConsoleResult<()> {
        let address = target.address();
        let client = self.registry.client(&target.connection).await?;
        client.send(address.send_target(), message).await?;
        Ok(())
    }

    pub async fn resend_batch(
        &self,
        target: &EntityTarget,
        messages: &[MessageHandle],
        policy: BatchPolicy,
    ) -> BatchOutcome {
        info!(
            "Resending {} messages from {}",
            messages.len(),
            target.display_name()
        );
        let mut outcome = BatchOutcome::default();
        for (index, message) in messages.iter().enumerate() {
            match self.resend(target, message).await {
                Ok(()) => outcome.succeeded.push(message.sequence_number),
                Err(e) => {
                    warn!("Resend of message {} failed: {}", message.sequence_number, e);
                    outcome.failed.push((message.sequence_number, e));
                    if policy == BatchPolicy::AbortOnError {
                        skip_rest(&mut outcome, &messages[index + 1..]);
                        break;
                    }
                }
            }
        }
        outcome
    }

    pub async fn remove_batch(
        &self,
        target: &EntityTarget,
        messages: &[MessageHandle],
        policy: BatchPolicy,
    ) -> BatchOutcome {
        info!(
            "Removing {} messages from {}",
            messages.len(),
            target.sub_queue()
        );
        let mut outcome = BatchOutcome::default();
        for (index, message) in messages.iter().enumerate() {
            match self.remove(target, message).await {
                Ok(()) => outcome.succeeded.push(message.sequence_number),
                Err(e) if e.is_expected() => {
                    debug!("Message {} already gone", message.sequence_number);
                    outcome.already_gone.push(message.sequence_number);
                }
                Err(e) => {
                    warn!("Removal of message {} failed: {}", message.sequence_number, e);
                    outcome.failed.push((message.sequence_number, e));
                    if policy == BatchPolicy::AbortOnError {
                        skip_rest(&mut outcome, &messages[index + 1..]);
                        break;
                    }
                }
            }
        }
        outcome
    }
}

fn skip_rest(outcome: &mut BatchOutcome, rest: &[MessageHandle]) {
    outcome
        .skipped
        .extend(rest.iter().map(|message| message.sequence_number));
}
