//! Non-destructive, cursor-based message browsing
//!
//! Peeks never lock, receive or settle a message, so delivery counts and
//! dead-letter counts stay untouched. Pages are resumed from the last
//! sequence number seen: the next page starts strictly after it.

use crate::broker::MessageHandle;
use crate::catalog::EntityTarget;
use crate::connection::ConnectionRegistry;
use crate::error::ConsoleResult;
use std::sync::Arc;
use tracing::debug;

/// Peek parameters for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeekRequest {
    pub target: EntityTarget,
    pub max_count: u32,
    /// Resume strictly after this sequence number
    pub from_sequence_number: Option<i64>,
}

impl PeekRequest {
    pub fn new(target: EntityTarget, max_count: u32) -> Self {
        Self {
            target,
            max_count,
            from_sequence_number: None,
        }
    }

    pub fn after(mut self, sequence_number: Option<i64>) -> Self {
        self.from_sequence_number = sequence_number;
        self
    }
}

pub struct MessageBrowser {
    registry: Arc<ConnectionRegistry>,
}

impl MessageBrowser {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Returns up to `max_count` messages ascending by sequence number.
    /// An empty sub-queue yields an empty vector.
    pub async fn peek(&self, request: &PeekRequest) -> ConsoleResult<Vec<MessageHandle>> {
        if request.max_count == 0 {
            return Ok(Vec::new());
        }
        let sub_queue = request.target.sub_queue();
        // the broker's cursor is inclusive
        let start = match request.from_sequence_number {
            Some(i64::MAX) => return Ok(Vec::new()),
            Some(last_seen) => Some(last_seen + 1),
            None => None,
        };

        let client = self.registry.client(&request.target.connection).await?;
        let mut messages = client.peek(&sub_queue, request.max_count, start).await?;

        messages.sort_by_key(|m| m.sequence_number);
        if let Some(last_seen) = request.from_sequence_number {
            messages.retain(|m| m.sequence_number > last_seen);
        }
        messages.truncate(request.max_count as usize);

        debug!(
            "Peeked {} messages from {} on {}",
            messages.len(),
            sub_queue,
            request.target.connection
        );
        Ok(messages)
    }
}

/// Tracks the position of a paged listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeekCursor {
    last_sequence_number: Option<i64>,
    exhausted: bool,
}

impl PeekCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next page must start after
    pub fn position(&self) -> Option<i64> {
        self.last_sequence_number
    }

    /// True once a page came back shorter than requested
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Records a fetched page
    pub fn advance(&mut self, page: &[MessageHandle], page_size: u32) {
        if let Some(last) = page.iter().map(|m| m.sequence_number).max() {
            self.last_sequence_number = Some(last);
        }
        self.exhausted = page.len() < page_size as usize;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
