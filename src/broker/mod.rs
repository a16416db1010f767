//! # Broker Integration Module
//!
//! Defines the seam between the console engine and the managed message broker.
//! The engine never speaks the broker's wire protocol itself; it talks to an
//! opaque client exposing a handful of primitives (peek, send, complete,
//! topology discovery and dead-letter counting).
//!
//! ## Module Architecture
//!
//! ```text
//! broker/
//! ├── credential.rs  - Connection string parsing and validation
//! ├── message.rs     - Peeked message handles and outgoing messages
//! └── memory.rs      - In-process broker used by tests and the demo binary
//! ```
//!
//! ## Client Lifetime
//!
//! A [`BrokerConnector`] turns a [`Credential`] into a live [`BrokerClient`].
//! Clients are shared behind `Arc` and must be safe for concurrent use; the
//! connection registry creates them lazily and closes them on removal.

pub mod credential;
pub mod memory;
pub mod message;

pub use credential::Credential;
pub use memory::{MemoryBroker, MemoryNamespace};
pub use message::{MessageHandle, OutgoingMessage};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Result alias for raw broker calls
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Failures reported by a broker client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Connectivity, auth and throttling failures folded together
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("message {sequence_number} not found in {entity}")]
    MessageNotFound { entity: String, sequence_number: i64 },
}

/// Addresses a queue or a topic subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityAddress {
    Queue(String),
    Subscription { topic: String, subscription: String },
}

impl EntityAddress {
    /// Builds the address used by peek and complete: `entity` is a queue
    /// unless a topic is given, in which case it names a subscription of it.
    pub fn new(entity: &str, topic: Option<&str>) -> Self {
        match topic {
            Some(topic) => EntityAddress::Subscription {
                topic: topic.to_string(),
                subscription: entity.to_string(),
            },
            None => EntityAddress::Queue(entity.to_string()),
        }
    }

    /// Name of the entity a new message has to be sent to
    pub fn send_target(&self) -> &str {
        match self {
            EntityAddress::Queue(name) => name,
            EntityAddress::Subscription { topic, .. } => topic,
        }
    }
}

impl fmt::Display for EntityAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntityAddress::Queue(name) => write!(f, "{}", name),
            EntityAddress::Subscription {
                topic,
                subscription,
            } => write!(f, "{}/{}", topic, subscription),
        }
    }
}

/// Selects the active or the dead-letter sub-queue of an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubQueue {
    pub address: EntityAddress,
    pub dead_letter: bool,
}

impl SubQueue {
    pub fn active(address: EntityAddress) -> Self {
        Self {
            address,
            dead_letter: false,
        }
    }

    pub fn dead_letter(address: EntityAddress) -> Self {
        Self {
            address,
            dead_letter: true,
        }
    }
}

impl fmt::Display for SubQueue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.dead_letter {
            write!(f, "{}/$DeadLetterQueue", self.address)
        } else {
            write!(f, "{}", self.address)
        }
    }
}

/// A topic together with its subscriptions, as returned by discovery
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicDescription {
    pub name: String,
    pub subscriptions: Vec<String>,
}

/// Entity topology of one namespace
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Topology {
    pub queues: Vec<String>,
    pub topics: Vec<TopicDescription>,
}

/// Primitives the engine needs from a broker SDK
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Non-destructive read of up to `max_count` messages, ascending by
    /// sequence number, starting at `from_sequence_number` (inclusive) or at
    /// the oldest available message.
    async fn peek(
        &self,
        sub_queue: &SubQueue,
        max_count: u32,
        from_sequence_number: Option<i64>,
    ) -> BrokerResult<Vec<MessageHandle>>;

    /// Publishes a new message to a queue or topic
    async fn send(&self, entity: &str, message: OutgoingMessage) -> BrokerResult<()>;

    /// Settles (deletes) the message with the handle's sequence number
    async fn complete(&self, sub_queue: &SubQueue, message: &MessageHandle) -> BrokerResult<()>;

    async fn list_entities(&self) -> BrokerResult<Topology>;

    /// Administrative query for the number of dead-lettered messages
    async fn dead_letter_count(&self, address: &EntityAddress) -> BrokerResult<u64>;

    /// Releases network resources; later calls fail with `Unavailable`
    async fn close(&self);
}

/// Creates broker clients from credentials
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self, credential: &Credential) -> BrokerResult<Arc<dyn BrokerClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_address_sends_to_its_topic() {
        let address = EntityAddress::new("invoices", Some("billing"));
        assert_eq!(address.send_target(), "billing");
        assert_eq!(address.to_string(), "billing/invoices");

        let queue = EntityAddress::new("orders", None);
        assert_eq!(queue.send_target(), "orders");
    }

    #[test]
    fn dead_letter_sub_queue_display() {
        let sub_queue = SubQueue::dead_letter(EntityAddress::Queue("orders".into()));
        assert_eq!(sub_queue.to_string(), "orders/$DeadLetterQueue");
    }
}
