//! Error definitions for the console engine
//!
//! Every user-facing operation returns [`ConsoleError`]. Variants map one to
//! one onto the failure classes an operator can react to: naming conflicts,
//! bad credentials, missing connections or entities, an unreachable broker,
//! and messages that were consumed by somebody else in the meantime.

use crate::broker::BrokerError;

/// Result alias used throughout the crate
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Error types of the connection and message management engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    /// A connection with this name is already registered
    #[error("Connection name already in use: {0}")]
    DuplicateName(String),

    /// The credential could not be parsed or is missing required parts
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// No connection is registered under this name
    #[error("Connection not found: {0}")]
    NotFound(String),

    /// Connectivity, authorization or throttling failure reported by the broker
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// The broker does not know the addressed queue, topic or subscription
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// The message is no longer present in its sub-queue
    #[error("Message {sequence_number} not found in {entity}")]
    MessageNotFound { entity: String, sequence_number: i64 },

    /// Empty or otherwise unusable connection name
    #[error("Invalid connection name: {0}")]
    InvalidConnectionName(String),

    /// Malformed `topic/subscription` composite name
    #[error("Invalid entity name: {0}")]
    InvalidEntityName(String),

    /// Configuration file could not be read, parsed or written
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConsoleError {
    /// True for failures that are normal under concurrent access and should
    /// not be surfaced as fatal.
    pub fn is_expected(&self) -> bool {
        matches!(self, ConsoleError::MessageNotFound { .. })
    }
}

impl From<BrokerError> for ConsoleError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Unavailable(reason) => ConsoleError::BrokerUnavailable(reason),
            BrokerError::EntityNotFound(entity) => ConsoleError::EntityNotFound(entity),
            BrokerError::MessageNotFound {
                entity,
                sequence_number,
            } => ConsoleError::MessageNotFound {
                entity,
                sequence_number,
            },
        }
    }
}
