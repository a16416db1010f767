//! Entity discovery per connection
//!
//! Queues, topics and topic subscriptions are discovered with a single
//! topology call and cached per connection until [`EntityCatalog::refresh`]
//! is called. A failed refresh keeps the last-known-good topology.

use crate::broker::{EntityAddress, SubQueue, Topology};
use crate::connection::ConnectionRegistry;
use crate::error::{ConsoleError, ConsoleResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Separator of `topic/subscription` composite names
pub const ENTITY_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Queue,
    Topic,
}

/// A discovered queue or topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    /// Subscription names, only populated for topics
    pub subscriptions: Vec<String>,
}

/// Splits a `topic/subscription` composite into `(topic, subscription)`.
///
/// Exactly one separator with non-empty parts on both sides is accepted.
pub fn split_composite_name(name: &str) -> ConsoleResult<(String, String)> {
    let mut parts = name.split(ENTITY_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(topic), Some(subscription), None)
            if !topic.is_empty() && !subscription.is_empty() =>
        {
            Ok((topic.to_string(), subscription.to_string()))
        }
        _ => Err(ConsoleError::InvalidEntityName(name.to_string())),
    }
}

/// Resolves a display name to an address: a plain name is a queue, a
/// composite name is a topic subscription. More than one separator is rejected.
pub fn parse_entity_name(name: &str) -> ConsoleResult<EntityAddress> {
    if name.is_empty() {
        return Err(ConsoleError::InvalidEntityName(name.to_string()));
    }
    if !name.contains(ENTITY_SEPARATOR) {
        return Ok(EntityAddress::Queue(name.to_string()));
    }
    let (topic, subscription) = split_composite_name(name)?;
    Ok(EntityAddress::Subscription {
        topic,
        subscription,
    })
}

pub fn composite_name(topic: &str, subscription: &str) -> String {
    format!("{}{}{}", topic, ENTITY_SEPARATOR, subscription)
}

/// Fully qualified message source or destination: which connection, which
/// queue or subscription, and which sub-queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTarget {
    pub connection: String,
    /// Queue name, or subscription name when `topic` is set
    pub entity: String,
    pub topic: Option<String>,
    pub dead_letter: bool,
}

impl EntityTarget {
    pub fn new(connection: &str, entity: &str, topic: Option<&str>) -> Self {
        Self {
            connection: connection.to_string(),
            entity: entity.to_string(),
            topic: topic.map(str::to_string),
            dead_letter: false,
        }
    }

    /// Resolves a display name such as `orders` or `billing/invoices`
    pub fn from_display_name(connection: &str, display_name: &str) -> ConsoleResult<Self> {
        Ok(match parse_entity_name(display_name)? {
            EntityAddress::Queue(queue) => Self::new(connection, &queue, None),
            EntityAddress::Subscription {
                topic,
                subscription,
            } => Self::new(connection, &subscription, Some(&topic)),
        })
    }

    pub fn dead_letter(mut self, dead_letter: bool) -> Self {
        self.dead_letter = dead_letter;
        self
    }

    pub fn address(&self) -> EntityAddress {
        EntityAddress::new(&self.entity, self.topic.as_deref())
    }

    pub fn sub_queue(&self) -> SubQueue {
        SubQueue {
            address: self.address(),
            dead_letter: self.dead_letter,
        }
    }

    pub fn display_name(&self) -> String {
        self.address().to_string()
    }
}

#[derive(Debug, Clone)]
struct CachedTopology {
    topology: Topology,
    ticket: u64,
}

/// Per-connection cache of discovered entities
pub struct EntityCatalog {
    registry: Arc<ConnectionRegistry>,
    cache: RwLock<HashMap<String, CachedTopology>>,
    tickets: AtomicU64,
}

impl EntityCatalog {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
            tickets: AtomicU64::new(0),
        }
    }

    pub async fn list_queues(&self, connection: &str) -> ConsoleResult<Vec<Entity>> {
        let topology = self.topology(connection).await?;
        Ok(topology
            .queues
            .into_iter()
            .map(|name| Entity {
                name,
                kind: EntityKind::Queue,
                subscriptions: Vec::new(),
            })
            .collect())
    }

    pub async fn list_topics(&self, connection: &str) -> ConsoleResult<Vec<Entity>> {
        let topology = self.topology(connection).await?;
        Ok(topology
            .topics
            .into_iter()
            .map(|topic| Entity {
                name: topic.name,
                kind: EntityKind::Topic,
                subscriptions: topic.subscriptions,
            })
            .collect())
    }

    /// Every address that owns a dead-letter sub-queue: queues first, then
    /// each subscription of each topic.
    pub async fn addresses(&self, connection: &str) -> ConsoleResult<Vec<EntityAddress>> {
        let topology = self.topology(connection).await?;
        let mut addresses: Vec<EntityAddress> = topology
            .queues
            .into_iter()
            .map(EntityAddress::Queue)
            .collect();
        for topic in topology.topics {
            for subscription in topic.subscriptions {
                addresses.push(EntityAddress::Subscription {
                    topic: topic.name.clone(),
                    subscription,
                });
            }
        }
        Ok(addresses)
    }

    /// Discards the cached topology and fetches it again
    pub async fn refresh(&self, connection: &str) -> ConsoleResult<()> {
        info!("Refreshing entities of {}", connection);
        self.fetch(connection).await.map(|_| ())
    }

    /// Forgets a connection's topology, e.g. after the connection was removed
    pub async fn invalidate(&self, connection: &str) {
        self.cache.write().await.remove(connection);
    }

    async fn topology(&self, connection: &str) -> ConsoleResult<Topology> {
        if let Some(cached) = self.cache.read().await.get(connection) {
            debug!("Using cached topology for {}", connection);
            return Ok(cached.topology.clone());
        }
        self.fetch(connection).await
    }

    async fn fetch(&self, connection: &str) -> ConsoleResult<Topology> {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let client = self.registry.client(connection).await?;
        let topology = client.list_entities().await.map_err(|e| {
            warn!("Entity discovery for {} failed: {}", connection, e);
            ConsoleError::BrokerUnavailable(e.to_string())
        })?;

        let mut cache = self.cache.write().await;
        match cache.get(connection) {
            // a later discovery already stored a newer view
            Some(existing) if existing.ticket > ticket => {
                debug!("Dropping stale topology for {}", connection);
            }
            _ => {
                cache.insert(
                    connection.to_string(),
                    CachedTopology {
                        topology: topology.clone(),
                        ticket,
                    },
                );
            }
        }
        debug!(
            "Discovered {} queues and {} topics on {}",
            topology.queues.len(),
            topology.topics.len(),
            connection
        );
        Ok(topology)
    }
}
