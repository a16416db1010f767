//! # Dead-Letter Aggregation
//!
//! Builds a consolidated dead-letter overview across every registered
//! connection.
//!
//! ## Failure Isolation
//!
//! Each connection is processed in its own tokio task. A connection whose
//! discovery or count query fails is recorded in
//! [`DeadLetterSummary::failures`] and left out of the per-connection
//! entries; all other connections are reported in full. The aggregate call
//! itself never fails.
//!
//! An entity that disappears between discovery and the count query is
//! skipped with a warning instead of failing its whole connection.
//!
//! [`DeadLetterAggregator::get_dead_letters`] enumerates entities from the
//! catalog cache. [`DeadLetterAggregator::refresh_dead_letters`] discovers
//! them again first; a connection whose discovery fails keeps its cached
//! topology and is recorded as failed.
//!
//! ## Naming
//!
//! Subscription entries carry the subscription as `entity_name` and the
//! topic as `parent_topic_name`, so navigation can rebuild the
//! `topic/subscription` composite.

use crate::broker::{BrokerError, EntityAddress};
use crate::catalog::{composite_name, parse_entity_name, EntityCatalog};
use crate::connection::ConnectionRegistry;
use crate::error::{ConsoleError, ConsoleResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Dead-letter count of one queue or subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterInfo {
    pub connection: String,
    pub entity_name: String,
    pub count: u64,
    pub parent_topic_name: Option<String>,
}

impl DeadLetterInfo {
    pub fn from_address(connection: &str, address: &EntityAddress, count: u64) -> Self {
        let (entity_name, parent_topic_name) = match address {
            EntityAddress::Queue(name) => (name.clone(), None),
            EntityAddress::Subscription {
                topic,
                subscription,
            } => (subscription.clone(), Some(topic.clone())),
        };
        Self {
            connection: connection.to_string(),
            entity_name,
            count,
            parent_topic_name,
        }
    }

    /// Resolves a raw entity name, splitting `topic/subscription` composites
    pub fn from_entity_name(connection: &str, name: &str, count: u64) -> ConsoleResult<Self> {
        let address = parse_entity_name(name)?;
        Ok(Self::from_address(connection, &address, count))
    }

    /// `topic/subscription` for subscriptions, the queue name otherwise
    pub fn display_name(&self) -> String {
        match &self.parent_topic_name {
            Some(topic) => composite_name(topic, &self.entity_name),
            None => self.entity_name.clone(),
        }
    }
}

/// Display grouping keyed by connection name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionGroup<T> {
    pub key: String,
    pub items: Vec<T>,
}

/// Result of one aggregation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeadLetterSummary {
    /// Entries of every connection that was processed successfully
    pub connections: BTreeMap<String, Vec<DeadLetterInfo>>,
    /// Connections that could not be processed
    pub failures: BTreeMap<String, ConsoleError>,
}

impl DeadLetterSummary {
    pub fn get(&self, connection: &str) -> Option<&[DeadLetterInfo]> {
        self.connections.get(connection).map(Vec::as_slice)
    }

    pub fn total(&self) -> u64 {
        self.connections.values().flatten().map(|info| info.count).sum()
    }

    /// Groups ordered lexicographically by connection name
    pub fn groups(&self) -> Vec<CollectionGroup<DeadLetterInfo>> {
        self.connections
            .iter()
            .map(|(key, items)| CollectionGroup {
                key: key.clone(),
                items: items.clone(),
            })
            .collect()
    }
}

pub struct DeadLetterAggregator {
    registry: Arc<ConnectionRegistry>,
    catalog: Arc<EntityCatalog>,
    only_nonzero: bool,
}

impl DeadLetterAggregator {
    pub fn new(registry: Arc<ConnectionRegistry>, catalog: Arc<EntityCatalog>) -> Self {
        Self {
            registry,
            catalog,
            only_nonzero: true,
        }
    }

    /// Also report entities whose dead-letter sub-queue is empty
    pub fn include_empty(mut self, include: bool) -> Self {
        self.only_nonzero = !include;
        self
    }

    pub async fn get_dead_letters(&self) -> DeadLetterSummary {
        self.aggregate(false).await
    }

    /// Re-discovers every connection's entities, then aggregates
    pub async fn refresh_dead_letters(&self) -> DeadLetterSummary {
        self.aggregate(true).await
    }

    async fn aggregate(&self, rediscover: bool) -> DeadLetterSummary {
        let connections = self.registry.list().await;
        info!(
            "Aggregating dead letters over {} connections (rediscover: {})",
            connections.len(),
            rediscover
        );

        let handles: Vec<_> = connections
            .iter()
            .map(|connection| {
                let name = connection.name().to_string();
                let registry = self.registry.clone();
                let catalog = self.catalog.clone();
                let only_nonzero = self.only_nonzero;
                let task_name = name.clone();
                let handle = tokio::spawn(async move {
                    if rediscover {
                        if let Err(e) = catalog.refresh(&task_name).await {
                            return Err(e);
                        }
                    }
                    collect_connection(&registry, &catalog, &task_name, only_nonzero).await
                });
                (name, handle)
            })
            .collect();

        let mut summary = DeadLetterSummary::default();
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ConsoleError::BrokerUnavailable(format!(
                    "aggregation task aborted: {}",
                    e
                ))),
            };
            match result {
                Ok(entries) => {
                    summary.connections.insert(name, entries);
                }
                Err(e) => {
                    error!("Dead-letter aggregation for {} failed: {}", name, e);
                    summary.failures.insert(name, e);
                }
            }
        }
        summary
    }
}

async fn collect_connection(
    registry: &ConnectionRegistry,
    catalog: &EntityCatalog,
    connection: &str,
    only_nonzero: bool,
) -> ConsoleResult<Vec<DeadLetterInfo>> {
    let addresses = catalog.addresses(connection).await?;
    let client = registry.client(connection).await?;

    let mut entries = Vec::new();
    for address in addresses {
        let count = match client.dead_letter_count(&address).await {
            Ok(count) => count,
            Err(BrokerError::EntityNotFound(entity)) => {
                warn!("{} vanished from {} before counting", entity, connection);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if only_nonzero && count == 0 {
            continue;
        }
        entries.push(DeadLetterInfo::from_address(connection, &address, count));
    }
    debug!("{} dead-letter entries on {}", entries.len(), connection);
    Ok(entries)
}
