//! # Connection Registry
//!
//! Owns the set of named broker connections and their live clients.
//!
//! ## Client Lifecycle
//!
//! A connection is registered with a validated [`Credential`] but no network
//! activity. The broker client is created on first use through the injected
//! [`BrokerConnector`] and reused afterwards; removing the connection closes
//! it.
//!
//! ```text
//! Add ──► Registered ──(first use)──► Open ──(Remove)──► Closed
//!                 └──(connect fails)──► Failed ──(next use retries)
//! ```
//!
//! ## Ordering
//!
//! `list` returns connections in registration order. Names are unique.

pub mod credential_store;

pub use credential_store::{CredentialStore, MemoryCredentialStore};

use crate::broker::{BrokerClient, BrokerConnector, Credential};
use crate::error::{ConsoleError, ConsoleResult};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Registered,
    Open,
    Failed,
    Closed,
}

/// One named broker connection
pub struct Connection {
    name: String,
    credential: Credential,
    client: OnceCell<Arc<dyn BrokerClient>>,
    state: StdMutex<ConnectionState>,
}

impl Connection {
    fn new(name: String, credential: Credential) -> Self {
        Self {
            name,
            credential,
            client: OnceCell::new(),
            state: StdMutex::new(ConnectionState::Registered),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Moves to `state` unless the connection was closed. Closed is final.
    fn transition(&self, state: ConnectionState) -> bool {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == ConnectionState::Closed {
            return false;
        }
        *current = state;
        true
    }

    /// Returns the live client, creating it on first use
    pub async fn client(
        &self,
        connector: &dyn BrokerConnector,
    ) -> ConsoleResult<Arc<dyn BrokerClient>> {
        if self.state() == ConnectionState::Closed {
            return Err(ConsoleError::NotFound(self.name.clone()));
        }
        let client = self
            .client
            .get_or_try_init(|| async {
                debug!("Creating broker client for connection {}", self.name);
                match connector.connect(&self.credential).await {
                    Ok(client) => {
                        if self.transition(ConnectionState::Open) {
                            info!("Connection {} opened", self.name);
                        }
                        Ok(client)
                    }
                    Err(e) => {
                        warn!("Connection {} failed to open: {}", self.name, e);
                        self.transition(ConnectionState::Failed);
                        Err(ConsoleError::from(e))
                    }
                }
            })
            .await?
            .clone();

        // removed while the connect was in flight
        if self.state() == ConnectionState::Closed {
            debug!("Closing client of removed connection {}", self.name);
            client.close().await;
            return Err(ConsoleError::NotFound(self.name.clone()));
        }
        Ok(client)
    }

    async fn close(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ConnectionState::Closed;
        if let Some(client) = self.client.get() {
            client.close().await;
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("credential", &self.credential)
            .field("state", &self.state())
            .finish()
    }
}

/// Holds all configured connections
pub struct ConnectionRegistry {
    connector: Arc<dyn BrokerConnector>,
    connections: RwLock<Vec<Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            connector,
            connections: RwLock::new(Vec::new()),
        }
    }

    /// Registers a connection. Fails on a taken name or a malformed credential.
    pub async fn add(&self, name: &str, credential: &str) -> ConsoleResult<Arc<Connection>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConsoleError::InvalidConnectionName(
                "connection name must not be empty".into(),
            ));
        }
        let credential = Credential::parse(credential)?;

        let mut connections = self.connections.write().await;
        if connections.iter().any(|c| c.name == name) {
            return Err(ConsoleError::DuplicateName(name.to_string()));
        }
        let connection = Arc::new(Connection::new(name.to_string(), credential));
        connections.push(connection.clone());
        info!(
            "Registered connection {} ({})",
            name,
            connection.credential.namespace()
        );
        Ok(connection)
    }

    /// Unregisters a connection and closes its client
    pub async fn remove(&self, name: &str) -> ConsoleResult<()> {
        let removed = {
            let mut connections = self.connections.write().await;
            let index = connections
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| ConsoleError::NotFound(name.to_string()))?;
            connections.remove(index)
        };
        removed.close().await;
        info!("Removed connection {}", name);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> ConsoleResult<Arc<Connection>> {
        self.connections
            .read()
            .await
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| ConsoleError::NotFound(name.to_string()))
    }

    /// Connections in registration order
    pub async fn list(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.clone()
    }

    /// Live client of the named connection, created on first use
    pub async fn client(&self, name: &str) -> ConsoleResult<Arc<dyn BrokerClient>> {
        let connection = self.get(name).await?;
        connection.client(self.connector.as_ref()).await
    }

    /// Registers every name the store has a valid credential for. Returns the
    /// names that were restored; unknown or invalid entries are skipped.
    pub async fn restore(&self, names: &[String], store: &dyn CredentialStore) -> Vec<String> {
        let mut restored = Vec::new();
        for name in names {
            let Some(secret) = store.credential(name) else {
                warn!("No stored credential for connection {}, skipping", name);
                continue;
            };
            match self.add(name, &secret).await {
                Ok(_) => restored.push(name.clone()),
                Err(e) => warn!("Could not restore connection {}: {}", name, e),
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;

    fn conn_str(host: &str) -> String {
        format!(
            "Endpoint=sb://{}/;SharedAccessKeyName=k;SharedAccessKey=v",
            host
        )
    }

    fn registry() -> (Arc<MemoryBroker>, ConnectionRegistry) {
        let broker = Arc::new(MemoryBroker::new());
        broker.namespace("prod.example").add_queue("orders");
        let registry = ConnectionRegistry::new(broker.clone());
        (broker, registry)
    }

    #[tokio::test]
    async fn add_rejects_duplicates_and_bad_credentials() {
        let (_, registry) = registry();
        registry.add("prod", &conn_str("prod.example")).await.unwrap();

        assert_eq!(
            registry.add("prod", &conn_str("other")).await.unwrap_err(),
            ConsoleError::DuplicateName("prod".into())
        );
        assert!(matches!(
            registry.add("dev", "not a connection string").await,
            Err(ConsoleError::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn list_keeps_registration_order() {
        let (_, registry) = registry();
        for name in ["zeta", "alpha", "mid"] {
            registry.add(name, &conn_str("prod.example")).await.unwrap();
        }
        let names: Vec<_> = registry
            .list()
            .await
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn client_is_created_lazily_and_reused() {
        let (broker, registry) = registry();
        let connection = registry.add("prod", &conn_str("prod.example")).await.unwrap();
        assert_eq!(broker.connect_count(), 0);
        assert!(!connection.is_open());

        registry.client("prod").await.unwrap();
        registry.client("prod").await.unwrap();
        assert_eq!(broker.connect_count(), 1);
        assert!(connection.is_open());
    }

    #[tokio::test]
    async fn failed_connect_is_retried_on_next_use() {
        let (broker, registry) = registry();
        let connection = registry.add("late", &conn_str("late.example")).await.unwrap();

        assert!(matches!(
            registry.client("late").await,
            Err(ConsoleError::BrokerUnavailable(_))
        ));
        assert_eq!(connection.state(), ConnectionState::Failed);

        broker.namespace("late.example");
        registry.client("late").await.unwrap();
        assert!(connection.is_open());
    }

    #[tokio::test]
    async fn remove_closes_the_client() {
        let (_, registry) = registry();
        let connection = registry.add("prod", &conn_str("prod.example")).await.unwrap();
        let client = registry.client("prod").await.unwrap();

        registry.remove("prod").await.unwrap();

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(client.list_entities().await.is_err());
        assert_eq!(
            registry.get("prod").await.unwrap_err(),
            ConsoleError::NotFound("prod".into())
        );
        assert_eq!(
            registry.remove("prod").await.unwrap_err(),
            ConsoleError::NotFound("prod".into())
        );
    }

    #[tokio::test]
    async fn remove_during_connect_closes_the_late_client() {
        let (broker, registry) = registry();
        let registry = Arc::new(registry);
        broker.set_connect_delay(std::time::Duration::from_millis(100));
        let connection = registry.add("prod", &conn_str("prod.example")).await.unwrap();

        let pending = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.client("prod").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        registry.remove("prod").await.unwrap();

        assert_eq!(
            pending.await.unwrap().err(),
            Some(ConsoleError::NotFound("prod".into()))
        );
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(broker.connect_count(), 1);
        assert_eq!(broker.live_clients(), 0);
    }

    #[tokio::test]
    async fn empty_connection_name_is_rejected() {
        let (_, registry) = registry();
        assert!(matches!(
            registry.add("  ", &conn_str("prod.example")).await,
            Err(ConsoleError::InvalidConnectionName(_))
        ));
    }

    #[tokio::test]
    async fn restore_skips_missing_and_invalid_credentials() {
        let (_, registry) = registry();
        let store = MemoryCredentialStore::default();
        store.insert("prod", &conn_str("prod.example"));
        store.insert("broken", "Endpoint=nope");

        let restored = registry
            .restore(
                &["prod".to_string(), "broken".to_string(), "gone".to_string()],
                &store,
            )
            .await;
        assert_eq!(restored, ["prod"]);
    }
}
