//! # Service Bus Console
//!
//! Entry point for presentation-layer consumers. [`ServiceBusConsole`] wires
//! the engine's components together from explicitly passed collaborators:
//!
//! ```text
//! BrokerConnector ─► ConnectionRegistry ─┬─► EntityCatalog ─┐
//!                                        ├─► MessageBrowser ├─► DeadLetterAggregator
//!                                        └─► MessageOperationExecutor
//! ConfigPortal ◄── connection names, settings
//! ActionBus ◄── presenters
//! ```
//!
//! There is no ambient lookup: every component receives what it needs at
//! construction. Connection registration is mirrored into the configuration
//! portal so the connection list survives a restart, while the credentials
//! themselves stay in the external [`CredentialStore`].

use crate::action_bus::ActionBus;
use crate::broker::{BrokerConnector, MessageHandle, OutgoingMessage};
use crate::browser::{MessageBrowser, PeekRequest};
use crate::catalog::{Entity, EntityCatalog, EntityTarget};
use crate::connection::credential_store::CredentialStore;
use crate::connection::{Connection, ConnectionRegistry};
use crate::dead_letters::{DeadLetterAggregator, DeadLetterSummary};
use crate::error::ConsoleResult;
use crate::operations::{BatchOutcome, MessageOperationExecutor};
use crate::persistence::config_portal::{ConfigPortal, ConfigResult, PortalAction};
use crate::persistence::ConsoleSettings;
use crate::presenter::{
    DeadLettersPresenter, ErrorHandler, MessageListPresenter, UiExecutor, ViewAction,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ServiceBusConsole {
    registry: Arc<ConnectionRegistry>,
    catalog: Arc<EntityCatalog>,
    browser: Arc<MessageBrowser>,
    operations: Arc<MessageOperationExecutor>,
    actions: Arc<ActionBus<ViewAction>>,
    credentials: Arc<dyn CredentialStore>,
    ui: Arc<dyn UiExecutor>,
    errors: Arc<dyn ErrorHandler>,
    portal: Arc<ConfigPortal>,
}

impl ServiceBusConsole {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        credentials: Arc<dyn CredentialStore>,
        ui: Arc<dyn UiExecutor>,
        errors: Arc<dyn ErrorHandler>,
        portal: Arc<ConfigPortal>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(connector));
        Self {
            catalog: Arc::new(EntityCatalog::new(registry.clone())),
            browser: Arc::new(MessageBrowser::new(registry.clone())),
            operations: Arc::new(MessageOperationExecutor::new(registry.clone())),
            actions: Arc::new(ActionBus::new()),
            registry,
            credentials,
            ui,
            errors,
            portal,
        }
    }

    /// Registers every saved connection whose credential is available.
    /// Returns the restored names.
    pub async fn restore_connections(&self) -> Vec<String> {
        let names = match self
            .portal
            .execute_portal_action(PortalAction::GetConnectionNames)
        {
            ConfigResult::ConnectionNames(names) => names,
            ConfigResult::Failed(e) => {
                warn!("Could not read saved connections: {}", e);
                return Vec::new();
            }
            _ => return Vec::new(),
        };
        let restored = self
            .registry
            .restore(&names, self.credentials.as_ref())
            .await;
        info!("Restored {} of {} connections", restored.len(), names.len());
        restored
    }

    pub async fn save_config(&self) -> ConsoleResult<()> {
        self.portal.save().await
    }

    pub fn settings(&self) -> ConsoleSettings {
        match self.portal.execute_portal_action(PortalAction::GetSettings) {
            ConfigResult::Settings(settings) => settings,
            ConfigResult::Failed(e) => {
                warn!("Could not read settings, using defaults: {}", e);
                ConsoleSettings::default()
            }
            _ => ConsoleSettings::default(),
        }
    }

    pub fn portal(&self) -> &Arc<ConfigPortal> {
        &self.portal
    }

    pub fn actions(&self) -> &Arc<ActionBus<ViewAction>> {
        &self.actions
    }

    // Connections

    pub async fn add_connection(&self, name: &str, credential: &str) -> ConsoleResult<Arc<Connection>> {
        let connection = self.registry.add(name, credential).await?;
        if let ConfigResult::Failed(e) = self
            .portal
            .execute_portal_action(PortalAction::AddConnectionName(connection.name().to_string()))
        {
            warn!("Connection {} not written to configuration: {}", name, e);
        }
        Ok(connection)
    }

    pub async fn remove_connection(&self, name: &str) -> ConsoleResult<()> {
        self.registry.remove(name).await?;
        self.catalog.invalidate(name).await;
        if let ConfigResult::Failed(e) = self
            .portal
            .execute_portal_action(PortalAction::RemoveConnectionName(name.to_string()))
        {
            warn!("Connection {} not removed from configuration: {}", name, e);
        }
        Ok(())
    }

    pub async fn get_connection(&self, name: &str) -> ConsoleResult<Arc<Connection>> {
        self.registry.get(name).await
    }

    pub async fn list_connections(&self) -> Vec<Arc<Connection>> {
        self.registry.list().await
    }

    // Entities

    pub async fn list_queues(&self, connection: &str) -> ConsoleResult<Vec<Entity>> {
        self.catalog.list_queues(connection).await
    }

    pub async fn list_topics(&self, connection: &str) -> ConsoleResult<Vec<Entity>> {
        self.catalog.list_topics(connection).await
    }

    pub async fn refresh_entities(&self, connection: &str) -> ConsoleResult<()> {
        self.catalog.refresh(connection).await
    }

    // Messages

    /// Peeks the active sub-queue of a queue, or of subscription `entity`
    /// when `topic` is given
    pub async fn peek(
        &self,
        connection: &str,
        entity: &str,
        topic: Option<&str>,
        max_count: u32,
        from_sequence_number: Option<i64>,
    ) -> ConsoleResult<Vec<MessageHandle>> {
        let target = EntityTarget::new(connection, entity, topic);
        self.browser
            .peek(&PeekRequest::new(target, max_count).after(from_sequence_number))
            .await
    }

    pub async fn peek_dead_letter(
        &self,
        connection: &str,
        entity: &str,
        topic: Option<&str>,
        max_count: u32,
        from_sequence_number: Option<i64>,
    ) -> ConsoleResult<Vec<MessageHandle>> {
        let target = EntityTarget::new(connection, entity, topic).dead_letter(true);
        self.browser
            .peek(&PeekRequest::new(target, max_count).after(from_sequence_number))
            .await
    }

    pub async fn get_dead_letters(&self) -> DeadLetterSummary {
        self.aggregator().get_dead_letters().await
    }

    /// Rediscovers every connection's entities before counting
    pub async fn refresh_dead_letters(&self) -> DeadLetterSummary {
        self.aggregator().refresh_dead_letters().await
    }

    pub async fn resend(
        &self,
        connection: &str,
        entity: &str,
        message: &MessageHandle,
        topic: Option<&str>,
    ) -> ConsoleResult<()> {
        self.operations
            .resend(&EntityTarget::new(connection, entity, topic), message)
            .await
    }

    pub async fn remove(
        &self,
        connection: &str,
        entity: &str,
        dead_letter: bool,
        message: &MessageHandle,
        topic: Option<&str>,
    ) -> ConsoleResult<()> {
        let target = EntityTarget::new(connection, entity, topic).dead_letter(dead_letter);
        self.operations.remove(&target, message).await
    }

    pub async fn send(
        &self,
        connection: &str,
        entity: &str,
        topic: Option<&str>,
        message: OutgoingMessage,
    ) -> ConsoleResult<()> {
        self.operations
            .send(&EntityTarget::new(connection, entity, topic), message)
            .await
    }

    /// Resends `messages` in order using the configured resend policy
    pub async fn resend_batch(&self, target: &EntityTarget, messages: &[MessageHandle]) -> BatchOutcome {
        let policy = self.settings().resend_policy;
        self.operations.resend_batch(target, messages, policy).await
    }

    /// Removes `messages` in order using the configured remove policy
    pub async fn remove_batch(&self, target: &EntityTarget, messages: &[MessageHandle]) -> BatchOutcome {
        let policy = self.settings().remove_policy;
        self.operations.remove_batch(target, messages, policy).await
    }

    // Presenters

    pub fn message_list_presenter(&self) -> Arc<MessageListPresenter> {
        MessageListPresenter::new(
            self.browser.clone(),
            self.operations.clone(),
            self.actions.clone(),
            self.ui.clone(),
            self.errors.clone(),
            self.settings(),
        )
    }

    pub fn dead_letters_presenter(&self) -> DeadLettersPresenter {
        DeadLettersPresenter::new(
            Arc::new(self.aggregator()),
            self.actions.clone(),
            self.ui.clone(),
            self.errors.clone(),
        )
    }

    fn aggregator(&self) -> DeadLetterAggregator {
        DeadLetterAggregator::new(self.registry.clone(), self.catalog.clone())
            .include_empty(!self.settings().only_nonzero_dead_letters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::connection::credential_store::MemoryCredentialStore;
    use crate::error::ConsoleError;
    use crate::persistence::ConsoleConfig;
    use crate::presenter::{InlineExecutor, TracingErrorHandler};
    use std::path::PathBuf;

    const PROD: &str = "Endpoint=sb://prod.example/;SharedAccessKeyName=k;SharedAccessKey=v";

    fn console_with(config: ConsoleConfig, credentials: Arc<MemoryCredentialStore>) -> ServiceBusConsole {
        let broker = Arc::new(MemoryBroker::new());
        broker.namespace("prod.example").add_queue("orders");
        ServiceBusConsole::new(
            broker,
            credentials,
            Arc::new(InlineExecutor),
            Arc::new(TracingErrorHandler),
            Arc::new(ConfigPortal::new(config, PathBuf::from("unused.toml"))),
        )
    }

    fn saved_names(console: &ServiceBusConsole) -> Vec<String> {
        match console
            .portal()
            .execute_portal_action(PortalAction::GetConnectionNames)
        {
            ConfigResult::ConnectionNames(names) => names,
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_changes_are_mirrored_into_the_configuration() {
        let console = console_with(ConsoleConfig::default(), Arc::default());
        console.add_connection("prod", PROD).await.unwrap();
        assert_eq!(saved_names(&console), ["prod"]);

        assert!(matches!(
            console.add_connection("prod", PROD).await,
            Err(ConsoleError::DuplicateName(_))
        ));
        assert_eq!(saved_names(&console), ["prod"]);

        console.remove_connection("prod").await.unwrap();
        assert!(saved_names(&console).is_empty());
        assert!(matches!(
            console.list_queues("prod").await,
            Err(ConsoleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn restore_skips_names_without_credentials() {
        let mut config = ConsoleConfig::default();
        config.connections.insert("prod");
        config.connections.insert("stale");
        let credentials = Arc::new(MemoryCredentialStore::default());
        credentials.insert("prod", PROD);
        let console = console_with(config, credentials);

        assert_eq!(console.restore_connections().await, ["prod"]);
        let queues = console.list_queues("prod").await.unwrap();
        assert_eq!(queues[0].name, "orders");
    }

    #[tokio::test]
    async fn presenters_pick_up_the_current_settings() {
        let mut config = ConsoleConfig::default();
        config.settings.peek_page_size = 1;
        let console = console_with(config, Arc::default());
        console.add_connection("prod", PROD).await.unwrap();
        for body in ["a", "b"] {
            console
                .send("prod", "orders", None, OutgoingMessage::new(body))
                .await
                .unwrap();
        }

        let presenter = console.message_list_presenter();
        presenter.load("prod", "orders", false).await;
        assert_eq!(presenter.state().messages.get().len(), 1);
        assert!(presenter.state().has_more.get());
    }
}
