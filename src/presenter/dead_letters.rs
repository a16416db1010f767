use super::executor::{ErrorHandler, UiExecutor};
use super::state::{BusyFlag, Generation, Observable};
use super::ViewAction;
use crate::action_bus::{ActionBus, OPEN_MESSAGE_LIST};
use crate::dead_letters::{
    CollectionGroup, DeadLetterAggregator, DeadLetterInfo, DeadLetterSummary,
};
use crate::error::ConsoleError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
pub struct DeadLettersState {
    pub groups: Observable<Vec<CollectionGroup<DeadLetterInfo>>>,
    pub failures: Observable<BTreeMap<String, ConsoleError>>,
    generation: Generation,
}

/// Dead-letter overview across all connections
pub struct DeadLettersPresenter {
    aggregator: Arc<DeadLetterAggregator>,
    actions: Arc<ActionBus<ViewAction>>,
    ui: Arc<dyn UiExecutor>,
    errors: Arc<dyn ErrorHandler>,
    state: Arc<DeadLettersState>,
    loading: BusyFlag,
    refreshing: BusyFlag,
}

impl DeadLettersPresenter {
    pub fn new(
        aggregator: Arc<DeadLetterAggregator>,
        actions: Arc<ActionBus<ViewAction>>,
        ui: Arc<dyn UiExecutor>,
        errors: Arc<dyn ErrorHandler>,
    ) -> Self {
        Self {
            aggregator,
            actions,
            ui,
            errors,
            state: Arc::new(DeadLettersState::default()),
            loading: BusyFlag::default(),
            refreshing: BusyFlag::default(),
        }
    }

    pub fn state(&self) -> &DeadLettersState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.loading.is_busy() || self.refreshing.is_busy()
    }

    /// Rebuilds the groups from the known entities. Failed connections are
    /// reported one by one to the error handler and kept in `failures`; the
    /// others are shown.
    pub async fn load(&self) -> bool {
        let Some(_busy) = self.loading.try_acquire() else {
            debug!("Dead-letter load ignored, already running");
            return false;
        };
        let ticket = self.state.generation.next();
        let summary = self.aggregator.get_dead_letters().await;
        self.apply(ticket, summary);
        true
    }

    /// Like [`load`](Self::load), but discovers every connection's entities
    /// again first
    pub async fn refresh(&self) -> bool {
        let Some(_busy) = self.refreshing.try_acquire() else {
            debug!("Dead-letter refresh ignored, already running");
            return false;
        };
        let ticket = self.state.generation.next();
        let summary = self.aggregator.refresh_dead_letters().await;
        self.apply(ticket, summary);
        true
    }

    fn apply(&self, ticket: u64, summary: DeadLetterSummary) {
        for (connection, error) in &summary.failures {
            self.errors
                .handle(&format!("get_dead_letters({})", connection), error);
        }
        info!(
            "{} dead letters in {} connections, {} failed",
            summary.total(),
            summary.connections.len(),
            summary.failures.len()
        );

        let state = self.state.clone();
        let groups = summary.groups();
        let failures = summary.failures;
        self.ui.post(Box::new(move || {
            if !state.generation.is_current(ticket) {
                return;
            }
            state.groups.set(groups);
            state.failures.set(failures);
        }));
    }

    /// Asks navigation to open the message list behind `info`
    pub fn show(&self, info: &DeadLetterInfo) -> bool {
        self.actions.invoke(
            OPEN_MESSAGE_LIST,
            Some(ViewAction::MessageList { info: info.clone() }),
        )
    }
}
