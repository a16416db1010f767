//! Message list of one queue or subscription
//!
//! Loads pages of peeked messages, keeps a selection and runs batch resend
//! and remove over it.
//!
//! The entity the user asked for last is the *requested* target. Every
//! reload takes a generation ticket together with it, and its result is
//! applied only while both are still current. The observable `target`
//! changes in the same UI update as `messages`, so a failed load leaves the
//! list showing what it showed before. Updates reach observable state only
//! through the injected [`UiExecutor`].
//!
//! Load, refresh, paging and batches each have their own busy flag. A
//! refresh requested while one is running is queued and runs once the
//! current one finishes.

use super::executor::{ErrorHandler, UiExecutor};
use super::state::{BusyFlag, Generation, Observable};
use super::ViewAction;
use crate::action_bus::{ActionBus, OPEN_MESSAGE_DETAILS, OPEN_NEW_MESSAGE, UPDATE_MESSAGES};
use crate::broker::MessageHandle;
use crate::browser::{MessageBrowser, PeekCursor, PeekRequest};
use crate::catalog::EntityTarget;
use crate::error::ConsoleResult;
use crate::operations::{BatchOutcome, BatchPolicy, MessageOperationExecutor};
use crate::persistence::ConsoleSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

/// Observable state of the list
#[derive(Default)]
pub struct MessageListState {
    /// Entity whose messages are shown
    pub target: Observable<Option<EntityTarget>>,
    pub messages: Observable<Vec<MessageHandle>>,
    pub selection: Observable<Vec<MessageHandle>>,
    pub has_more: Observable<bool>,
    generation: Generation,
    requested: Mutex<Option<EntityTarget>>,
    cursor: Mutex<PeekCursor>,
}

impl MessageListState {
    fn cursor(&self) -> MutexGuard<'_, PeekCursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn requested(&self) -> MutexGuard<'_, Option<EntityTarget>> {
        self.requested.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `target` the requested entity and starts loading it
    fn request(&self, target: EntityTarget) -> u64 {
        let mut requested = self.requested();
        *requested = Some(target);
        self.generation.next()
    }

    /// Starts a reload of the requested entity. With `expected` set, nothing
    /// starts if another entity was requested in the meantime.
    fn reload_ticket(&self, expected: Option<&EntityTarget>) -> Option<(EntityTarget, u64)> {
        let requested = self.requested();
        let target = requested.clone()?;
        if expected.is_some_and(|expected| *expected != target) {
            return None;
        }
        Some((target, self.generation.next()))
    }

    fn is_current(&self, target: &EntityTarget, ticket: u64) -> bool {
        self.generation.is_current(ticket) && self.requested().as_ref() == Some(target)
    }

    /// Falls back to the shown entity after the load started by `ticket`
    /// failed
    fn abandon(&self, ticket: u64) {
        let mut requested = self.requested();
        if self.generation.is_current(ticket) {
            *requested = self.target.get();
        }
    }
}

pub struct MessageListPresenter {
    browser: Arc<MessageBrowser>,
    operations: Arc<MessageOperationExecutor>,
    actions: Arc<ActionBus<ViewAction>>,
    ui: Arc<dyn UiExecutor>,
    errors: Arc<dyn ErrorHandler>,
    settings: ConsoleSettings,
    state: Arc<MessageListState>,
    loading: BusyFlag,
    refreshing: BusyFlag,
    paging: BusyFlag,
    mutating: BusyFlag,
    refresh_pending: AtomicBool,
    this: Weak<MessageListPresenter>,
}

impl MessageListPresenter {
    pub fn new(
        browser: Arc<MessageBrowser>,
        operations: Arc<MessageOperationExecutor>,
        actions: Arc<ActionBus<ViewAction>>,
        ui: Arc<dyn UiExecutor>,
        errors: Arc<dyn ErrorHandler>,
        settings: ConsoleSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            browser,
            operations,
            actions,
            ui,
            errors,
            settings,
            state: Arc::new(MessageListState::default()),
            loading: BusyFlag::default(),
            refreshing: BusyFlag::default(),
            paging: BusyFlag::default(),
            mutating: BusyFlag::default(),
            refresh_pending: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    pub fn state(&self) -> &MessageListState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        [&self.loading, &self.refreshing, &self.paging, &self.mutating]
            .iter()
            .any(|flag| flag.is_busy())
    }

    pub fn has_selected_messages(&self) -> bool {
        !self.state.selection.get().is_empty()
    }

    pub fn selected_count(&self) -> usize {
        self.state.selection.get().len()
    }

    /// Opens the list for `display_name` (`queue` or `topic/subscription`).
    /// Returns false if a load was already running or it failed.
    pub async fn load(&self, connection: &str, display_name: &str, dead_letter: bool) -> bool {
        let Some(_busy) = self.loading.try_acquire() else {
            debug!("Load of {} ignored, list is busy", display_name);
            return false;
        };
        let target = match EntityTarget::from_display_name(connection, display_name) {
            Ok(target) => target.dead_letter(dead_letter),
            Err(e) => {
                self.errors.handle("load_messages", &e);
                return false;
            }
        };
        info!("Loading messages of {} on {}", target.sub_queue(), connection);
        let ticket = self.state.request(target.clone());
        if self.reload(target, ticket).await.is_err() {
            self.state.abandon(ticket);
            return false;
        }
        true
    }

    /// Reloads the first page of the requested entity and clears the
    /// selection. A call made while a refresh is running returns false and
    /// makes the running one go again once it is done.
    pub async fn refresh(&self) -> bool {
        let mut refreshed = false;
        loop {
            let busy = match self.refreshing.try_acquire() {
                Some(busy) => busy,
                None => {
                    self.refresh_pending.store(true, Ordering::Release);
                    match self.refreshing.try_acquire() {
                        Some(busy) => busy,
                        None => {
                            debug!("Refresh queued behind the running one");
                            return refreshed;
                        }
                    }
                }
            };
            self.refresh_pending.store(false, Ordering::Release);
            refreshed = match self.state.reload_ticket(None) {
                Some((target, ticket)) => self.reload(target, ticket).await.is_ok(),
                None => false,
            };
            drop(busy);
            if !self.refresh_pending.load(Ordering::Acquire) {
                return refreshed;
            }
        }
    }

    /// Appends the next page after the last loaded sequence number
    pub async fn load_more(&self) -> bool {
        let Some(_busy) = self.paging.try_acquire() else {
            return false;
        };
        let Some(target) = self.state.target.get() else {
            return false;
        };
        if self.state.cursor().is_exhausted() {
            return false;
        }
        // a page only extends the list it was fetched for
        let ticket = self.state.generation.current();
        let position = self.state.cursor().position();
        let request =
            PeekRequest::new(target.clone(), self.settings.peek_page_size).after(position);

        match self.browser.peek(&request).await {
            Ok(page) => {
                let state = self.state.clone();
                let page_size = self.settings.peek_page_size;
                self.ui.post(Box::new(move || {
                    if !state.is_current(&target, ticket) {
                        debug!("Discarding stale page (ticket {})", ticket);
                        return;
                    }
                    state.cursor().advance(&page, page_size);
                    state.has_more.set(!state.cursor().is_exhausted());
                    state.messages.update(|messages| {
                        messages.extend(page);
                        true
                    });
                }));
                true
            }
            Err(e) => {
                self.errors.handle("load_more_messages", &e);
                false
            }
        }
    }

    /// Adds the message to the selection, or removes it if already selected
    pub fn toggle_selected(&self, message: &MessageHandle) {
        self.state.selection.update(|selection| {
            match selection
                .iter()
                .position(|m| m.sequence_number == message.sequence_number)
            {
                Some(index) => {
                    selection.remove(index);
                }
                None => selection.push(message.clone()),
            }
            true
        });
    }

    /// Resends every selected message in selection order, then reloads
    pub async fn resend_selected(&self) -> Option<BatchOutcome> {
        let policy = self.settings.resend_policy;
        self.run_batch("resend_messages", policy, move |operations, target, selection| async move {
            operations.resend_batch(&target, &selection, policy).await
        })
        .await
    }

    /// Removes every selected message in selection order, then reloads
    pub async fn remove_selected(&self) -> Option<BatchOutcome> {
        let policy = self.settings.remove_policy;
        self.run_batch("remove_messages", policy, move |operations, target, selection| async move {
            operations.remove_batch(&target, &selection, policy).await
        })
        .await
    }

    /// Asks navigation to show one message; the details view can trigger a
    /// refresh of this list through [`UPDATE_MESSAGES`].
    pub fn show_details(&self, message: &MessageHandle) {
        let Some(target) = self.state.target.get() else {
            return;
        };
        self.register_refresh();
        self.actions.invoke(
            OPEN_MESSAGE_DETAILS,
            Some(ViewAction::MessageDetails {
                target,
                message: message.clone(),
            }),
        );
    }

    /// Asks navigation to open the editor for a new message
    pub fn new_message(&self) {
        let Some(target) = self.state.target.get() else {
            return;
        };
        self.register_refresh();
        self.actions
            .invoke(OPEN_NEW_MESSAGE, Some(ViewAction::NewMessage { target }));
    }

    fn register_refresh(&self) {
        let this = self.this.clone();
        self.actions.register(UPDATE_MESSAGES, move |_| {
            let Some(presenter) = this.upgrade() else {
                return;
            };
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        presenter.refresh().await;
                    });
                }
                Err(_) => warn!("Refresh requested outside of a runtime, ignored"),
            }
        });
    }

    async fn run_batch<F, Fut>(
        &self,
        operation: &str,
        policy: BatchPolicy,
        batch: F,
    ) -> Option<BatchOutcome>
    where
        F: FnOnce(Arc<MessageOperationExecutor>, EntityTarget, Vec<MessageHandle>) -> Fut,
        Fut: std::future::Future<Output = BatchOutcome>,
    {
        let Some(_busy) = self.mutating.try_acquire() else {
            debug!("{} ignored, already running", operation);
            return None;
        };
        let target = self.state.target.get()?;
        let selection = self.state.selection.get();
        if selection.is_empty() {
            return None;
        }
        debug!(
            "{} over {} messages ({:?})",
            operation,
            selection.len(),
            policy
        );

        let outcome = batch(self.operations.clone(), target.clone(), selection).await;
        if let Some(e) = outcome.first_error() {
            self.errors.handle(operation, e);
        }
        if !outcome.skipped.is_empty() {
            warn!(
                "{} stopped early, {} messages not processed",
                operation,
                outcome.skipped.len()
            );
        }

        match self.state.reload_ticket(Some(&target)) {
            // a failed reload was already reported
            Some((target, ticket)) => {
                let _ = self.reload(target, ticket).await;
            }
            None => debug!(
                "{} done, list moved on from {}",
                operation,
                target.display_name()
            ),
        }
        Some(outcome)
    }

    async fn reload(&self, target: EntityTarget, ticket: u64) -> ConsoleResult<()> {
        let request = PeekRequest::new(target.clone(), self.settings.peek_page_size);
        let page = match self.browser.peek(&request).await {
            Ok(page) => page,
            Err(e) => {
                self.errors.handle("load_messages", &e);
                return Err(e);
            }
        };

        let state = self.state.clone();
        let page_size = self.settings.peek_page_size;
        self.ui.post(Box::new(move || {
            if !state.is_current(&target, ticket) {
                debug!("Discarding stale message list (ticket {})", ticket);
                return;
            }
            let mut cursor = state.cursor();
            cursor.reset();
            cursor.advance(&page, page_size);
            state.has_more.set(!cursor.is_exhausted());
            drop(cursor);
            state.selection.set(Vec::new());
            state.target.set(Some(target));
            state.messages.set(page);
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{EntityAddress, MemoryBroker, MemoryNamespace, OutgoingMessage, SubQueue};
    use crate::connection::ConnectionRegistry;
    use crate::error::ConsoleError;
    use crate::presenter::{ChannelExecutor, InlineExecutor};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingErrors(Mutex<Vec<(String, ConsoleError)>>);

    impl ErrorHandler for RecordingErrors {
        fn handle(&self, operation: &str, error: &ConsoleError) {
            self.0
                .lock()
                .unwrap()
                .push((operation.to_string(), error.clone()));
        }
    }

    struct Fixture {
        ns: Arc<MemoryNamespace>,
        errors: Arc<RecordingErrors>,
        actions: Arc<ActionBus<ViewAction>>,
        presenter: Arc<MessageListPresenter>,
    }

    async fn fixture_with(ui: Arc<dyn UiExecutor>, page_size: u32) -> Fixture {
        let broker = Arc::new(MemoryBroker::new());
        let ns = broker.namespace("prod.example");
        ns.add_queue("orders");
        ns.add_queue("payments");
        ns.add_topic("billing", &["invoices"]);
        let registry = Arc::new(ConnectionRegistry::new(broker));
        registry
            .add(
                "prod",
                "Endpoint=sb://prod.example/;SharedAccessKeyName=k;SharedAccessKey=v",
            )
            .await
            .unwrap();
        let errors = Arc::new(RecordingErrors::default());
        let actions = Arc::new(ActionBus::new());
        let settings = ConsoleSettings {
            peek_page_size: page_size,
            ..ConsoleSettings::default()
        };
        let presenter = MessageListPresenter::new(
            Arc::new(MessageBrowser::new(registry.clone())),
            Arc::new(MessageOperationExecutor::new(registry)),
            actions.clone(),
            ui,
            errors.clone(),
            settings,
        );
        Fixture {
            ns,
            errors,
            actions,
            presenter,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(InlineExecutor), 100).await
    }

    fn dead_letter_orders(ns: &MemoryNamespace, count: usize) {
        for i in 0..count {
            let seq = ns
                .publish("orders", OutgoingMessage::new(format!("order {}", i)))
                .unwrap()[0];
            ns.dead_letter(&EntityAddress::Queue("orders".into()), seq)
                .unwrap();
        }
    }

    fn sequence_numbers(messages: &[MessageHandle]) -> Vec<i64> {
        messages.iter().map(|m| m.sequence_number).collect()
    }

    #[tokio::test]
    async fn load_splits_composite_display_names() {
        let f = fixture().await;
        f.ns.publish("billing", OutgoingMessage::new("invoice")).unwrap();

        assert!(f.presenter.load("prod", "billing/invoices", false).await);

        let target = f.presenter.state().target.get().unwrap();
        assert_eq!(target.entity, "invoices");
        assert_eq!(target.topic.as_deref(), Some("billing"));
        assert_eq!(f.presenter.state().messages.get().len(), 1);
        assert!(!f.presenter.is_busy());
    }

    #[tokio::test]
    async fn invalid_display_name_goes_to_the_error_handler() {
        let f = fixture().await;
        assert!(!f.presenter.load("prod", "a/b/c", false).await);
        let errors = f.errors.0.lock().unwrap();
        assert!(matches!(errors[0].1, ConsoleError::InvalidEntityName(_)));
        assert!(!f.presenter.is_busy());
    }

    #[tokio::test]
    async fn broker_failure_leaves_the_list_idle() {
        let f = fixture().await;
        f.ns.set_unavailable(true);
        assert!(!f.presenter.load("prod", "orders", false).await);
        assert!(!f.presenter.is_busy());
        assert!(matches!(
            f.errors.0.lock().unwrap()[0].1,
            ConsoleError::BrokerUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn selection_toggles_and_clears_on_refresh() {
        let f = fixture().await;
        dead_letter_orders(&f.ns, 2);
        f.presenter.load("prod", "orders", true).await;
        let messages = f.presenter.state().messages.get();

        f.presenter.toggle_selected(&messages[0]);
        f.presenter.toggle_selected(&messages[1]);
        f.presenter.toggle_selected(&messages[0]);
        assert_eq!(f.presenter.selected_count(), 1);
        assert!(f.presenter.has_selected_messages());

        f.presenter.refresh().await;
        assert!(!f.presenter.has_selected_messages());
    }

    #[tokio::test]
    async fn remove_selected_removes_exactly_the_selection_and_reloads() {
        let f = fixture().await;
        dead_letter_orders(&f.ns, 5);
        f.presenter.load("prod", "orders", true).await;
        let messages = f.presenter.state().messages.get();
        for index in [0, 2, 4] {
            f.presenter.toggle_selected(&messages[index]);
        }

        let outcome = f.presenter.remove_selected().await.unwrap();

        assert_eq!(outcome.succeeded, [1, 3, 5]);
        assert_eq!(sequence_numbers(&f.presenter.state().messages.get()), [2, 4]);
        assert!(!f.presenter.has_selected_messages());
        assert_eq!(
            f.ns.message_count(&SubQueue::active(EntityAddress::Queue("orders".into()))),
            0
        );
    }

    #[tokio::test]
    async fn resend_selected_keeps_sources_and_publishes_copies() {
        let f = fixture().await;
        dead_letter_orders(&f.ns, 2);
        f.presenter.load("prod", "orders", true).await;
        for message in f.presenter.state().messages.get() {
            f.presenter.toggle_selected(&message);
        }

        let outcome = f.presenter.resend_selected().await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(f.presenter.state().messages.get().len(), 2);
        assert_eq!(
            f.ns.message_count(&SubQueue::active(EntityAddress::Queue("orders".into()))),
            2
        );
    }

    #[tokio::test]
    async fn batch_without_selection_does_nothing() {
        let f = fixture().await;
        f.presenter.load("prod", "orders", false).await;
        assert!(f.presenter.remove_selected().await.is_none());
    }

    #[tokio::test]
    async fn load_more_appends_the_next_page() {
        let f = fixture_with(Arc::new(InlineExecutor), 2).await;
        for i in 0..3 {
            f.ns.publish("orders", OutgoingMessage::new(format!("m{}", i)))
                .unwrap();
        }
        f.presenter.load("prod", "orders", false).await;
        assert!(f.presenter.state().has_more.get());

        assert!(f.presenter.load_more().await);
        assert_eq!(
            sequence_numbers(&f.presenter.state().messages.get()),
            [1, 2, 3]
        );
        assert!(!f.presenter.state().has_more.get());
        assert!(!f.presenter.load_more().await);
    }

    #[tokio::test]
    async fn slow_load_finishing_last_does_not_overwrite_a_newer_refresh() {
        let f = fixture().await;
        f.ns.publish("orders", OutgoingMessage::new("old")).unwrap();
        f.ns.delay_next_call(Duration::from_millis(150));

        let presenter = f.presenter.clone();
        let slow = tokio::spawn(async move { presenter.load("prod", "orders", false).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        f.ns.publish("orders", OutgoingMessage::new("new")).unwrap();
        assert!(f.presenter.refresh().await);
        assert_eq!(f.presenter.state().messages.get().len(), 2);

        // the load read one message and answers after the refresh applied
        assert!(slow.await.unwrap());
        assert_eq!(f.presenter.state().messages.get().len(), 2);
    }

    #[tokio::test]
    async fn batch_reload_does_not_replace_a_newer_entity() {
        let f = fixture().await;
        dead_letter_orders(&f.ns, 2);
        f.ns.publish("payments", OutgoingMessage::new("payment")).unwrap();
        f.presenter.load("prod", "orders", true).await;
        let first = f.presenter.state().messages.get().remove(0);
        f.presenter.toggle_selected(&first);
        f.ns.set_latency(Duration::from_millis(50));

        let presenter = f.presenter.clone();
        let batch = tokio::spawn(async move { presenter.remove_selected().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.presenter.load("prod", "payments", false).await);

        assert!(batch.await.unwrap().unwrap().is_success());
        let target = f.presenter.state().target.get().unwrap();
        assert_eq!(target.entity, "payments");
        assert!(!target.dead_letter);
        let messages = f.presenter.state().messages.get();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, b"payment");
        assert_eq!(
            f.ns.message_count(&SubQueue::dead_letter(EntityAddress::Queue("orders".into()))),
            1
        );
    }

    #[tokio::test]
    async fn failed_load_keeps_the_shown_entity() {
        let f = fixture().await;
        f.ns.publish("orders", OutgoingMessage::new("a")).unwrap();
        f.presenter.load("prod", "orders", false).await;
        let before = f.presenter.state().messages.get();

        f.ns.set_unavailable(true);
        assert!(!f.presenter.load("prod", "payments", false).await);

        assert_eq!(f.presenter.state().target.get().unwrap().entity, "orders");
        assert_eq!(f.presenter.state().messages.get(), before);

        // refresh goes back to the entity still on screen
        f.ns.set_unavailable(false);
        f.ns.publish("orders", OutgoingMessage::new("b")).unwrap();
        assert!(f.presenter.refresh().await);
        assert_eq!(f.presenter.state().target.get().unwrap().entity, "orders");
        assert_eq!(f.presenter.state().messages.get().len(), 2);
    }

    #[tokio::test]
    async fn target_changes_together_with_the_messages() {
        let (executor, mut ui_loop) = ChannelExecutor::new();
        let f = fixture_with(Arc::new(executor), 100).await;
        f.ns.publish("orders", OutgoingMessage::new("a")).unwrap();

        assert!(f.presenter.load("prod", "orders", false).await);
        assert!(f.presenter.state().target.get().is_none());

        assert_eq!(ui_loop.run_pending(), 1);
        assert_eq!(f.presenter.state().target.get().unwrap().entity, "orders");
        assert_eq!(f.presenter.state().messages.get().len(), 1);
    }

    #[tokio::test]
    async fn refresh_is_not_blocked_by_paging() {
        let f = fixture_with(Arc::new(InlineExecutor), 1).await;
        for body in ["a", "b"] {
            f.ns.publish("orders", OutgoingMessage::new(body)).unwrap();
        }
        f.presenter.load("prod", "orders", false).await;
        f.ns.delay_next_call(Duration::from_millis(100));

        let presenter = f.presenter.clone();
        let paging = tokio::spawn(async move { presenter.load_more().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.presenter.is_busy());
        assert!(f.presenter.refresh().await);

        // the page belongs to the list the refresh replaced
        paging.await.unwrap();
        assert_eq!(sequence_numbers(&f.presenter.state().messages.get()), [1]);
        assert!(f.presenter.state().has_more.get());
    }

    #[tokio::test]
    async fn refresh_during_a_refresh_runs_afterwards() {
        let f = fixture().await;
        f.ns.publish("orders", OutgoingMessage::new("a")).unwrap();
        f.presenter.load("prod", "orders", false).await;
        f.ns.delay_next_call(Duration::from_millis(100));

        let presenter = f.presenter.clone();
        let running = tokio::spawn(async move { presenter.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        f.ns.publish("orders", OutgoingMessage::new("b")).unwrap();
        assert!(!f.presenter.refresh().await);

        assert!(running.await.unwrap());
        assert_eq!(f.presenter.state().messages.get().len(), 2);
        assert!(!f.presenter.is_busy());
    }

    #[tokio::test]
    async fn details_view_can_refresh_the_list() {
        let f = fixture().await;
        f.ns.publish("orders", OutgoingMessage::new("a")).unwrap();
        f.presenter.load("prod", "orders", false).await;
        let opened = Arc::new(Mutex::new(None));
        let sink = opened.clone();
        f.actions.register(OPEN_MESSAGE_DETAILS, move |payload| {
            *sink.lock().unwrap() = payload;
        });

        let message = f.presenter.state().messages.get().remove(0);
        f.presenter.show_details(&message);

        assert!(matches!(
            opened.lock().unwrap().as_ref(),
            Some(ViewAction::MessageDetails { message: m, .. }) if m.sequence_number == 1
        ));
        assert!(f.actions.is_registered(UPDATE_MESSAGES));

        f.ns.publish("orders", OutgoingMessage::new("b")).unwrap();
        f.actions.invoke(UPDATE_MESSAGES, None);
        for _ in 0..50 {
            if f.presenter.state().messages.get().len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(f.presenter.state().messages.get().len(), 2);
    }
}
