//! Single-target callback registry for cross-view coordination
//!
//! A view registers a callback under a key; another view invokes the key to
//! ask for, typically, a refresh after it changed something. Registering a
//! key again replaces the previous callback (last registration wins). This
//! is not multicast pub/sub.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Asks the message list to reload itself
pub const UPDATE_MESSAGES: &str = "update_messages";
/// Opens the details view for one message
pub const OPEN_MESSAGE_DETAILS: &str = "open_message_details";
/// Opens the editor for a new message
pub const OPEN_NEW_MESSAGE: &str = "open_new_message";
/// Opens the message list for a dead-letter entry
pub const OPEN_MESSAGE_LIST: &str = "open_message_list";

type Callback<P> = Arc<dyn Fn(Option<P>) + Send + Sync>;

pub struct ActionBus<P> {
    actions: Mutex<HashMap<String, Callback<P>>>,
}

impl<P> Default for ActionBus<P> {
    fn default() -> Self {
        Self {
            actions: Mutex::new(HashMap::new()),
        }
    }
}

impl<P> ActionBus<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `callback` under `key`, replacing any earlier registration
    pub fn register<F>(&self, key: &str, callback: F)
    where
        F: Fn(Option<P>) + Send + Sync + 'static,
    {
        let replaced = self
            .actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Arc::new(callback))
            .is_some();
        debug!("Registered action {} (replaced: {})", key, replaced);
    }

    /// Runs the callback registered under `key`. Returns false when nothing
    /// is registered, which is not an error.
    pub fn invoke(&self, key: &str, payload: Option<P>) -> bool {
        // release the lock before running, callbacks may register again
        let callback = self
            .actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        match callback {
            Some(callback) => {
                debug!("Invoking action {}", key);
                callback(payload);
                true
            }
            None => {
                debug!("No action registered for {}", key);
                false
            }
        }
    }

    pub fn unregister(&self, key: &str) -> bool {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn last_registration_wins() {
        let bus = ActionBus::<u32>::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        bus.register(UPDATE_MESSAGES, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = second.clone();
        bus.register(UPDATE_MESSAGES, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.invoke(UPDATE_MESSAGES, None));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invoking_unknown_key_is_a_no_op() {
        let bus = ActionBus::<()>::new();
        assert!(!bus.invoke("nobody_listens", None));
    }

    #[test]
    fn payload_reaches_the_callback() {
        let bus = ActionBus::<String>::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        bus.register(OPEN_MESSAGE_DETAILS, move |payload| {
            *sink.lock().unwrap() = payload;
        });

        bus.invoke(OPEN_MESSAGE_DETAILS, Some("orders#4".to_string()));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("orders#4"));
    }

    #[test]
    fn callback_may_reregister_itself() {
        let bus = Arc::new(ActionBus::<()>::new());
        let inner = bus.clone();
        bus.register("once", move |_| {
            inner.register("once", |_| {});
        });
        assert!(bus.invoke("once", None));
        assert!(bus.is_registered("once"));
        assert!(bus.unregister("once"));
        assert!(!bus.invoke("once", None));
    }
}
