use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Supplies connection strings by connection name
///
/// Secure persistence lives outside this crate (OS keychain, vault, ...);
/// the engine only ever reads through this trait and never writes secrets
/// to its own configuration files.
pub trait CredentialStore: Send + Sync {
    fn credential(&self, connection_name: &str) -> Option<String>;
}

/// Volatile store, useful for tests and for credentials entered at runtime
#[derive(Default)]
pub struct MemoryCredentialStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn insert(&self, connection_name: &str, connection_string: &str) {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection_name.to_string(), connection_string.to_string());
    }

    pub fn remove(&self, connection_name: &str) {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_name);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credential(&self, connection_name: &str) -> Option<String> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connection_name)
            .cloned()
    }
}
