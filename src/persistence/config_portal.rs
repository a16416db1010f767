//! # Configuration Portal
//!
//! Shared, lock-guarded access to the console configuration.
//!
//! Each section lives in its own `Arc<RwLock<T>>` so reading the settings
//! never waits on a connection list update. All access goes through
//! [`ConfigPortal::execute_portal_action`], which acquires locks with the
//! bounded retry of the `try_lock!` macro: five attempts 10ms apart, then
//! [`Error::LockTimeout`] instead of blocking.

use crate::error::ConsoleError;
use crate::try_lock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{ConnectionsConfig, ConsoleConfig, ConsoleSettings};

#[derive(Default, Debug)]
pub struct ConfigPortal {
    pub settings: Arc<RwLock<ConsoleSettings>>,
    pub connections: Arc<RwLock<ConnectionsConfig>>,
    /// File the configuration is saved to
    path: PathBuf,
}

impl ConfigPortal {
    pub fn new(config: ConsoleConfig, path: PathBuf) -> Self {
        Self {
            settings: Arc::new(RwLock::new(config.settings)),
            connections: Arc::new(RwLock::new(config.connections)),
            path,
        }
    }

    /// Loads `path` (defaults when missing) into a new portal
    pub async fn load(path: PathBuf) -> Result<Self, ConsoleError> {
        let config = ConsoleConfig::load(&path).await?;
        Ok(Self::new(config, path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current content of every section
    pub async fn snapshot(&self) -> ConsoleConfig {
        ConsoleConfig {
            settings: self.settings.read().await.clone(),
            connections: self.connections.read().await.clone(),
        }
    }

    pub async fn save(&self) -> Result<(), ConsoleError> {
        self.snapshot().await.save(&self.path).await
    }

    /// Runs one configuration operation with bounded lock retry.
    ///
    /// ```ignore
    /// let settings = match portal.execute_portal_action(PortalAction::GetSettings) {
    ///     ConfigResult::Settings(settings) => settings,
    ///     ConfigResult::Failed(e) => return Err(e.into()),
    ///     _ => unreachable!(),
    /// };
    /// ```
    pub fn execute_portal_action(&self, action: PortalAction) -> ConfigResult {
        debug!("Portal action {:?}", action);
        let result = match action {
            PortalAction::GetSettings => {
                try_lock!(@read_lock_retry, self.settings.clone(), |guard: &ConsoleSettings| {
                    ConfigResult::Settings(guard.clone())
                })
            }
            PortalAction::GetPageSize => {
                try_lock!(@read_lock_retry, self.settings.clone(), |guard: &ConsoleSettings| {
                    ConfigResult::PageSize(guard.peek_page_size)
                })
            }
            PortalAction::WriteSettings(settings) => {
                try_lock!(@write_lock_retry, self.settings.clone(), |guard: &mut ConsoleSettings| {
                    *guard = settings;
                })
            }
            PortalAction::WritePageSize(page_size) => {
                if page_size == 0 {
                    Err(Error::InvalidOperation(
                        "peek page size must be positive".to_string(),
                    ))
                } else {
                    try_lock!(@write_lock_retry, self.settings.clone(), |guard: &mut ConsoleSettings| {
                        guard.peek_page_size = page_size;
                    })
                }
            }

            PortalAction::GetConnectionNames => {
                try_lock!(@read_lock_retry, self.connections.clone(), |guard: &ConnectionsConfig| {
                    ConfigResult::ConnectionNames(guard.names.clone())
                })
            }
            PortalAction::AddConnectionName(name) => {
                try_lock!(@write_lock_retry, self.connections.clone(), |guard: &mut ConnectionsConfig| {
                    guard.insert(&name);
                })
            }
            PortalAction::RemoveConnectionName(name) => {
                try_lock!(@write_lock_retry, self.connections.clone(), |guard: &mut ConnectionsConfig| {
                    guard.remove(&name);
                })
            }
        };

        match result {
            Ok(res) => res,
            Err(e) => ConfigResult::Failed(e),
        }
    }
}

/// Every operation the portal supports
#[derive(Debug)]
pub enum PortalAction {
    GetSettings,
    GetPageSize,
    WriteSettings(ConsoleSettings),
    WritePageSize(u32),

    GetConnectionNames,
    AddConnectionName(String),
    RemoveConnectionName(String),
}

#[derive(Debug)]
pub enum ConfigResult {
    Success,
    Settings(ConsoleSettings),
    PageSize(u32),
    ConnectionNames(Vec<String>),
    Failed(Error),
}

/// Acquires a portal lock with up to five attempts 10ms apart.
///
/// `@write_lock_retry` runs the operation on the guard and yields
/// `ConfigResult::Success`; `@read_lock_retry` yields the operation's value.
#[macro_export]
macro_rules! try_lock {
    (@write_lock_retry, $accessor:expr, $operation:expr) => {{
        let mut attempts = 0;
        const MAX_ATTEMPTS: usize = 5;

        loop {
            match $accessor.try_write() {
                Ok(mut guard) => {
                    $operation(&mut *guard);
                    break Ok($crate::persistence::config_portal::ConfigResult::Success);
                }
                Err(e) => {
                    attempts += 1;
                    tracing::warn!(
                        "Write lock blocked: {} (attempt {}/{})",
                        e,
                        attempts,
                        MAX_ATTEMPTS
                    );

                    if attempts >= MAX_ATTEMPTS {
                        break Err($crate::persistence::config_portal::Error::LockTimeout);
                    }

                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }
    }};

    (@read_lock_retry, $accessor:expr, $operation:expr) => {{
        let mut attempts = 0;
        const MAX_ATTEMPTS: usize = 5;

        loop {
            match $accessor.try_read() {
                Ok(guard) => {
                    let result = $operation(&*guard);
                    break Ok(result);
                }
                Err(e) => {
                    attempts += 1;
                    tracing::warn!(
                        "Read lock blocked: {} (attempt {}/{})",
                        e,
                        attempts,
                        MAX_ATTEMPTS
                    );

                    if attempts >= MAX_ATTEMPTS {
                        break Err($crate::persistence::config_portal::Error::LockTimeout);
                    }

                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }
    }};
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Could not acquire lock after maximum retry attempts")]
    LockTimeout,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<Error> for ConsoleError {
    fn from(e: Error) -> Self {
        ConsoleError::Config(e.to_string())
    }
}
