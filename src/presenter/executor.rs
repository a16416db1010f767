use crate::error::ConsoleError;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Unit of work that has to run on the UI context
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Marshals state updates onto the UI-bound execution context
pub trait UiExecutor: Send + Sync {
    fn post(&self, task: UiTask);
}

/// Runs tasks immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl UiExecutor for InlineExecutor {
    fn post(&self, task: UiTask) {
        task();
    }
}

/// Queues tasks for a UI loop that drains them on its own thread
#[derive(Clone)]
pub struct ChannelExecutor {
    tx: mpsc::UnboundedSender<UiTask>,
}

/// Receiving side of a [`ChannelExecutor`]
pub struct UiLoop {
    rx: mpsc::UnboundedReceiver<UiTask>,
}

impl ChannelExecutor {
    pub fn new() -> (Self, UiLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UiLoop { rx })
    }
}

impl UiExecutor for ChannelExecutor {
    fn post(&self, task: UiTask) {
        if self.tx.send(task).is_err() {
            warn!("UI loop is gone, dropping update");
        }
    }
}

impl UiLoop {
    /// Runs every task queued so far, returns how many ran
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Runs tasks until every executor handle is dropped
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            task();
        }
        debug!("UI loop finished");
    }
}

/// Central sink for failures of user-invoked operations
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, operation: &str, error: &ConsoleError);
}

/// Logs failures; expected ones (already consumed messages) only as warnings
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn handle(&self, operation: &str, error: &ConsoleError) {
        if error.is_expected() {
            warn!("{}: {}", operation, error);
        } else {
            error!("{} failed: {}", operation, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn channel_executor_defers_until_drained() {
        let (executor, mut ui_loop) = ChannelExecutor::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = counter.clone();
            executor.post(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(ui_loop.run_pending(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn ui_loop_stops_when_executors_are_dropped() {
        let (executor, ui_loop) = ChannelExecutor::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let inner = counter.clone();
        executor.post(Box::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }));
        drop(executor);
        ui_loop.run().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
