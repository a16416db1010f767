//! Connection and message management engine for a Service Bus style broker
//! console: named connections, entity discovery, non-destructive browsing,
//! resend/remove of messages and a dead-letter overview across connections.

pub mod action_bus;
pub mod broker;
pub mod browser;
pub mod catalog;
pub mod connection;
pub mod console;
pub mod dead_letters;
pub mod error;
pub mod operations;
pub mod persistence;
pub mod presenter;

pub use console::ServiceBusConsole;
pub use error::{ConsoleError, ConsoleResult};
