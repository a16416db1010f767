//! # Presentation Adapter
//!
//! Framework-neutral view models for the message list and the dead-letter
//! overview. A concrete UI binds to the [`Observable`] fields, subscribes to
//! the busy flags and supplies two collaborators:
//!
//! - a [`UiExecutor`] that runs state updates on its UI context
//! - an [`ErrorHandler`] that receives every failure of a user action
//!
//! Navigation between views goes through the [`ActionBus`](crate::action_bus::ActionBus)
//! with [`ViewAction`] payloads.

pub mod dead_letters;
pub mod executor;
pub mod message_list;
pub mod state;

pub use dead_letters::DeadLettersPresenter;
pub use executor::{
    ChannelExecutor, ErrorHandler, InlineExecutor, TracingErrorHandler, UiExecutor, UiLoop,
    UiTask,
};
pub use message_list::MessageListPresenter;
pub use state::{BusyFlag, BusyGuard, Generation, Observable};

use crate::broker::MessageHandle;
use crate::catalog::EntityTarget;
use crate::dead_letters::DeadLetterInfo;

/// Payload passed to navigation actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    /// Show one message; the target carries the dead-letter flag and topic
    MessageDetails {
        target: EntityTarget,
        message: MessageHandle,
    },
    NewMessage {
        target: EntityTarget,
    },
    MessageList {
        info: DeadLetterInfo,
    },
}
