//! In-process domain event bus for Tavern.
//!
//! Producers publish [`DomainEvent`](tavern_types::DomainEvent)s; the bus
//! records each one in its undo/redo history and fans it out to every
//! subscription whose filter matches. One misbehaving subscriber never
//! prevents delivery to the others.
//!
//! # Modules
//!
//! - [`filter`] -- [`EventFilter`] predicate and the [`matches`] function
//! - [`handler`] -- The [`EventHandler`] subscriber trait and closure adapter
//! - [`bus`] -- The [`EventBus`], subscription handles and publish outcomes

pub mod bus;
pub mod filter;
pub mod handler;

pub use bus::{
    DEFAULT_RECENT_EVENTS, EventBus, HandlerFailure, PublishOutcome, SubscriptionHandle,
    SubscriptionId,
};
pub use filter::{EventFilter, KindFilter, OPERATION_TYPE_KEY, matches};
pub use handler::{EventHandler, FnHandler, HandlerError, handler_fn};

use tavern_history::HistoryError;

/// Errors raised while constructing or configuring a bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The history ledger rejected its configuration.
    #[error("history configuration error: {0}")]
    History(#[from] HistoryError),
}
