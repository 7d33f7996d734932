//! Bounded undo/redo history for Tavern domain events.
//!
//! Every event published on the bus is appended here. The ledger keeps a
//! cursor into the sequence so recent events can be stepped back over and
//! re-applied, and it never grows beyond its configured capacity. The
//! ledger never panics; it returns errors.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`HistoryLedger`] struct: bounded, cursor-addressed log.
//! - [`inverse`] -- Inverse kinds and inverse events for undo notifications.
//!
//! # Usage
//!
//! ```
//! use tavern_history::HistoryLedger;
//! use tavern_types::{CharacterId, DiceRollRecord, DomainEvent, EventPayload};
//!
//! let roll = |total| {
//!     DomainEvent::new(EventPayload::DiceRolled(DiceRollRecord {
//!         character_id: CharacterId::new(),
//!         expression: "1d20".to_owned(),
//!         rolls: vec![],
//!         kept: vec![],
//!         modifier: 0,
//!         total,
//!     }))
//! };
//!
//! let mut ledger = HistoryLedger::with_capacity(2).ok();
//! if let Some(ledger) = ledger.as_mut() {
//!     ledger.append(roll(4));
//!     ledger.append(roll(17));
//!     ledger.append(roll(9));
//!     assert_eq!(ledger.len(), 2);
//!     assert!(ledger.can_undo());
//! }
//! ```

pub mod inverse;
pub mod ledger;

// Re-export primary types at crate root.
pub use inverse::{inverse_kind, invert};
pub use ledger::{HistoryLedger, HistorySnapshot, HistoryStats};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when operating on the history ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The cursor is already at the boundary in the requested direction.
    #[error("no history available in that direction")]
    NoHistory,

    /// The ledger was constructed with a capacity it cannot honour.
    #[error("history capacity must be at least 1, got {capacity}")]
    InvalidCapacity {
        /// The rejected capacity.
        capacity: usize,
    },
}
