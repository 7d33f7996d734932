//! The history ledger: a bounded, cursor-addressed sequence of events.
//!
//! The [`HistoryLedger`] keeps the most recent published events in order
//! and a cursor pointing at the "current" one. Undo moves the cursor back,
//! redo moves it forward, and appending while the cursor is behind the end
//! discards the redo branch first.
//!
//! # Invariants
//!
//! - `cursor` is `None` exactly when the ledger is empty; otherwise it is a
//!   valid index.
//! - History is linear: there is never more than one redo branch.
//! - `len() <= capacity()`; the oldest events are evicted first.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tracing::trace;

use tavern_types::{DomainEvent, EventKind};

use crate::HistoryError;

// ---------------------------------------------------------------------------
// Snapshot and statistics
// ---------------------------------------------------------------------------

/// A point-in-time copy of the ledger contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySnapshot {
    /// Events, oldest first.
    pub events: Vec<DomainEvent>,
    /// Index of the current event, or `None` if empty.
    pub cursor: Option<usize>,
}

/// Aggregate counts over the ledger contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    /// Number of events held.
    pub total_events: usize,
    /// Event count per kind.
    pub events_by_kind: BTreeMap<EventKind, usize>,
    /// The last few events, oldest first.
    pub recent_events: Vec<DomainEvent>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Bounded undo/redo history of published events.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    /// Events, oldest at the front.
    events: VecDeque<DomainEvent>,
    /// Index of the current event.
    cursor: Option<usize>,
    /// Maximum number of events retained.
    capacity: usize,
}

impl HistoryLedger {
    /// Create an empty ledger that retains at most `capacity` events.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidCapacity`] if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::InvalidCapacity { capacity });
        }
        Ok(Self {
            events: VecDeque::with_capacity(capacity),
            cursor: None,
            capacity,
        })
    }

    /// Return the maximum number of events retained.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the number of events held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Return whether the ledger holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Return the cursor position.
    pub const fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Return the event at the cursor.
    pub fn current(&self) -> Option<&DomainEvent> {
        self.cursor.and_then(|index| self.events.get(index))
    }

    /// Iterate over the events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DomainEvent> {
        self.events.iter()
    }

    /// Append an event and move the cursor onto it.
    ///
    /// Any events after the cursor (the redo branch) are discarded first.
    /// If the ledger then exceeds its capacity the oldest events are
    /// evicted.
    pub fn append(&mut self, event: DomainEvent) {
        let keep = self.cursor.map_or(0, |cursor| cursor.saturating_add(1));
        if keep < self.events.len() {
            let discarded = self.events.len().saturating_sub(keep);
            self.events.truncate(keep);
            trace!(discarded, "discarded redo branch");
        }

        trace!(event_id = %event.id, kind = %event.kind(), "appending to history");
        self.events.push_back(event);

        let mut evicted: usize = 0;
        while self.events.len() > self.capacity {
            self.events.pop_front();
            evicted = evicted.saturating_add(1);
        }
        if evicted > 0 {
            trace!(evicted, capacity = self.capacity, "evicted oldest history");
        }

        self.cursor = self.events.len().checked_sub(1);
    }

    /// Whether there is an earlier event to step back to.
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    /// Whether there is a later event to step forward to.
    pub fn can_redo(&self) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor.saturating_add(1) < self.events.len())
    }

    /// Move the cursor back one step and return the event now at the
    /// cursor.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NoHistory`] if the cursor is already at the
    /// oldest event or the ledger is empty.
    pub fn undo(&mut self) -> Result<&DomainEvent, HistoryError> {
        if !self.can_undo() {
            return Err(HistoryError::NoHistory);
        }
        let target = self.cursor.map_or(0, |cursor| cursor.saturating_sub(1));
        self.cursor = Some(target);
        trace!(cursor = target, "history cursor moved back");
        self.events.get(target).ok_or(HistoryError::NoHistory)
    }

    /// Move the cursor forward one step and return the event now at the
    /// cursor.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NoHistory`] if the cursor is already at the
    /// newest event or the ledger is empty.
    pub fn redo(&mut self) -> Result<&DomainEvent, HistoryError> {
        if !self.can_redo() {
            return Err(HistoryError::NoHistory);
        }
        let target = self.cursor.map_or(0, |cursor| cursor.saturating_add(1));
        self.cursor = Some(target);
        trace!(cursor = target, "history cursor moved forward");
        self.events.get(target).ok_or(HistoryError::NoHistory)
    }

    /// Drop every event and reset the cursor.
    pub fn clear(&mut self) {
        self.events.clear();
        self.cursor = None;
    }

    /// Copy the current contents.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            events: self.events.iter().cloned().collect(),
            cursor: self.cursor,
        }
    }

    /// Count events by kind and collect the last `recent` events.
    pub fn stats(&self, recent: usize) -> HistoryStats {
        let mut events_by_kind: BTreeMap<EventKind, usize> = BTreeMap::new();
        for event in &self.events {
            let count = events_by_kind.entry(event.kind()).or_insert(0);
            *count = count.saturating_add(1);
        }
        let skip = self.events.len().saturating_sub(recent);
        HistoryStats {
            total_events: self.events.len(),
            events_by_kind,
            recent_events: self.events.iter().skip(skip).cloned().collect(),
        }
    }
}
