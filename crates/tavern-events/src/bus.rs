//! The event bus: publish, subscribe, and replay through history.
//!
//! Publishing stamps the event, appends it to the [`HistoryLedger`] and
//! selects the matching subscriptions while holding the bus lock. The lock
//! is released before any handler runs. Handlers are then driven
//! concurrently; each one's error or panic is caught, logged and recorded
//! in the [`PublishOutcome`] without affecting the others.
//!
//! Undo and redo only notify. They move the history cursor and re-emit an
//! event to subscribers, but never touch whatever store the events
//! describe, and the re-emitted event is not appended to history.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use tavern_history::{HistoryLedger, HistorySnapshot, HistoryStats, invert};
use tavern_types::{Clock, DomainEvent, ReplayDirection, SystemClock};

use crate::BusError;
use crate::filter::{EventFilter, matches};
use crate::handler::EventHandler;

/// Number of events reported by [`EventBus::stats`] unless overridden.
pub const DEFAULT_RECENT_EVENTS: usize = 10;

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Opaque identifier of a subscription, increasing in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SubscriptionId(u64);

impl core::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscription {
    handler: Arc<dyn EventHandler>,
    filter: Option<EventFilter>,
}

/// Returned by [`EventBus::subscribe`]; the only way to remove the
/// subscription.
///
/// Holds a weak reference, so an outstanding handle does not keep the bus
/// alive.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    shared: Weak<Shared>,
}

impl SubscriptionHandle {
    /// The subscription this handle controls.
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscription.
    ///
    /// Returns `true` if it was removed by this call, `false` if it was
    /// already gone or the bus has been dropped.
    pub async fn unsubscribe(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let removed = shared
            .state
            .lock()
            .await
            .subscriptions
            .remove(&self.id)
            .is_some();
        if removed {
            debug!(subscription = %self.id, "unsubscribed");
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A subscriber that did not handle an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerFailure {
    /// Which subscription failed.
    pub subscription: SubscriptionId,
    /// Error message or panic payload.
    pub message: String,
    /// Whether the handler panicked rather than returning an error.
    pub panicked: bool,
}

/// Result of delivering one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// The event as delivered (stamped, and relabeled for replays).
    pub event: DomainEvent,
    /// Number of handlers that completed successfully.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failures: Vec<HandlerFailure>,
}

impl PublishOutcome {
    /// Whether every matching handler succeeded.
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

struct BusState {
    history: HistoryLedger,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    next_id: u64,
}

impl BusState {
    fn matching(&self, event: &DomainEvent) -> Vec<(SubscriptionId, Arc<dyn EventHandler>)> {
        self.subscriptions
            .iter()
            .filter(|(_, sub)| matches(event, sub.filter.as_ref()))
            .map(|(id, sub)| (*id, Arc::clone(&sub.handler)))
            .collect()
    }
}

struct Shared {
    state: Mutex<BusState>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for Shared {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Shared")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

type Targets = Vec<(SubscriptionId, Arc<dyn EventHandler>)>;

/// In-process publish/subscribe hub with an undo/redo history.
///
/// Cloning is cheap; clones share subscriptions and history.
#[derive(Debug, Clone)]
pub struct EventBus {
    shared: Arc<Shared>,
    recent_events: usize,
}

impl EventBus {
    /// Create a bus that keeps `capacity` events of history and stamps
    /// events with the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::History`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, BusError> {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Create a bus stamping events with `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::History`] if `capacity` is zero.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Result<Self, BusError> {
        let history = HistoryLedger::with_capacity(capacity)?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BusState {
                    history,
                    subscriptions: BTreeMap::new(),
                    next_id: 0,
                }),
                clock,
            }),
            recent_events: DEFAULT_RECENT_EVENTS,
        })
    }

    /// Set how many events [`EventBus::stats`] reports.
    #[must_use]
    pub const fn with_recent_events(mut self, recent_events: usize) -> Self {
        self.recent_events = recent_events;
        self
    }

    /// The clock used to stamp events.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.shared.clock)
    }

    /// Register `handler`, optionally restricted by `filter`.
    pub async fn subscribe<H>(&self, handler: H, filter: Option<EventFilter>) -> SubscriptionHandle
    where
        H: EventHandler + 'static,
    {
        let mut state = self.shared.state.lock().await;
        let id = SubscriptionId(state.next_id);
        state.next_id = state.next_id.saturating_add(1);
        state.subscriptions.insert(
            id,
            Subscription {
                handler: Arc::new(handler),
                filter,
            },
        );
        debug!(subscription = %id, total = state.subscriptions.len(), "subscribed");
        SubscriptionHandle {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Number of live subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.shared.state.lock().await.subscriptions.len()
    }

    /// Publish `event` to history and every matching subscriber.
    ///
    /// A missing timestamp is filled in from the bus clock. Handler
    /// failures are reported in the outcome, never as an error.
    pub async fn publish(&self, mut event: DomainEvent) -> PublishOutcome {
        let targets = {
            let mut state = self.shared.state.lock().await;
            if event.timestamp.is_none() {
                event.timestamp = Some(self.shared.clock.now());
            }
            state.history.append(event.clone());
            state.matching(&event)
        };
        debug!(
            event_id = %event.id,
            kind = %event.kind(),
            subscribers = targets.len(),
            "publishing event"
        );
        deliver(event, targets).await
    }

    /// Step history back and notify subscribers with the inverse of the
    /// event now at the cursor.
    ///
    /// Notification only: no store is modified and nothing is appended to
    /// history. Returns `None` when there is nothing to undo.
    pub async fn undo(&self) -> Option<PublishOutcome> {
        self.replay(ReplayDirection::Undo).await
    }

    /// Step history forward and notify subscribers with the event now at
    /// the cursor.
    ///
    /// Notification only, like [`EventBus::undo`]. The re-emitted event
    /// keeps its id and payload, but its timestamp is taken from the bus
    /// clock and `metadata.replay` is set to [`ReplayDirection::Redo`].
    /// Returns `None` when there is nothing to redo.
    pub async fn redo(&self) -> Option<PublishOutcome> {
        self.replay(ReplayDirection::Redo).await
    }

    async fn replay(&self, direction: ReplayDirection) -> Option<PublishOutcome> {
        let (event, targets) = {
            let mut state = self.shared.state.lock().await;
            let stepped = match direction {
                ReplayDirection::Undo => state.history.undo().map(invert),
                ReplayDirection::Redo => state.history.redo().cloned(),
            };
            let mut event = match stepped {
                Ok(event) => event,
                Err(err) => {
                    debug!(?direction, %err, "nothing to replay");
                    return None;
                }
            };
            event.metadata.replay = Some(direction);
            event.timestamp = Some(self.shared.clock.now());
            let targets = state.matching(&event);
            (event, targets)
        };
        debug!(
            event_id = %event.id,
            kind = %event.kind(),
            ?direction,
            subscribers = targets.len(),
            "replaying event"
        );
        Some(deliver(event, targets).await)
    }

    /// Whether [`EventBus::undo`] would do anything.
    pub async fn can_undo(&self) -> bool {
        self.shared.state.lock().await.history.can_undo()
    }

    /// Whether [`EventBus::redo`] would do anything.
    pub async fn can_redo(&self) -> bool {
        self.shared.state.lock().await.history.can_redo()
    }

    /// Events in history, oldest first, optionally narrowed by `filter`.
    pub async fn history(&self, filter: Option<&EventFilter>) -> Vec<DomainEvent> {
        let state = self.shared.state.lock().await;
        state
            .history
            .iter()
            .filter(|event| matches(event, filter))
            .cloned()
            .collect()
    }

    /// Full copy of history including the cursor.
    pub async fn snapshot(&self) -> HistorySnapshot {
        self.shared.state.lock().await.history.snapshot()
    }

    /// Counts by kind plus the most recent events.
    pub async fn stats(&self) -> HistoryStats {
        self.shared
            .state
            .lock()
            .await
            .history
            .stats(self.recent_events)
    }

    /// Forget all history. Subscriptions are kept.
    pub async fn clear_history(&self) {
        self.shared.state.lock().await.history.clear();
        debug!("history cleared");
    }
}

async fn deliver(event: DomainEvent, targets: Targets) -> PublishOutcome {
    let calls = targets.iter().map(|(id, handler)| {
        let event = &event;
        async move {
            let result = AssertUnwindSafe(async move { handler.handle(event).await })
                .catch_unwind()
                .await;
            (*id, result)
        }
    });
    let results = join_all(calls).await;

    let mut delivered: usize = 0;
    let mut failures = Vec::new();
    for (subscription, result) in results {
        match result {
            Ok(Ok(())) => delivered = delivered.saturating_add(1),
            Ok(Err(err)) => {
                warn!(%subscription, event_id = %event.id, error = %err, "event handler failed");
                failures.push(HandlerFailure {
                    subscription,
                    message: err.to_string(),
                    panicked: false,
                });
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%subscription, event_id = %event.id, panic = %message, "event handler panicked");
                failures.push(HandlerFailure {
                    subscription,
                    message,
                    panicked: true,
                });
            }
        }
    }

    PublishOutcome {
        event,
        delivered,
        failures,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::arithmetic_side_effects)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use tavern_types::{
        CharacterChange, CharacterId, EventKind, EventPayload, HitPointChange, HitPoints,
        ManualClock,
    };

    use super::*;
    use crate::handler::{HandlerError, handler_fn};

    /// Records every event it sees.
    #[derive(Default)]
    struct Recorder {
        seen: StdMutex<Vec<DomainEvent>>,
    }

    impl Recorder {
        fn kinds(&self) -> Vec<EventKind> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(DomainEvent::kind)
                .collect()
        }

        fn len(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn last(&self) -> Option<DomainEvent> {
            self.seen.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        async fn handle(&self, _event: &DomainEvent) -> Result<(), HandlerError> {
            Err(HandlerError::new("subscriber offline"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl EventHandler for Panicking {
        async fn handle(&self, _event: &DomainEvent) -> Result<(), HandlerError> {
            panic!("subscriber exploded");
        }
    }

    fn change(character_id: CharacterId) -> CharacterChange {
        CharacterChange {
            character_id,
            previous_state: None,
            new_state: None,
            changes: None,
        }
    }

    fn created(id: CharacterId) -> DomainEvent {
        DomainEvent::new(EventPayload::Created(change(id)))
    }

    fn updated(id: CharacterId) -> DomainEvent {
        DomainEvent::new(EventPayload::Updated(change(id)))
    }

    fn damaged(id: CharacterId) -> DomainEvent {
        DomainEvent::new(EventPayload::DamageApplied(HitPointChange {
            character_id: id,
            amount: 2,
            previous: HitPoints::full(9),
            current: HitPoints {
                max: 9,
                current: 7,
                temporary: 0,
            },
        }))
    }

    const fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected() {
        assert!(EventBus::new(0).is_err());
    }

    #[tokio::test]
    async fn publish_stamps_appends_and_delivers() {
        let clock = Arc::new(ManualClock::new(epoch()));
        let bus = EventBus::with_clock(10, clock.clone()).unwrap();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(Arc::clone(&recorder), None).await;

        let outcome = bus.publish(created(CharacterId::new())).await;
        assert_eq!(outcome.delivered, 1);
        assert!(outcome.is_clean());
        assert_eq!(outcome.event.timestamp, Some(epoch()));
        assert_eq!(bus.history(None).await.len(), 1);
        assert_eq!(recorder.kinds(), vec![EventKind::Created]);
    }

    #[tokio::test]
    async fn existing_timestamp_is_kept() {
        let bus = EventBus::new(10).unwrap();
        let stamped = epoch() + Duration::days(1);
        let event = created(CharacterId::new()).with_timestamp(stamped);
        let outcome = bus.publish(event).await;
        assert_eq!(outcome.event.timestamp, Some(stamped));
    }

    #[tokio::test]
    async fn filters_select_subscribers() {
        let bus = EventBus::new(10).unwrap();
        let wanted = CharacterId::new();
        let filtered = Arc::new(Recorder::default());
        let everything = Arc::new(Recorder::default());
        let filter = EventFilter::new()
            .character(wanted)
            .kind(EventKind::Updated);
        bus.subscribe(Arc::clone(&filtered), Some(filter)).await;
        bus.subscribe(Arc::clone(&everything), None).await;

        bus.publish(updated(wanted)).await;
        bus.publish(updated(CharacterId::new())).await;
        bus.publish(created(wanted)).await;

        assert_eq!(filtered.len(), 1);
        assert_eq!(everything.len(), 3);
    }

    #[tokio::test]
    async fn failing_and_panicking_handlers_are_isolated() {
        let bus = EventBus::new(10).unwrap();
        let before = Arc::new(Recorder::default());
        let after = Arc::new(Recorder::default());
        bus.subscribe(Arc::clone(&before), None).await;
        let failing = bus.subscribe(Failing, None).await;
        let panicking = bus.subscribe(Panicking, None).await;
        bus.subscribe(Arc::clone(&after), None).await;

        let outcome = bus.publish(created(CharacterId::new())).await;

        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.failures.len(), 2);
        let failed = outcome
            .failures
            .iter()
            .find(|f| f.subscription == failing.id())
            .unwrap();
        assert!(!failed.panicked);
        assert_eq!(failed.message, "subscriber offline");
        let panicked = outcome
            .failures
            .iter()
            .find(|f| f.subscription == panicking.id())
            .unwrap();
        assert!(panicked.panicked);
        assert_eq!(panicked.message, "subscriber exploded");

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 1);
        assert_eq!(bus.history(None).await.len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let bus = EventBus::new(10).unwrap();
        let recorder = Arc::new(Recorder::default());
        let handle = bus.subscribe(Arc::clone(&recorder), None).await;
        let other = bus.subscribe(Arc::new(Recorder::default()), None).await;
        assert_eq!(bus.subscriber_count().await, 2);

        assert!(handle.unsubscribe().await);
        assert!(!handle.unsubscribe().await);
        assert_eq!(bus.subscriber_count().await, 1);
        assert_ne!(handle.id(), other.id());

        bus.publish(created(CharacterId::new())).await;
        assert_eq!(recorder.len(), 0);
    }

    #[tokio::test]
    async fn handle_does_not_keep_bus_alive() {
        let bus = EventBus::new(10).unwrap();
        let handle = bus.subscribe(Failing, None).await;
        drop(bus);
        assert!(!handle.unsubscribe().await);
    }

    #[tokio::test]
    async fn closure_handlers_receive_events() {
        let bus = EventBus::new(10).unwrap();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(
            handler_fn(move |event: DomainEvent| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(event.id);
                    Ok(())
                }
            }),
            None,
        )
        .await;

        let outcome = bus.publish(created(CharacterId::new())).await;
        assert_eq!(*seen.lock().unwrap(), vec![outcome.event.id]);
    }

    #[tokio::test]
    async fn handlers_see_their_event_in_history() {
        let bus = EventBus::new(10).unwrap();
        let found = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&found);
        let reader = bus.clone();
        bus.subscribe(
            handler_fn(move |event: DomainEvent| {
                let sink = Arc::clone(&sink);
                let reader = reader.clone();
                async move {
                    let history = reader.history(None).await;
                    let present = history.iter().any(|past| past.id == event.id);
                    sink.lock().unwrap().push(present);
                    Ok(())
                }
            }),
            None,
        )
        .await;

        let outcome = bus.publish(created(CharacterId::new())).await;
        assert!(outcome.is_clean());
        assert_eq!(*found.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn undo_emits_inverse_without_appending() {
        let clock = Arc::new(ManualClock::new(epoch()));
        let bus = EventBus::with_clock(10, clock.clone()).unwrap();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(Arc::clone(&recorder), None).await;

        let id = CharacterId::new();
        bus.publish(updated(id)).await;
        bus.publish(damaged(id)).await;
        bus.publish(updated(id)).await;
        clock.advance(Duration::seconds(30));

        // Cursor moves from the second update onto the damage event, whose
        // inverse is a healing notification.
        let outcome = bus.undo().await.unwrap();
        assert_eq!(outcome.event.kind(), EventKind::HealingReceived);
        assert_eq!(outcome.event.metadata.replay, Some(ReplayDirection::Undo));
        assert_eq!(
            outcome.event.timestamp,
            Some(epoch() + Duration::seconds(30))
        );
        assert_eq!(
            recorder.last().map(|e| e.kind()),
            Some(EventKind::HealingReceived)
        );
        assert_eq!(bus.history(None).await.len(), 3);
        assert!(bus.can_redo().await);
    }

    #[tokio::test]
    async fn redo_replays_event_at_new_cursor() {
        let clock = Arc::new(ManualClock::new(epoch()));
        let bus = EventBus::with_clock(10, clock.clone()).unwrap();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(Arc::clone(&recorder), None).await;

        let id = CharacterId::new();
        bus.publish(created(id)).await;
        let second = bus.publish(damaged(id)).await.event;

        bus.undo().await.unwrap();
        clock.advance(Duration::minutes(5));
        let outcome = bus.redo().await.unwrap();
        assert_eq!(outcome.event.kind(), EventKind::DamageApplied);
        assert_eq!(outcome.event.id, second.id);
        assert_eq!(outcome.event.payload, second.payload);
        assert_eq!(outcome.event.metadata.replay, Some(ReplayDirection::Redo));
        assert_eq!(second.timestamp, Some(epoch()));
        assert_eq!(
            outcome.event.timestamp,
            Some(epoch() + Duration::minutes(5))
        );
        assert!(!bus.can_redo().await);
        assert_eq!(recorder.len(), 4);
    }

    #[tokio::test]
    async fn boundaries_are_quiet() {
        let bus = EventBus::new(10).unwrap();
        assert!(bus.undo().await.is_none());
        assert!(bus.redo().await.is_none());

        bus.publish(created(CharacterId::new())).await;
        assert!(!bus.can_undo().await);
        assert!(bus.undo().await.is_none());
        assert!(bus.redo().await.is_none());
    }

    #[tokio::test]
    async fn publishing_after_undo_truncates_redo_branch() {
        let bus = EventBus::new(10).unwrap();
        let id = CharacterId::new();
        let a = bus.publish(created(id)).await.event;
        let b = bus.publish(updated(id)).await.event;
        bus.publish(damaged(id)).await;

        bus.undo().await.unwrap();
        let d = bus.publish(updated(id)).await.event;

        let history: Vec<_> = bus.history(None).await.iter().map(|e| e.id).collect();
        assert_eq!(history, vec![a.id, b.id, d.id]);
        assert!(!bus.can_redo().await);
    }

    #[tokio::test]
    async fn history_filter_and_stats() {
        let bus = EventBus::new(3).unwrap().with_recent_events(2);
        let id = CharacterId::new();
        for _ in 0..4 {
            bus.publish(updated(id)).await;
        }
        bus.publish(created(id)).await;

        let only_created = EventFilter::new().kind(EventKind::Created);
        assert_eq!(bus.history(Some(&only_created)).await.len(), 1);

        let stats = bus.stats().await;
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.events_by_kind.get(&EventKind::Updated), Some(&2));
        assert_eq!(stats.recent_events.len(), 2);

        bus.clear_history().await;
        assert_eq!(bus.snapshot().await.cursor, None);
    }
}
