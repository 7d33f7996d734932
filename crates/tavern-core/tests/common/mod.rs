//! Shared fixtures for service integration tests.

#![allow(clippy::unwrap_used, dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tavern_core::{CharacterService, InMemoryCharacterStore};
use tavern_events::{EventBus, EventHandler, HandlerError};
use tavern_types::{
    AbilityScores, CharacterData, DomainEvent, EventKind, HitPoints, ManualClock, Race,
};

/// Records every event delivered to it.
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<DomainEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.seen.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(DomainEvent::kind).collect()
    }

    pub fn last(&self) -> Option<DomainEvent> {
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

/// A service over a fresh in-memory store and bus sharing one manual clock.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryCharacterStore>,
    pub bus: EventBus,
    pub service: CharacterService,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let store = Arc::new(InMemoryCharacterStore::with_clock(clock.clone()));
        let bus = EventBus::with_clock(100, clock.clone()).unwrap();
        let service = CharacterService::new(store.clone(), bus.clone());
        Self {
            clock,
            store,
            bus,
            service,
        }
    }

    /// Subscribe a recorder that sees everything.
    pub async fn record_all(&self) -> Arc<Recorder> {
        let recorder = Arc::new(Recorder::default());
        self.bus.subscribe(Arc::clone(&recorder), None).await;
        recorder
    }
}

/// A valid level-1 fighter with every ability at 10.
pub fn fighter(name: &str) -> CharacterData {
    CharacterData::new(name, Race::Human, 1, HitPoints::full(12))
        .with_class("Fighter")
        .with_ability_scores(AbilityScores::uniform(10))
}
