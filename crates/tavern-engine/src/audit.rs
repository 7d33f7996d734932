//! Audit log subscriber.
//!
//! [`AuditLog`] subscribes to every event on the bus and writes one
//! structured log line per delivery. It also counts deliveries so the
//! final report can show how much traffic observers saw.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use tavern_events::{EventHandler, HandlerError};
use tavern_types::DomainEvent;

/// Logs each delivered event.
#[derive(Debug, Default)]
pub struct AuditLog {
    seen: AtomicU64,
}

impl AuditLog {
    /// Create an audit log with a zero count.
    pub const fn new() -> Self {
        Self {
            seen: AtomicU64::new(0),
        }
    }

    /// Number of events delivered so far, replays included.
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventHandler for AuditLog {
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        self.seen.fetch_add(1, Ordering::Relaxed);
        info!(
            event_id = %event.id,
            kind = ?event.kind(),
            character_id = ?event.character_id(),
            replay = ?event.metadata.replay,
            "event delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tavern_events::EventBus;
    use tavern_types::{CharacterId, DiceRollRecord, EventPayload};

    use super::*;

    fn roll() -> DomainEvent {
        DomainEvent::new(EventPayload::DiceRolled(DiceRollRecord {
            character_id: CharacterId::new(),
            expression: "1d20".to_owned(),
            rolls: vec![12],
            kept: vec![12],
            modifier: 0,
            total: 12,
        }))
    }

    #[tokio::test]
    async fn counts_live_and_replayed_events() {
        let bus = EventBus::new(10).unwrap();
        let audit = Arc::new(AuditLog::new());
        bus.subscribe(Arc::clone(&audit), None).await;

        assert!(bus.publish(roll()).await.is_clean());
        assert!(bus.publish(roll()).await.is_clean());
        assert!(bus.undo().await.is_some());

        assert_eq!(audit.seen(), 3);
    }
}
