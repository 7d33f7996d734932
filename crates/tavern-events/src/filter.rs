//! Subscription filters.
//!
//! An [`EventFilter`] is a conjunction: every field that is set must match
//! the event, and unset fields match anything. A missing filter matches
//! every event.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tavern_types::{CampaignId, CharacterId, DomainEvent, EventKind, OperationType};

/// Metadata key that also matches the typed operation type.
pub const OPERATION_TYPE_KEY: &str = "operationType";

/// One kind or a set of kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KindFilter {
    /// Match exactly this kind.
    One(EventKind),
    /// Match any of these kinds.
    Any(Vec<EventKind>),
}

impl KindFilter {
    fn contains(&self, kind: EventKind) -> bool {
        match self {
            Self::One(expected) => *expected == kind,
            Self::Any(kinds) => kinds.contains(&kind),
        }
    }
}

/// Predicate deciding whether a subscription sees an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventFilter {
    /// Event kind(s).
    pub kind: Option<KindFilter>,
    /// Character the payload concerns.
    pub character_id: Option<CharacterId>,
    /// Campaign the event is scoped to.
    pub campaign_id: Option<CampaignId>,
    /// Target identity on the envelope.
    pub target_id: Option<CharacterId>,
    /// Whether the event must (or must not) be global.
    pub global: Option<bool>,
    /// CRUD category recorded in metadata.
    pub operation_type: Option<OperationType>,
    /// Metadata entries that must be present with equal values.
    pub metadata_match: Option<BTreeMap<String, serde_json::Value>>,
}

impl EventFilter {
    /// A filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a single kind.
    #[must_use]
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(KindFilter::One(kind));
        self
    }

    /// Require any of `kinds`.
    #[must_use]
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kind = Some(KindFilter::Any(kinds.into_iter().collect()));
        self
    }

    /// Require the payload to concern `character_id`.
    #[must_use]
    pub const fn character(mut self, character_id: CharacterId) -> Self {
        self.character_id = Some(character_id);
        self
    }

    /// Require campaign scope `campaign_id`.
    #[must_use]
    pub const fn campaign(mut self, campaign_id: CampaignId) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    /// Require target `target_id`.
    #[must_use]
    pub const fn target(mut self, target_id: CharacterId) -> Self {
        self.target_id = Some(target_id);
        self
    }

    /// Require the event to be global (or not).
    #[must_use]
    pub const fn global(mut self, global: bool) -> Self {
        self.global = Some(global);
        self
    }

    /// Require metadata operation type `operation_type`.
    #[must_use]
    pub const fn operation(mut self, operation_type: OperationType) -> Self {
        self.operation_type = Some(operation_type);
        self
    }

    /// Require metadata entry `key` to equal `value`.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata_match
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    /// Evaluate the filter against `event`.
    pub fn matches(&self, event: &DomainEvent) -> bool {
        if let Some(kind) = &self.kind
            && !kind.contains(event.kind())
        {
            return false;
        }
        if let Some(character_id) = self.character_id
            && event.character_id() != Some(character_id)
        {
            return false;
        }
        if let Some(campaign_id) = self.campaign_id
            && event.campaign_id() != Some(campaign_id)
        {
            return false;
        }
        if let Some(target_id) = self.target_id
            && event.target_id != Some(target_id)
        {
            return false;
        }
        if let Some(global) = self.global
            && event.is_global() != global
        {
            return false;
        }
        if let Some(operation_type) = self.operation_type
            && event.metadata.operation_type != Some(operation_type)
        {
            return false;
        }
        let Some(entries) = &self.metadata_match else {
            return true;
        };
        entries
            .iter()
            .all(|(key, value)| metadata_has(event, key, value))
    }
}

fn metadata_has(event: &DomainEvent, key: &str, value: &serde_json::Value) -> bool {
    if event.metadata.extra.get(key) == Some(value) {
        return true;
    }
    key == OPERATION_TYPE_KEY
        && event
            .metadata
            .operation_type
            .is_some_and(|operation| value.as_str() == Some(operation.as_str()))
}

/// Whether a subscription with `filter` should receive `event`.
pub fn matches(event: &DomainEvent, filter: Option<&EventFilter>) -> bool {
    filter.is_none_or(|filter| filter.matches(event))
}
