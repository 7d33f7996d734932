//! Domain events: the envelope, its scope and metadata, and one payload
//! type per event kind.
//!
//! The payload is a tagged union. [`EventPayload::kind`] derives the
//! [`EventKind`] from the variant, so handlers can match exhaustively and
//! a kind can never be paired with the wrong payload shape. On the wire
//! the payload serializes as `{ "kind": "UPDATED", "data": { ... } }`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::character::{Character, CharacterPatch, HitPoints};
use crate::enums::{Ability, EventKind, OperationType, ReplayDirection, Skill};
use crate::ids::{CampaignId, CharacterId, EventId, UserId};

// ---------------------------------------------------------------------------
// Envelope parts
// ---------------------------------------------------------------------------

/// Where an event belongs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EventScope {
    /// Belongs to one campaign's characters.
    Campaign(CampaignId),
    /// Cross-cutting (errors and other system-wide notices).
    Global,
    /// Concerns a character outside any campaign.
    #[default]
    Unscoped,
}

impl EventScope {
    /// Scope for a character that may or may not belong to a campaign.
    pub const fn for_campaign(campaign_id: Option<CampaignId>) -> Self {
        match campaign_id {
            Some(id) => Self::Campaign(id),
            None => Self::Unscoped,
        }
    }
}

/// Free-form annotations carried next to the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventMetadata {
    /// CRUD category of the mutation that produced the event.
    #[serde(default)]
    pub operation_type: Option<OperationType>,
    /// Set when the event was re-emitted by undo or redo.
    #[serde(default)]
    pub replay: Option<ReplayDirection>,
    /// Caller-defined annotations.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Before/after view of a create, update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CharacterChange {
    /// The character the change applies to.
    pub character_id: CharacterId,
    /// State before the mutation (absent for creates).
    pub previous_state: Option<Box<Character>>,
    /// State after the mutation (absent for deletes).
    pub new_state: Option<Box<Character>>,
    /// The patch that was applied (updates only).
    pub changes: Option<CharacterPatch>,
}

/// Delta of a single ability score change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AbilityScoreChange {
    /// The character the change applies to.
    pub character_id: CharacterId,
    /// Which ability changed.
    pub ability: Ability,
    /// Score before the change (10 if it was never set).
    pub old_score: i32,
    /// Score after the change.
    pub new_score: i32,
    /// Modifier derived from `old_score`.
    pub old_modifier: i32,
    /// Modifier derived from `new_score`.
    pub new_modifier: i32,
    /// `new_modifier - old_modifier`.
    pub modifier_change: i32,
    /// State after the change.
    pub new_state: Option<Box<Character>>,
}

/// A saving throw proficiency being granted or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SavingThrowChange {
    /// The character the change applies to.
    pub character_id: CharacterId,
    /// Which saving throw changed.
    pub ability: Ability,
    /// Proficiency after the change.
    pub proficient: bool,
    /// State before the change.
    pub previous_state: Option<Box<Character>>,
    /// State after the change.
    pub new_state: Option<Box<Character>>,
}

/// A skill proficiency or expertise change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SkillProficiencyChange {
    /// The character the change applies to.
    pub character_id: CharacterId,
    /// Which skill changed.
    pub skill: Skill,
    /// Proficiency after the change.
    pub proficient: bool,
    /// Expertise after the change.
    pub expertise: bool,
    /// State before the change.
    pub previous_state: Option<Box<Character>>,
    /// State re-read from the store after the change.
    pub new_state: Option<Box<Character>>,
}

/// Hit points lost or regained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HitPointChange {
    /// The character the change applies to.
    pub character_id: CharacterId,
    /// Requested amount of damage or healing.
    pub amount: i32,
    /// Pool before the change.
    pub previous: HitPoints,
    /// Pool after the change.
    pub current: HitPoints,
}

/// Record of a dice roll made for a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DiceRollRecord {
    /// The character the roll was made for.
    pub character_id: CharacterId,
    /// Human-readable form of the roll, e.g. `"2d6+3"`.
    pub expression: String,
    /// Every die face rolled, in order.
    pub rolls: Vec<u32>,
    /// The faces that counted toward the total.
    pub kept: Vec<u32>,
    /// Flat modifier added to the kept dice.
    pub modifier: i32,
    /// Final result.
    pub total: i32,
}

/// What the failing operation was doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorContext {
    /// Operation name, e.g. `"update"`.
    pub operation: String,
    /// The operation's inputs, serialized.
    pub inputs: serde_json::Value,
    /// The character the operation targeted, if any.
    pub character_id: Option<CharacterId>,
}

/// Payload of an `ERROR_OCCURRED` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorDetails {
    /// Display form of the error.
    pub error: String,
    /// Where it happened.
    pub context: ErrorContext,
}

/// Kind-specific event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EventPayload {
    /// See [`EventKind::Created`].
    Created(CharacterChange),
    /// See [`EventKind::Updated`].
    Updated(CharacterChange),
    /// See [`EventKind::Deleted`].
    Deleted(CharacterChange),
    /// See [`EventKind::AbilityScoreUpdated`].
    AbilityScoreUpdated(AbilityScoreChange),
    /// See [`EventKind::SavingThrowProficiencyUpdated`].
    SavingThrowProficiencyUpdated(SavingThrowChange),
    /// See [`EventKind::SkillProficiencyUpdated`].
    SkillProficiencyUpdated(SkillProficiencyChange),
    /// See [`EventKind::DamageApplied`].
    DamageApplied(HitPointChange),
    /// See [`EventKind::HealingReceived`].
    HealingReceived(HitPointChange),
    /// See [`EventKind::DiceRolled`].
    DiceRolled(DiceRollRecord),
    /// See [`EventKind::ErrorOccurred`].
    ErrorOccurred(ErrorDetails),
}

impl EventPayload {
    /// The kind tag for this payload.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => EventKind::Created,
            Self::Updated(_) => EventKind::Updated,
            Self::Deleted(_) => EventKind::Deleted,
            Self::AbilityScoreUpdated(_) => EventKind::AbilityScoreUpdated,
            Self::SavingThrowProficiencyUpdated(_) => EventKind::SavingThrowProficiencyUpdated,
            Self::SkillProficiencyUpdated(_) => EventKind::SkillProficiencyUpdated,
            Self::DamageApplied(_) => EventKind::DamageApplied,
            Self::HealingReceived(_) => EventKind::HealingReceived,
            Self::DiceRolled(_) => EventKind::DiceRolled,
            Self::ErrorOccurred(_) => EventKind::ErrorOccurred,
        }
    }

    /// The character the payload concerns, if any.
    pub const fn character_id(&self) -> Option<CharacterId> {
        match self {
            Self::Created(change) | Self::Updated(change) | Self::Deleted(change) => {
                Some(change.character_id)
            }
            Self::AbilityScoreUpdated(change) => Some(change.character_id),
            Self::SavingThrowProficiencyUpdated(change) => Some(change.character_id),
            Self::SkillProficiencyUpdated(change) => Some(change.character_id),
            Self::DamageApplied(change) | Self::HealingReceived(change) => {
                Some(change.character_id)
            }
            Self::DiceRolled(record) => Some(record.character_id),
            Self::ErrorOccurred(details) => details.context.character_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// An immutable record of something that happened to a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DomainEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// When the event was published. Filled in by the bus if absent.
    pub timestamp: Option<DateTime<Utc>>,
    /// Campaign or global classification.
    pub scope: EventScope,
    /// The user who caused the event, if known.
    pub actor_id: Option<UserId>,
    /// The character the event is aimed at, if any.
    pub target_id: Option<CharacterId>,
    /// Kind-specific payload.
    pub payload: EventPayload,
    /// Annotations.
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl DomainEvent {
    /// Create an unscoped, unstamped event around `payload`.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            timestamp: None,
            scope: EventScope::Unscoped,
            actor_id: None,
            target_id: None,
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// The kind tag, derived from the payload.
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// The character the payload concerns, if any.
    pub const fn character_id(&self) -> Option<CharacterId> {
        self.payload.character_id()
    }

    /// The campaign the event is scoped to, if any.
    pub const fn campaign_id(&self) -> Option<CampaignId> {
        match self.scope {
            EventScope::Campaign(id) => Some(id),
            EventScope::Global | EventScope::Unscoped => None,
        }
    }

    /// Whether the event is cross-cutting.
    pub const fn is_global(&self) -> bool {
        matches!(self.scope, EventScope::Global)
    }

    /// Set the scope.
    #[must_use]
    pub const fn with_scope(mut self, scope: EventScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the acting user.
    #[must_use]
    pub const fn with_actor(mut self, actor_id: Option<UserId>) -> Self {
        self.actor_id = actor_id;
        self
    }

    /// Set the target character.
    #[must_use]
    pub const fn with_target(mut self, target_id: CharacterId) -> Self {
        self.target_id = Some(target_id);
        self
    }

    /// Record the CRUD category of the producing mutation.
    #[must_use]
    pub const fn with_operation(mut self, operation_type: OperationType) -> Self {
        self.metadata.operation_type = Some(operation_type);
        self
    }

    /// Add a caller-defined metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.extra.insert(key.into(), value);
        self
    }

    /// Stamp the event with a publication time.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
