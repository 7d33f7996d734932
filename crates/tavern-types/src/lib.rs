//! Shared type definitions for the Tavern character service.
//!
//! This crate is the single source of truth for the character model and the
//! domain events that describe changes to it. Types defined here flow
//! downstream to `TypeScript` via `ts-rs` for client applications.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for characters, campaigns, users, events
//! - [`enums`] -- Abilities, skills, races and event classification
//! - [`character`] -- The character record, its parts, and partial updates
//! - [`event`] -- Domain event envelope and per-kind payloads
//! - [`clock`] -- Injectable time source

pub mod character;
pub mod clock;
pub mod enums;
pub mod event;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use character::{
    AbilityScores, Character, CharacterData, CharacterPatch, Currency, DEFAULT_ABILITY_SCORE,
    HitPoints, SkillProficiency, ability_modifier,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use enums::{Ability, EventKind, OperationType, Race, ReplayDirection, Skill};
pub use event::{
    AbilityScoreChange, CharacterChange, DiceRollRecord, DomainEvent, ErrorContext, ErrorDetails,
    EventMetadata, EventPayload, EventScope, HitPointChange, SavingThrowChange,
    SkillProficiencyChange,
};
pub use ids::{CampaignId, CharacterId, EventId, UserId};
