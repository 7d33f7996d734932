//! Character validation, persistence and mutation orchestration for Tavern.
//!
//! This crate owns the operation surface that applications call to change
//! characters. Each mutation is validated, written through a
//! [`CharacterStore`], and announced on an
//! [`EventBus`](tavern_events::EventBus) so observers and the undo/redo
//! history stay in step.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `tavern-config.yaml` into
//!   strongly-typed structs.
//! - [`validation`] -- Rule checks on character data.
//! - [`store`] -- [`CharacterStore`] trait and [`InMemoryCharacterStore`].
//! - [`service`] -- [`CharacterService`], the mutation orchestrator.
//! - [`dice`] -- Immutable roll builder and roll outcomes.
//! - [`error`] -- [`ServiceError`].

pub mod config;
pub mod dice;
pub mod error;
pub mod service;
pub mod store;
pub mod validation;

pub use config::{ConfigError, TavernConfig};
pub use dice::{DiceError, RollBuilder, RollOutcome, RollSpec};
pub use error::ServiceError;
pub use service::{BulkUpdate, CharacterService};
pub use store::{CharacterStore, InMemoryCharacterStore, StoreError};
pub use validation::{ValidationFailed, ValidationIssue, validate_character};
