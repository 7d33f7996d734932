//! The mutation orchestrator.
//!
//! [`CharacterService`] is the public operation surface for characters.
//! Every mutating operation follows the same sequence:
//!
//! 1. Load the current state from the store when a before/after view or a
//!    merged prospective state is needed.
//! 2. Validate the prospective state.
//! 3. Call the store.
//! 4. Publish a success event scoped to the character's campaign.
//! 5. Return the store's result.
//!
//! If step 2 or 3 fails, a global `ERROR_OCCURRED` event carrying the
//! operation name and its inputs is published, and the error is returned
//! to the caller.
//!
//! Undo and redo live on the [`EventBus`] and only notify subscribers; the
//! service never reverts store state on its own.

use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use tavern_events::{EventBus, PublishOutcome};
use tavern_types::{
    Ability, AbilityScoreChange, CampaignId, Character, CharacterChange, CharacterData, CharacterId,
    CharacterPatch, DiceRollRecord, DomainEvent, ErrorContext, ErrorDetails, EventPayload,
    EventScope, HitPointChange, HitPoints, OperationType, SavingThrowChange, Skill,
    SkillProficiencyChange, UserId, ability_modifier,
};

use crate::dice::{RollBuilder, RollOutcome, RollSpec};
use crate::error::ServiceError;
use crate::store::CharacterStore;
use crate::validation::{ValidationFailed, ValidationIssue, validate_character};

/// One entry of a [`CharacterService::bulk_update`] batch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BulkUpdate {
    /// Character to update.
    pub id: CharacterId,
    /// Changes to apply.
    pub patch: CharacterPatch,
}

/// What an operation was doing, for error events.
struct Operation {
    name: &'static str,
    inputs: Value,
    character_id: Option<CharacterId>,
}

impl Operation {
    const fn new(name: &'static str, inputs: Value, character_id: Option<CharacterId>) -> Self {
        Self {
            name,
            inputs,
            character_id,
        }
    }
}

/// Validates, persists and announces character mutations.
#[derive(Clone)]
pub struct CharacterService {
    store: Arc<dyn CharacterStore>,
    bus: EventBus,
    actor: Option<UserId>,
}

impl core::fmt::Debug for CharacterService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CharacterService")
            .field("bus", &self.bus)
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}

impl CharacterService {
    /// Create a service over `store` publishing on `bus`.
    pub fn new(store: Arc<dyn CharacterStore>, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            actor: None,
        }
    }

    /// Record `actor` as the acting user on every published event.
    #[must_use]
    pub const fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// The bus events are published on.
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The backing store.
    pub fn store(&self) -> &dyn CharacterStore {
        self.store.as_ref()
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    /// Validate and persist a new character.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ValidationFailed`] if `data` breaks a rule, or
    /// [`ServiceError::StoreFailure`] if the store refuses it.
    pub async fn create(&self, data: CharacterData) -> Result<Character, ServiceError> {
        let op = Operation::new("create", to_json(&data), None);

        self.check(&op, validate_character(&data)).await?;
        let character = self.check(&op, self.store.create(data).await).await?;

        self.emit(
            EventPayload::Created(CharacterChange {
                character_id: character.id,
                previous_state: None,
                new_state: Some(Box::new(character.clone())),
                changes: None,
            }),
            character.campaign_id(),
            Some(OperationType::Create),
        )
        .await;
        info!(operation = op.name, character_id = %character.id, "character created");
        Ok(character)
    }

    /// Apply `patch` to an existing character.
    ///
    /// The patch is merged onto the current state and the result is
    /// validated before anything is written.
    ///
    /// # Errors
    ///
    /// [`ServiceError::StoreFailure`] if the character does not exist or
    /// the store refuses the write, [`ServiceError::ValidationFailed`] if
    /// the merged state breaks a rule.
    pub async fn update(
        &self,
        id: CharacterId,
        patch: CharacterPatch,
    ) -> Result<Character, ServiceError> {
        let op = Operation::new(
            "update",
            json!({ "id": id, "patch": to_json(&patch) }),
            Some(id),
        );

        let current = self.check(&op, self.store.get_by_id(id).await).await?;
        self.check(&op, validate_character(&current.data.apply(&patch)))
            .await?;
        let updated = self.check(&op, self.store.update(id, &patch).await).await?;

        self.emit(
            EventPayload::Updated(CharacterChange {
                character_id: id,
                previous_state: Some(Box::new(current)),
                new_state: Some(Box::new(updated.clone())),
                changes: Some(patch),
            }),
            updated.campaign_id(),
            Some(OperationType::Update),
        )
        .await;
        info!(operation = op.name, character_id = %id, "character updated");
        Ok(updated)
    }

    /// Remove a character.
    ///
    /// # Errors
    ///
    /// [`ServiceError::StoreFailure`] if the character does not exist or
    /// the store refuses the delete.
    pub async fn delete(&self, id: CharacterId) -> Result<(), ServiceError> {
        let op = Operation::new("delete", json!({ "id": id }), Some(id));

        let current = self.check(&op, self.store.get_by_id(id).await).await?;
        self.check(&op, self.store.delete(id).await).await?;

        let campaign = current.campaign_id();
        self.emit(
            EventPayload::Deleted(CharacterChange {
                character_id: id,
                previous_state: Some(Box::new(current)),
                new_state: None,
                changes: None,
            }),
            campaign,
            Some(OperationType::Delete),
        )
        .await;
        info!(operation = op.name, character_id = %id, "character deleted");
        Ok(())
    }

    /// Apply a batch of updates in order.
    ///
    /// Failed entries are logged and skipped (each has already published
    /// its own error event); the batch itself never fails. Returns the
    /// successfully updated characters in batch order.
    pub async fn bulk_update(&self, updates: Vec<BulkUpdate>) -> Vec<Character> {
        let total = updates.len();
        let mut results = Vec::with_capacity(total);
        for BulkUpdate { id, patch } in updates {
            match self.update(id, patch).await {
                Ok(character) => results.push(character),
                Err(err) => {
                    warn!(operation = "bulk_update", character_id = %id, error = %err, "skipping failed update");
                }
            }
        }
        info!(
            operation = "bulk_update",
            total,
            succeeded = results.len(),
            "bulk update finished"
        );
        results
    }

    /// Load several characters side by side.
    ///
    /// Read-only and infallible: an id that cannot be loaded gets `None`.
    pub async fn compare_characters(
        &self,
        ids: &[CharacterId],
    ) -> Vec<(CharacterId, Option<Character>)> {
        let mut entries = Vec::with_capacity(ids.len());
        for &id in ids {
            let character = match self.store.get_by_id(id).await {
                Ok(character) => Some(character),
                Err(err) => {
                    debug!(operation = "compare_characters", character_id = %id, error = %err, "lookup failed");
                    None
                }
            };
            entries.push((id, character));
        }
        entries
    }

    // -----------------------------------------------------------------------
    // Sheet details
    // -----------------------------------------------------------------------

    /// Set one ability score and publish the score and modifier delta.
    ///
    /// An ability that was never set counts as 10.
    ///
    /// # Errors
    ///
    /// [`ServiceError::StoreFailure`] if the character does not exist,
    /// [`ServiceError::ValidationFailed`] if `new_score` is out of range.
    pub async fn update_ability_score(
        &self,
        id: CharacterId,
        ability: Ability,
        new_score: i32,
    ) -> Result<Character, ServiceError> {
        let op = Operation::new(
            "update_ability_score",
            json!({ "id": id, "ability": ability, "new_score": new_score }),
            Some(id),
        );

        let current = self.check(&op, self.store.get_by_id(id).await).await?;
        let patch = CharacterPatch::new().ability_score(ability, new_score);
        self.check(&op, validate_character(&current.data.apply(&patch)))
            .await?;
        let updated = self.check(&op, self.store.update(id, &patch).await).await?;

        let old_score = current.data.ability_scores.score(ability);
        let old_modifier = ability_modifier(old_score);
        let new_modifier = ability_modifier(new_score);
        self.emit(
            EventPayload::AbilityScoreUpdated(AbilityScoreChange {
                character_id: id,
                ability,
                old_score,
                new_score,
                old_modifier,
                new_modifier,
                modifier_change: new_modifier.saturating_sub(old_modifier),
                new_state: Some(Box::new(updated.clone())),
            }),
            updated.campaign_id(),
            Some(OperationType::Update),
        )
        .await;
        info!(operation = op.name, character_id = %id, %ability, old_score, new_score, "ability score updated");
        Ok(updated)
    }

    /// Set training in one skill, then re-read the character.
    ///
    /// # Errors
    ///
    /// [`ServiceError::StoreFailure`] if the character does not exist or
    /// the store refuses the combination.
    pub async fn update_skill_proficiency(
        &self,
        id: CharacterId,
        skill: Skill,
        proficient: bool,
        expertise: bool,
    ) -> Result<Character, ServiceError> {
        let op = Operation::new(
            "update_skill_proficiency",
            json!({ "id": id, "skill": skill, "proficient": proficient, "expertise": expertise }),
            Some(id),
        );

        let previous = self.check(&op, self.store.get_by_id(id).await).await?;
        self.check(
            &op,
            self.store
                .update_skill_proficiency(id, skill, proficient, expertise)
                .await,
        )
        .await?;
        let current = self.check(&op, self.store.get_by_id(id).await).await?;

        self.emit(
            EventPayload::SkillProficiencyUpdated(SkillProficiencyChange {
                character_id: id,
                skill,
                proficient,
                expertise,
                previous_state: Some(Box::new(previous)),
                new_state: Some(Box::new(current.clone())),
            }),
            current.campaign_id(),
            Some(OperationType::Update),
        )
        .await;
        info!(operation = op.name, character_id = %id, ?skill, proficient, expertise, "skill training updated");
        Ok(current)
    }

    /// Grant or remove a saving throw proficiency.
    ///
    /// # Errors
    ///
    /// [`ServiceError::StoreFailure`] if the character does not exist or
    /// the store refuses the write.
    pub async fn update_saving_throw_proficiency(
        &self,
        id: CharacterId,
        ability: Ability,
        proficient: bool,
    ) -> Result<Character, ServiceError> {
        let op = Operation::new(
            "update_saving_throw_proficiency",
            json!({ "id": id, "ability": ability, "proficient": proficient }),
            Some(id),
        );

        let current = self.check(&op, self.store.get_by_id(id).await).await?;
        let mut saving_throws = current.data.saving_throws.clone();
        if proficient {
            saving_throws.insert(ability);
        } else {
            saving_throws.remove(&ability);
        }
        let patch = CharacterPatch::new().saving_throws(saving_throws);
        let updated = self.check(&op, self.store.update(id, &patch).await).await?;

        self.emit(
            EventPayload::SavingThrowProficiencyUpdated(SavingThrowChange {
                character_id: id,
                ability,
                proficient,
                previous_state: Some(Box::new(current)),
                new_state: Some(Box::new(updated.clone())),
            }),
            updated.campaign_id(),
            Some(OperationType::Update),
        )
        .await;
        info!(operation = op.name, character_id = %id, %ability, proficient, "saving throw updated");
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Hit points
    // -----------------------------------------------------------------------

    /// Deal `amount` damage. Temporary hit points absorb it first and
    /// current hit points never drop below zero.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ValidationFailed`] if `amount` is negative,
    /// [`ServiceError::StoreFailure`] if the character does not exist.
    pub async fn apply_damage(
        &self,
        id: CharacterId,
        amount: i32,
    ) -> Result<Character, ServiceError> {
        let op = Operation::new(
            "apply_damage",
            json!({ "id": id, "amount": amount }),
            Some(id),
        );
        self.check(&op, non_negative(amount)).await?;

        let current = self.check(&op, self.store.get_by_id(id).await).await?;
        let previous = current.data.hit_points;
        let next = damaged(previous, amount);
        let updated = self.write_hit_points(&op, &current, next).await?;

        self.emit(
            EventPayload::DamageApplied(HitPointChange {
                character_id: id,
                amount,
                previous,
                current: next,
            }),
            updated.campaign_id(),
            Some(OperationType::Update),
        )
        .await;
        info!(operation = op.name, character_id = %id, amount, remaining = next.current, "damage applied");
        Ok(updated)
    }

    /// Restore `amount` hit points, capped at the maximum.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ValidationFailed`] if `amount` is negative,
    /// [`ServiceError::StoreFailure`] if the character does not exist.
    pub async fn receive_healing(
        &self,
        id: CharacterId,
        amount: i32,
    ) -> Result<Character, ServiceError> {
        let op = Operation::new(
            "receive_healing",
            json!({ "id": id, "amount": amount }),
            Some(id),
        );
        self.check(&op, non_negative(amount)).await?;

        let current = self.check(&op, self.store.get_by_id(id).await).await?;
        let previous = current.data.hit_points;
        let next = healed(previous, amount);
        let updated = self.write_hit_points(&op, &current, next).await?;

        self.emit(
            EventPayload::HealingReceived(HitPointChange {
                character_id: id,
                amount,
                previous,
                current: next,
            }),
            updated.campaign_id(),
            Some(OperationType::Update),
        )
        .await;
        info!(operation = op.name, character_id = %id, amount, current = next.current, "healing received");
        Ok(updated)
    }

    async fn write_hit_points(
        &self,
        op: &Operation,
        current: &Character,
        hit_points: HitPoints,
    ) -> Result<Character, ServiceError> {
        let patch = CharacterPatch::new().hit_points(hit_points);
        self.check(op, validate_character(&current.data.apply(&patch)))
            .await?;
        self.check(op, self.store.update(current.id, &patch).await)
            .await
    }

    // -----------------------------------------------------------------------
    // Dice
    // -----------------------------------------------------------------------

    /// Roll `spec` on behalf of a character and publish the result.
    ///
    /// # Errors
    ///
    /// [`ServiceError::StoreFailure`] if the character does not exist.
    pub async fn roll<R>(
        &self,
        id: CharacterId,
        spec: &RollSpec,
        rng: &mut R,
    ) -> Result<RollOutcome, ServiceError>
    where
        R: Rng + Send + ?Sized,
    {
        let op = Operation::new(
            "roll",
            json!({ "id": id, "expression": spec.expression() }),
            Some(id),
        );
        let character = self.check(&op, self.store.get_by_id(id).await).await?;
        Ok(self.roll_for(&character, spec, rng).await)
    }

    /// Roll an ability check: `builder` plus the character's modifier for
    /// `ability`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::StoreFailure`] if the character does not exist,
    /// [`ServiceError::InvalidRoll`] if `builder` does not describe a
    /// valid roll.
    pub async fn ability_check<R>(
        &self,
        id: CharacterId,
        ability: Ability,
        builder: RollBuilder,
        rng: &mut R,
    ) -> Result<RollOutcome, ServiceError>
    where
        R: Rng + Send + ?Sized,
    {
        let op = Operation::new(
            "ability_check",
            json!({ "id": id, "ability": ability }),
            Some(id),
        );
        let character = self.check(&op, self.store.get_by_id(id).await).await?;
        let modifier = character.data.ability_scores.modifier(ability);
        let spec = self.check(&op, builder.plus(modifier).build()).await?;
        Ok(self.roll_for(&character, &spec, rng).await)
    }

    async fn roll_for<R>(&self, character: &Character, spec: &RollSpec, rng: &mut R) -> RollOutcome
    where
        R: Rng + Send + ?Sized,
    {
        let outcome = spec.roll(rng);
        self.emit(
            EventPayload::DiceRolled(DiceRollRecord {
                character_id: character.id,
                expression: spec.expression(),
                rolls: outcome.rolls.clone(),
                kept: outcome.kept.clone(),
                modifier: outcome.modifier,
                total: outcome.total,
            }),
            character.campaign_id(),
            None,
        )
        .await;
        info!(operation = "roll", character_id = %character.id, expression = %spec.expression(), total = outcome.total, "dice rolled");
        outcome
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    async fn emit(
        &self,
        payload: EventPayload,
        campaign: Option<CampaignId>,
        operation: Option<OperationType>,
    ) -> PublishOutcome {
        let mut event = DomainEvent::new(payload)
            .with_scope(EventScope::for_campaign(campaign))
            .with_actor(self.actor);
        if let Some(target) = event.character_id() {
            event = event.with_target(target);
        }
        if let Some(operation) = operation {
            event = event.with_operation(operation);
        }
        let outcome = self.bus.publish(event).await;
        if !outcome.is_clean() {
            warn!(
                event_id = %outcome.event.id,
                failures = outcome.failures.len(),
                "some subscribers failed"
            );
        }
        outcome
    }

    /// Pass `result` through, publishing an error event if it failed.
    async fn check<T, E>(&self, op: &Operation, result: Result<T, E>) -> Result<T, ServiceError>
    where
        E: Into<ServiceError>,
    {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let err = err.into();
                warn!(operation = op.name, character_id = ?op.character_id, error = %err, "operation failed");
                let event = DomainEvent::new(EventPayload::ErrorOccurred(ErrorDetails {
                    error: err.to_string(),
                    context: ErrorContext {
                        operation: op.name.to_owned(),
                        inputs: op.inputs.clone(),
                        character_id: op.character_id,
                    },
                }))
                .with_scope(EventScope::Global)
                .with_actor(self.actor);
                self.bus.publish(event).await;
                Err(err)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn non_negative(amount: i32) -> Result<(), ValidationFailed> {
    if amount < 0 {
        return Err(ValidationFailed {
            issues: vec![ValidationIssue {
                field: "amount".to_owned(),
                message: format!("amount cannot be negative, got {amount}"),
            }],
        });
    }
    Ok(())
}

/// Temporary hit points soak damage first; current never goes below zero.
const fn damaged(hp: HitPoints, amount: i32) -> HitPoints {
    let absorbed = if amount < hp.temporary {
        amount
    } else {
        hp.temporary
    };
    let remaining = amount.saturating_sub(absorbed);
    let current = hp.current.saturating_sub(remaining);
    HitPoints {
        max: hp.max,
        current: if current < 0 { 0 } else { current },
        temporary: hp.temporary.saturating_sub(absorbed),
    }
}

const fn healed(hp: HitPoints, amount: i32) -> HitPoints {
    let raised = hp.current.saturating_add(amount);
    HitPoints {
        max: hp.max,
        current: if raised > hp.max { hp.max } else { raised },
        temporary: hp.temporary,
    }
}
