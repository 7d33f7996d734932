//! Inverse events for undo notifications.
//!
//! Undo re-emits the inverse of a history entry so observers can roll back
//! whatever they derived from it. Creation and deletion invert into each
//! other, as do damage and healing. Every other kind inverts into itself
//! with its before and after values swapped.

use tavern_types::{
    AbilityScoreChange, CharacterChange, DomainEvent, EventId, EventKind, EventPayload,
    HitPointChange, SavingThrowChange, SkillProficiencyChange,
};

/// Map an event kind to the kind of its inverse.
pub const fn inverse_kind(kind: EventKind) -> EventKind {
    match kind {
        EventKind::Created => EventKind::Deleted,
        EventKind::Deleted => EventKind::Created,
        EventKind::DamageApplied => EventKind::HealingReceived,
        EventKind::HealingReceived => EventKind::DamageApplied,
        EventKind::Updated
        | EventKind::AbilityScoreUpdated
        | EventKind::SavingThrowProficiencyUpdated
        | EventKind::SkillProficiencyUpdated
        | EventKind::DiceRolled
        | EventKind::ErrorOccurred => kind,
    }
}

/// Build the inverse of `event`.
///
/// The result has a fresh id and no timestamp; the publisher stamps it.
/// Scope, actor, target and metadata are carried over.
pub fn invert(event: &DomainEvent) -> DomainEvent {
    DomainEvent {
        id: EventId::new(),
        timestamp: None,
        payload: invert_payload(&event.payload),
        ..event.clone()
    }
}

fn invert_payload(payload: &EventPayload) -> EventPayload {
    match payload {
        EventPayload::Created(change) => EventPayload::Deleted(swap_states(change)),
        EventPayload::Deleted(change) => EventPayload::Created(swap_states(change)),
        EventPayload::Updated(change) => EventPayload::Updated(swap_states(change)),
        EventPayload::DamageApplied(change) => EventPayload::HealingReceived(swap_pools(change)),
        EventPayload::HealingReceived(change) => EventPayload::DamageApplied(swap_pools(change)),
        EventPayload::AbilityScoreUpdated(change) => {
            EventPayload::AbilityScoreUpdated(AbilityScoreChange {
                character_id: change.character_id,
                ability: change.ability,
                old_score: change.new_score,
                new_score: change.old_score,
                old_modifier: change.new_modifier,
                new_modifier: change.old_modifier,
                modifier_change: change.modifier_change.saturating_neg(),
                // The state before the change was never recorded.
                new_state: None,
            })
        }
        EventPayload::SavingThrowProficiencyUpdated(change) => {
            EventPayload::SavingThrowProficiencyUpdated(SavingThrowChange {
                character_id: change.character_id,
                ability: change.ability,
                proficient: !change.proficient,
                previous_state: change.new_state.clone(),
                new_state: change.previous_state.clone(),
            })
        }
        EventPayload::SkillProficiencyUpdated(change) => {
            let restored = change
                .previous_state
                .as_ref()
                .map(|state| state.data.skill(change.skill));
            EventPayload::SkillProficiencyUpdated(SkillProficiencyChange {
                character_id: change.character_id,
                skill: change.skill,
                proficient: restored.map_or(change.proficient, |s| s.proficient),
                expertise: restored.map_or(change.expertise, |s| s.expertise),
                previous_state: change.new_state.clone(),
                new_state: change.previous_state.clone(),
            })
        }
        EventPayload::DiceRolled(_) | EventPayload::ErrorOccurred(_) => payload.clone(),
    }
}

fn swap_states(change: &CharacterChange) -> CharacterChange {
    CharacterChange {
        character_id: change.character_id,
        previous_state: change.new_state.clone(),
        new_state: change.previous_state.clone(),
        changes: change.changes.clone(),
    }
}

const fn swap_pools(change: &HitPointChange) -> HitPointChange {
    HitPointChange {
        character_id: change.character_id,
        amount: change.amount,
        previous: change.current,
        current: change.previous,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tavern_types::{
        Ability, Character, CharacterData, CharacterId, HitPoints, Race, Skill, SkillProficiency,
    };

    use super::*;

    fn character(id: CharacterId) -> Box<Character> {
        Box::new(Character {
            id,
            data: CharacterData::new("Mira", Race::Elf, 3, HitPoints::full(18)),
            created_at: chrono_epoch(),
            updated_at: chrono_epoch(),
        })
    }

    const fn chrono_epoch() -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::<chrono::Utc>::UNIX_EPOCH
    }

    #[test]
    fn inverse_kind_table() {
        assert_eq!(inverse_kind(EventKind::Created), EventKind::Deleted);
        assert_eq!(inverse_kind(EventKind::Deleted), EventKind::Created);
        assert_eq!(
            inverse_kind(EventKind::DamageApplied),
            EventKind::HealingReceived
        );
        assert_eq!(
            inverse_kind(EventKind::HealingReceived),
            EventKind::DamageApplied
        );
        assert_eq!(inverse_kind(EventKind::Updated), EventKind::Updated);
        assert_eq!(inverse_kind(EventKind::DiceRolled), EventKind::DiceRolled);
    }

    #[test]
    fn inverse_kind_is_an_involution() {
        let kinds = [
            EventKind::Created,
            EventKind::Updated,
            EventKind::Deleted,
            EventKind::AbilityScoreUpdated,
            EventKind::SavingThrowProficiencyUpdated,
            EventKind::SkillProficiencyUpdated,
            EventKind::DamageApplied,
            EventKind::HealingReceived,
            EventKind::DiceRolled,
            EventKind::ErrorOccurred,
        ];
        for kind in kinds {
            assert_eq!(inverse_kind(inverse_kind(kind)), kind);
        }
    }

    #[test]
    fn created_inverts_to_deleted_with_swapped_states() {
        let id = CharacterId::new();
        let event = DomainEvent::new(EventPayload::Created(CharacterChange {
            character_id: id,
            previous_state: None,
            new_state: Some(character(id)),
            changes: None,
        }))
        .with_timestamp(chrono_epoch());

        let inverse = invert(&event);
        assert_eq!(inverse.kind(), inverse_kind(event.kind()));
        assert_ne!(inverse.id, event.id);
        assert!(inverse.timestamp.is_none());
        assert_eq!(inverse.character_id(), Some(id));
        match inverse.payload {
            EventPayload::Deleted(change) => {
                assert!(change.new_state.is_none());
                assert_eq!(change.previous_state.map(|c| c.id), Some(id));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn damage_inverts_to_healing() {
        let id = CharacterId::new();
        let before = HitPoints::full(10);
        let after = HitPoints {
            max: 10,
            current: 4,
            temporary: 0,
        };
        let event = DomainEvent::new(EventPayload::DamageApplied(HitPointChange {
            character_id: id,
            amount: 6,
            previous: before,
            current: after,
        }));

        match invert(&event).payload {
            EventPayload::HealingReceived(change) => {
                assert_eq!(change.previous, after);
                assert_eq!(change.current, before);
                assert_eq!(change.amount, 6);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn ability_score_inverse_negates_modifier_change() {
        let event = DomainEvent::new(EventPayload::AbilityScoreUpdated(AbilityScoreChange {
            character_id: CharacterId::new(),
            ability: Ability::Strength,
            old_score: 10,
            new_score: 14,
            old_modifier: 0,
            new_modifier: 2,
            modifier_change: 2,
            new_state: None,
        }));

        match invert(&event).payload {
            EventPayload::AbilityScoreUpdated(change) => {
                assert_eq!(change.old_score, 14);
                assert_eq!(change.new_score, 10);
                assert_eq!(change.modifier_change, -2);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn skill_inverse_restores_previous_proficiency() {
        let id = CharacterId::new();
        let event = DomainEvent::new(EventPayload::SkillProficiencyUpdated(
            SkillProficiencyChange {
                character_id: id,
                skill: Skill::Stealth,
                proficient: true,
                expertise: true,
                previous_state: Some(character(id)),
                new_state: None,
            },
        ));

        match invert(&event).payload {
            EventPayload::SkillProficiencyUpdated(change) => {
                assert_eq!(
                    SkillProficiency {
                        proficient: change.proficient,
                        expertise: change.expertise,
                    },
                    SkillProficiency::default()
                );
                assert!(change.previous_state.is_none());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
