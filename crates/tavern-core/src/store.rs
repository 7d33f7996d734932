//! Character persistence: the store trait and an in-memory implementation.
//!
//! The store is the source of truth for current character state. The
//! service layer never caches characters; it reads through the store
//! whenever it needs a before/after view.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use tavern_types::{
    Character, CharacterData, CharacterId, CharacterPatch, Clock, Skill, SkillProficiency,
    SystemClock,
};

/// Errors reported by a [`CharacterStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No character has this id.
    #[error("character {0} not found")]
    NotFound(CharacterId),

    /// The store refused the operation.
    #[error("store rejected the operation: {message}")]
    Rejected {
        /// Why the store refused.
        message: String,
    },
}

/// Persistence backend for characters.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    /// Load a character.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no character has `id`.
    async fn get_by_id(&self, id: CharacterId) -> Result<Character, StoreError>;

    /// Persist a new character and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rejected`] if the backend refuses the record.
    async fn create(&self, data: CharacterData) -> Result<Character, StoreError>;

    /// Apply `patch` to an existing character and return the result.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no character has `id`.
    async fn update(&self, id: CharacterId, patch: &CharacterPatch)
    -> Result<Character, StoreError>;

    /// Remove a character.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no character has `id`.
    async fn delete(&self, id: CharacterId) -> Result<(), StoreError>;

    /// Set training in one skill.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no character has `id`, or
    /// [`StoreError::Rejected`] if the combination is not allowed.
    async fn update_skill_proficiency(
        &self,
        id: CharacterId,
        skill: Skill,
        proficient: bool,
        expertise: bool,
    ) -> Result<(), StoreError>;
}

/// Characters held in process memory.
#[derive(Debug)]
pub struct InMemoryCharacterStore {
    characters: RwLock<BTreeMap<CharacterId, Character>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryCharacterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCharacterStore {
    /// Create an empty store stamped by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamped by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            characters: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Number of stored characters.
    pub async fn len(&self) -> usize {
        self.characters.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.characters.read().await.is_empty()
    }

    /// Copy of every stored character, ordered by id.
    pub async fn all(&self) -> Vec<Character> {
        self.characters.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl CharacterStore for InMemoryCharacterStore {
    async fn get_by_id(&self, id: CharacterId) -> Result<Character, StoreError> {
        self.characters
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, data: CharacterData) -> Result<Character, StoreError> {
        let now = self.clock.now();
        let character = Character {
            id: CharacterId::new(),
            data,
            created_at: now,
            updated_at: now,
        };
        self.characters
            .write()
            .await
            .insert(character.id, character.clone());
        trace!(character_id = %character.id, "stored new character");
        Ok(character)
    }

    async fn update(
        &self,
        id: CharacterId,
        patch: &CharacterPatch,
    ) -> Result<Character, StoreError> {
        let mut characters = self.characters.write().await;
        let character = characters.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        character.data = character.data.apply(patch);
        character.updated_at = self.clock.now();
        trace!(character_id = %id, "stored character update");
        Ok(character.clone())
    }

    async fn delete(&self, id: CharacterId) -> Result<(), StoreError> {
        self.characters
            .write()
            .await
            .remove(&id)
            .map(|_| trace!(character_id = %id, "removed character"))
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_skill_proficiency(
        &self,
        id: CharacterId,
        skill: Skill,
        proficient: bool,
        expertise: bool,
    ) -> Result<(), StoreError> {
        if expertise && !proficient {
            return Err(StoreError::Rejected {
                message: format!("expertise in {skill:?} requires proficiency"),
            });
        }
        let mut characters = self.characters.write().await;
        let character = characters.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if proficient || expertise {
            character.data.skills.insert(
                skill,
                SkillProficiency {
                    proficient,
                    expertise,
                },
            );
        } else {
            character.data.skills.remove(&skill);
        }
        character.updated_at = self.clock.now();
        trace!(character_id = %id, ?skill, proficient, expertise, "stored skill training");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use tavern_types::{HitPoints, ManualClock, Race};

    use super::*;

    fn sheet() -> CharacterData {
        CharacterData::new("Pip", Race::Halfling, 2, HitPoints::full(14))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryCharacterStore::new();
        let created = store.create(sheet()).await.unwrap();
        let loaded = store.get_by_id(created.id).await.unwrap();
        assert_eq!(created, loaded);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_stamps_with_clock() {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let clock = Arc::new(ManualClock::new(start));
        let store = InMemoryCharacterStore::with_clock(clock.clone());
        let created = store.create(sheet()).await.unwrap();

        clock.advance(Duration::minutes(1));
        let updated = store
            .update(created.id, &CharacterPatch::new().level(3))
            .await
            .unwrap();
        assert_eq!(updated.data.level, 3);
        assert_eq!(updated.created_at, start);
        assert_eq!(updated.updated_at, start + Duration::minutes(1));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store = InMemoryCharacterStore::new();
        let id = CharacterId::new();
        assert_eq!(store.get_by_id(id).await, Err(StoreError::NotFound(id)));
        assert_eq!(store.delete(id).await, Err(StoreError::NotFound(id)));
        assert_eq!(
            store.update(id, &CharacterPatch::new()).await,
            Err(StoreError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn expertise_without_proficiency_is_rejected() {
        let store = InMemoryCharacterStore::new();
        let created = store.create(sheet()).await.unwrap();
        let result = store
            .update_skill_proficiency(created.id, Skill::Stealth, false, true)
            .await;
        assert!(matches!(result, Err(StoreError::Rejected { .. })));
    }

    #[tokio::test]
    async fn skill_training_is_stored_and_cleared() {
        let store = InMemoryCharacterStore::new();
        let created = store.create(sheet()).await.unwrap();

        store
            .update_skill_proficiency(created.id, Skill::Stealth, true, true)
            .await
            .unwrap();
        let loaded = store.get_by_id(created.id).await.unwrap();
        assert!(loaded.data.skill(Skill::Stealth).expertise);

        store
            .update_skill_proficiency(created.id, Skill::Stealth, false, false)
            .await
            .unwrap();
        let loaded = store.get_by_id(created.id).await.unwrap();
        assert!(loaded.data.skills.is_empty());
    }

    #[tokio::test]
    async fn delete_removes() {
        let store = InMemoryCharacterStore::new();
        let created = store.create(sheet()).await.unwrap();
        store.delete(created.id).await.unwrap();
        assert!(store.is_empty().await);
    }
}
