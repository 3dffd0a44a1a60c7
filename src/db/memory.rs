use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{
    db::{PreferenceStore, RecipeStore},
    error::{AppError, AppResult},
    models::{PreferenceProfile, Provenance, RecipeDraft, StoredRecipe, UserId},
};

/// Recipe store kept in process memory, in insertion order
#[derive(Default)]
pub struct InMemoryRecipeStore {
    recipes: RwLock<Vec<StoredRecipe>>,
}

impl InMemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drafts owned by `owner`, oldest first
    pub async fn owned_by(&self, owner: UserId) -> Vec<StoredRecipe> {
        self.recipes
            .read()
            .await
            .iter()
            .filter(|r| r.draft.owner == Some(owner))
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl RecipeStore for InMemoryRecipeStore {
    async fn insert(&self, draft: RecipeDraft) -> AppResult<StoredRecipe> {
        draft.check_invariants().map_err(AppError::InvalidInput)?;
        let stored = StoredRecipe::new(draft);
        self.recipes.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn delete_generated(&self, owner: UserId) -> AppResult<u64> {
        let mut recipes = self.recipes.write().await;
        let before = recipes.len();
        recipes.retain(|r| !(r.draft.owner == Some(owner) && r.draft.provenance.is_generated()));
        Ok((before - recipes.len()) as u64)
    }

    async fn list_all(&self) -> AppResult<Vec<StoredRecipe>> {
        Ok(self.recipes.read().await.clone())
    }

    async fn count_generated(&self, owner: UserId) -> AppResult<u64> {
        let recipes = self.recipes.read().await;
        Ok(recipes
            .iter()
            .filter(|r| r.draft.owner == Some(owner) && r.draft.provenance.is_generated())
            .count() as u64)
    }

    async fn count_curated(&self) -> AppResult<u64> {
        let recipes = self.recipes.read().await;
        Ok(recipes
            .iter()
            .filter(|r| r.draft.provenance == Provenance::Curated)
            .count() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    profiles: RwLock<HashMap<UserId, PreferenceProfile>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, user_id: UserId) -> AppResult<Option<PreferenceProfile>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn put(&self, user_id: UserId, profile: &PreferenceProfile) -> AppResult<()> {
        self.profiles.write().await.insert(user_id, profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::seed::curated_recipes;
    use uuid::Uuid;

    fn generated(owner: UserId, provenance: Provenance) -> RecipeDraft {
        let mut draft = curated_recipes().remove(0);
        draft.provenance = provenance;
        draft.owner = Some(owner);
        draft
    }

    #[tokio::test]
    async fn test_insert_rejects_invariant_violations() {
        let store = InMemoryRecipeStore::new();
        let mut draft = curated_recipes().remove(0);
        draft.owner = Some(Uuid::new_v4());

        let result = store.insert(draft).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_generated_only_touches_owner_generated_drafts() {
        let store = InMemoryRecipeStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        store.insert(curated_recipes().remove(0)).await.unwrap();
        store.insert(generated(owner, Provenance::LlmGenerated)).await.unwrap();
        store.insert(generated(owner, Provenance::Fallback)).await.unwrap();
        store.insert(generated(other, Provenance::LlmGenerated)).await.unwrap();

        assert_eq!(store.count_generated(owner).await.unwrap(), 2);
        assert_eq!(store.delete_generated(owner).await.unwrap(), 2);
        assert_eq!(store.count_generated(owner).await.unwrap(), 0);
        assert_eq!(store.count_generated(other).await.unwrap(), 1);
        assert_eq!(store.count_curated().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_preferences_round_trip() {
        let store = InMemoryPreferenceStore::new();
        let user = Uuid::new_v4();
        assert!(store.get(user).await.unwrap().is_none());

        let profile = PreferenceProfile {
            cuisines: vec!["Thai".to_string()],
            ..Default::default()
        };
        store.put(user, &profile).await.unwrap();
        assert_eq!(store.get(user).await.unwrap(), Some(profile));
    }
}
