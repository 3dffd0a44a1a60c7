/// Storage seams for preferences and recipes
///
/// The pipeline only talks to these traits. PostgreSQL backs them in
/// production; the in-memory versions back tests and local runs.
use crate::{
    error::AppResult,
    models::{PreferenceProfile, RecipeDraft, StoredRecipe, UserId},
};

pub mod cache;
pub mod memory;
pub mod postgres;
pub mod seed;

pub use cache::{create_redis_client, Cache, CacheKey};
pub use postgres::{create_pool, PgPreferenceStore, PgRecipeStore};

#[async_trait::async_trait]
pub trait RecipeStore: Send + Sync {
    /// Persists one draft in its own transaction.
    ///
    /// Drafts violating the provenance/owner invariants are rejected with
    /// `AppError::InvalidInput`.
    async fn insert(&self, draft: RecipeDraft) -> AppResult<StoredRecipe>;

    /// Removes every generated (LLM or fallback) draft owned by `owner`
    async fn delete_generated(&self, owner: UserId) -> AppResult<u64>;

    async fn list_all(&self) -> AppResult<Vec<StoredRecipe>>;

    /// Number of generated drafts owned by `owner`
    async fn count_generated(&self, owner: UserId) -> AppResult<u64>;

    async fn count_curated(&self) -> AppResult<u64>;
}

#[async_trait::async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> AppResult<Option<PreferenceProfile>>;

    async fn put(&self, user_id: UserId, profile: &PreferenceProfile) -> AppResult<()>;
}
