use uuid::Uuid;

pub mod cuisine;
pub mod filters;
pub mod preferences;
pub mod recipe;

pub use cuisine::CuisineRecommendation;
pub use filters::RecipeFilters;
pub use preferences::{Flavor, PreferenceProfile, PreferenceQuery, SkillLevel};
pub use recipe::{DietaryFlags, Difficulty, MealType, Provenance, RecipeDraft, StoredRecipe};

/// Identifier of the user who owns preferences and generated recipes
pub type UserId = Uuid;
