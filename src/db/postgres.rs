use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    db::{PreferenceStore, RecipeStore},
    error::{AppError, AppResult},
    models::{
        DietaryFlags, Difficulty, Flavor, MealType, PreferenceProfile, Provenance, RecipeDraft,
        SkillLevel, StoredRecipe, UserId,
    },
};

/// Creates a PostgreSQL connection pool
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

#[derive(Debug, sqlx::FromRow)]
struct RecipeRow {
    id: Uuid,
    title: String,
    description: String,
    ingredients: Json<Vec<String>>,
    instructions: Json<Vec<String>>,
    cuisine: String,
    meal_type: String,
    prep_time: i32,
    cook_time: i32,
    total_time: i32,
    difficulty: String,
    vegetarian: bool,
    vegan: bool,
    gluten_free: bool,
    dairy_free: bool,
    nut_free: bool,
    spicy_level: i16,
    tags: Json<Vec<String>>,
    provenance: String,
    owner_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

fn minutes(value: i32) -> u32 {
    value.max(0) as u32
}

impl TryFrom<RecipeRow> for StoredRecipe {
    type Error = AppError;

    fn try_from(row: RecipeRow) -> Result<Self, Self::Error> {
        let meal_type = MealType::from_label(&row.meal_type).ok_or_else(|| {
            AppError::Internal(format!("Recipe {} has unknown meal type '{}'", row.id, row.meal_type))
        })?;
        let provenance = Provenance::parse(&row.provenance).ok_or_else(|| {
            AppError::Internal(format!("Recipe {} has unknown provenance '{}'", row.id, row.provenance))
        })?;

        Ok(StoredRecipe {
            id: row.id,
            created_at: row.created_at,
            draft: RecipeDraft {
                title: row.title,
                description: row.description,
                ingredients: row.ingredients.0,
                instructions: row.instructions.0,
                cuisine: row.cuisine,
                meal_type,
                prep_time: minutes(row.prep_time),
                cook_time: minutes(row.cook_time),
                total_time: minutes(row.total_time),
                difficulty: Difficulty::from_label(&row.difficulty).unwrap_or_default(),
                dietary: DietaryFlags {
                    vegetarian: row.vegetarian,
                    vegan: row.vegan,
                    gluten_free: row.gluten_free,
                    dairy_free: row.dairy_free,
                    nut_free: row.nut_free,
                },
                spicy_level: row.spicy_level.clamp(0, RecipeDraft::MAX_SPICY_LEVEL as i16) as u8,
                tags: row.tags.0.into_iter().collect(),
                provenance,
                owner: row.owner_id,
            },
        })
    }
}

/// Recipe store backed by the `recipes` table
#[derive(Clone)]
pub struct PgRecipeStore {
    pool: PgPool,
}

impl PgRecipeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecipeStore for PgRecipeStore {
    async fn insert(&self, draft: RecipeDraft) -> AppResult<StoredRecipe> {
        draft.check_invariants().map_err(AppError::InvalidInput)?;
        let stored = StoredRecipe::new(draft);
        let d = &stored.draft;

        sqlx::query(
            r#"
            INSERT INTO recipes (
                id, title, description, ingredients, instructions, cuisine, meal_type,
                prep_time, cook_time, total_time, difficulty,
                vegetarian, vegan, gluten_free, dairy_free, nut_free,
                spicy_level, tags, provenance, owner_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(stored.id)
        .bind(&d.title)
        .bind(&d.description)
        .bind(Json(&d.ingredients))
        .bind(Json(&d.instructions))
        .bind(&d.cuisine)
        .bind(d.meal_type.as_str())
        .bind(d.prep_time as i32)
        .bind(d.cook_time as i32)
        .bind(d.total_time as i32)
        .bind(d.difficulty.as_str())
        .bind(d.dietary.vegetarian)
        .bind(d.dietary.vegan)
        .bind(d.dietary.gluten_free)
        .bind(d.dietary.dairy_free)
        .bind(d.dietary.nut_free)
        .bind(d.spicy_level as i16)
        .bind(Json(&d.tags))
        .bind(d.provenance.as_str())
        .bind(d.owner)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn delete_generated(&self, owner: UserId) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM recipes WHERE owner_id = $1 AND provenance IN ('llm-generated', 'fallback')",
        )
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_all(&self) -> AppResult<Vec<StoredRecipe>> {
        let rows: Vec<RecipeRow> =
            sqlx::query_as("SELECT * FROM recipes ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(StoredRecipe::try_from).collect()
    }

    async fn count_generated(&self, owner: UserId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM recipes WHERE owner_id = $1 AND provenance IN ('llm-generated', 'fallback')",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn count_curated(&self) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE provenance = 'curated'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PreferenceRow {
    cuisines: String,
    dietary_restrictions: String,
    allergies: String,
    health_goals: String,
    vegetarian: bool,
    vegan: bool,
    gluten_free: bool,
    dairy_free: bool,
    nut_free: bool,
    spicy_level: i16,
    sweet_level: i16,
    savory_level: i16,
    bitter_level: i16,
    sour_level: i16,
    breakfast: bool,
    lunch: bool,
    dinner: bool,
    snack: bool,
    dessert: bool,
    skill_level: Option<String>,
    cooking_time_max: Option<i32>,
}

/// Splits a comma-separated column into trimmed, non-empty entries.
///
/// A backslash escapes the next character, so `tree nuts\, almonds` stays one
/// entry. Legacy rows without escapes split on every comma.
fn split_list(value: &str) -> impl Iterator<Item = String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ',' => entries.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    entries.push(current);

    entries
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn join_list<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.replace('\\', "\\\\").replace(',', "\\,"))
        .collect::<Vec<_>>()
        .join(",")
}

fn level(value: i16) -> u8 {
    value.clamp(1, 5) as u8
}

impl From<PreferenceRow> for PreferenceProfile {
    fn from(row: PreferenceRow) -> Self {
        let flavors: BTreeMap<Flavor, u8> = [
            (Flavor::Spicy, row.spicy_level),
            (Flavor::Sweet, row.sweet_level),
            (Flavor::Savory, row.savory_level),
            (Flavor::Bitter, row.bitter_level),
            (Flavor::Sour, row.sour_level),
        ]
        .into_iter()
        .map(|(flavor, value)| (flavor, level(value)))
        .collect();

        let meal_types = [
            (MealType::Breakfast, row.breakfast),
            (MealType::Lunch, row.lunch),
            (MealType::Dinner, row.dinner),
            (MealType::Snack, row.snack),
            (MealType::Dessert, row.dessert),
        ]
        .into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(meal_type, _)| meal_type)
        .collect();

        PreferenceProfile {
            cuisines: split_list(&row.cuisines).collect(),
            dietary_restrictions: split_list(&row.dietary_restrictions)
                .map(|r| r.to_lowercase())
                .collect(),
            dietary_flags: DietaryFlags {
                vegetarian: row.vegetarian,
                vegan: row.vegan,
                gluten_free: row.gluten_free,
                dairy_free: row.dairy_free,
                nut_free: row.nut_free,
            },
            allergies: split_list(&row.allergies).collect(),
            health_goals: split_list(&row.health_goals).collect(),
            flavors,
            meal_types,
            skill_level: row.skill_level.as_deref().and_then(SkillLevel::from_label),
            max_total_time: row
                .cooking_time_max
                .filter(|minutes| *minutes > 0)
                .map(|minutes| minutes as u32),
        }
    }
}

/// Preference store backed by the `user_preferences` table
#[derive(Clone)]
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn get(&self, user_id: UserId) -> AppResult<Option<PreferenceProfile>> {
        let row: Option<PreferenceRow> =
            sqlx::query_as("SELECT * FROM user_preferences WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(PreferenceProfile::from))
    }

    async fn put(&self, user_id: UserId, profile: &PreferenceProfile) -> AppResult<()> {
        let flavor = |f: Flavor| profile.flavor_level(f) as i16;
        let meal = |m: MealType| profile.meal_types.contains(&m);

        sqlx::query(
            r#"
            INSERT INTO user_preferences (
                user_id, cuisines, dietary_restrictions, allergies, health_goals,
                vegetarian, vegan, gluten_free, dairy_free, nut_free,
                spicy_level, sweet_level, savory_level, bitter_level, sour_level,
                breakfast, lunch, dinner, snack, dessert,
                skill_level, cooking_time_max, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                cuisines = EXCLUDED.cuisines,
                dietary_restrictions = EXCLUDED.dietary_restrictions,
                allergies = EXCLUDED.allergies,
                health_goals = EXCLUDED.health_goals,
                vegetarian = EXCLUDED.vegetarian,
                vegan = EXCLUDED.vegan,
                gluten_free = EXCLUDED.gluten_free,
                dairy_free = EXCLUDED.dairy_free,
                nut_free = EXCLUDED.nut_free,
                spicy_level = EXCLUDED.spicy_level,
                sweet_level = EXCLUDED.sweet_level,
                savory_level = EXCLUDED.savory_level,
                bitter_level = EXCLUDED.bitter_level,
                sour_level = EXCLUDED.sour_level,
                breakfast = EXCLUDED.breakfast,
                lunch = EXCLUDED.lunch,
                dinner = EXCLUDED.dinner,
                snack = EXCLUDED.snack,
                dessert = EXCLUDED.dessert,
                skill_level = EXCLUDED.skill_level,
                cooking_time_max = EXCLUDED.cooking_time_max,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(join_list(&profile.cuisines))
        .bind(join_list(&profile.dietary_restrictions))
        .bind(join_list(&profile.allergies))
        .bind(join_list(&profile.health_goals))
        .bind(profile.dietary_flags.vegetarian)
        .bind(profile.dietary_flags.vegan)
        .bind(profile.dietary_flags.gluten_free)
        .bind(profile.dietary_flags.dairy_free)
        .bind(profile.dietary_flags.nut_free)
        .bind(flavor(Flavor::Spicy))
        .bind(flavor(Flavor::Sweet))
        .bind(flavor(Flavor::Savory))
        .bind(flavor(Flavor::Bitter))
        .bind(flavor(Flavor::Sour))
        .bind(meal(MealType::Breakfast))
        .bind(meal(MealType::Lunch))
        .bind(meal(MealType::Dinner))
        .bind(meal(MealType::Snack))
        .bind(meal(MealType::Dessert))
        .bind(profile.skill_level.map(|s| s.as_str()))
        .bind(profile.max_total_time.map(|m| m.min(i32::MAX as u32) as i32))
        .execute(&self.pool)
        .await?;

        tracing::debug!(user_id = %user_id, "Stored preferences");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PreferenceRow {
        PreferenceRow {
            cuisines: "Thai, Italian,, ".to_string(),
            dietary_restrictions: "Vegetarian,halal".to_string(),
            allergies: "peanuts".to_string(),
            health_goals: String::new(),
            vegetarian: false,
            vegan: true,
            gluten_free: false,
            dairy_free: false,
            nut_free: false,
            spicy_level: 9,
            sweet_level: 0,
            savory_level: 3,
            bitter_level: 3,
            sour_level: 4,
            breakfast: false,
            lunch: true,
            dinner: true,
            snack: false,
            dessert: false,
            skill_level: Some("Intermediate".to_string()),
            cooking_time_max: Some(0),
        }
    }

    #[test]
    fn test_preference_row_is_normalized() {
        let profile = PreferenceProfile::from(row());

        assert_eq!(profile.cuisines, vec!["Thai", "Italian"]);
        assert!(profile.dietary_restrictions.contains("vegetarian"));
        assert!(profile.dietary_restrictions.contains("halal"));
        assert!(profile.allergies.contains("peanuts"));
        assert!(profile.health_goals.is_empty());
        assert!(profile.dietary_flags.vegan);
        assert_eq!(profile.flavor_level(Flavor::Spicy), 5);
        assert_eq!(profile.flavor_level(Flavor::Sweet), 1);
        assert_eq!(
            profile.meal_type_rotation(),
            vec![MealType::Lunch, MealType::Dinner]
        );
        assert_eq!(profile.skill_level, Some(SkillLevel::Intermediate));
        assert_eq!(profile.max_total_time, None);
    }

    #[test]
    fn test_join_list_round_trips_through_split() {
        let items = vec![" a ".to_string(), String::new(), "b".to_string()];
        let joined = join_list(&items);
        assert_eq!(joined, "a,b");
        assert_eq!(split_list(&joined).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_entries_containing_commas_survive_storage() {
        let items = vec!["tree nuts, almonds".to_string(), r"back\slash".to_string(), "soy".to_string()];
        let joined = join_list(&items);
        assert_eq!(joined, r"tree nuts\, almonds,back\\slash,soy");
        assert_eq!(split_list(&joined).collect::<Vec<_>>(), items);
    }

    #[test]
    fn test_legacy_rows_split_on_every_comma() {
        assert_eq!(
            split_list("Thai, Italian,,Mexican").collect::<Vec<_>>(),
            vec!["Thai", "Italian", "Mexican"]
        );
    }
}
