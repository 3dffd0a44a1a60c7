/// Normalisation of parsed model output into a [`RecipeDraft`]
///
/// Models disagree on field types: lists arrive as delimited strings, numbers
/// as "15 minutes", booleans as "yes". Missing optional fields are filled with
/// defaults drawn from the request and the user's profile. Only a draft with
/// no usable ingredients or instructions is rejected.
use rand::{seq::SliceRandom, Rng};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::models::{
    DietaryFlags, Difficulty, MealType, PreferenceProfile, Provenance, RecipeDraft, UserId,
};

pub const DEFAULT_TITLE: &str = "Generated Recipe";
pub const DEFAULT_PREP_TIME: u32 = 10;
pub const DEFAULT_COOK_TIME: u32 = 30;
/// Ceiling for any model-supplied duration: one day
pub const MAX_MINUTES: u32 = 24 * 60;
const DEFAULT_CUISINE: &str = "International";

/// Dishes models return far more often than asked
const OVERPRODUCED_DISHES: &[&str] = &[
    "mushroom risotto",
    "margherita pizza",
    "tomato spaghetti",
    "chicken curry",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DraftError {
    #[error("model output is not a JSON object")]
    NotAnObject,

    #[error("recipe has no ingredients")]
    MissingIngredients,

    #[error("recipe has no instructions")]
    MissingInstructions,
}

/// Request-side facts used to fill gaps in model output
#[derive(Debug, Clone, Copy)]
pub struct DraftContext<'a> {
    pub owner: UserId,
    pub cuisine: Option<&'a str>,
    pub meal_type: MealType,
    pub profile: &'a PreferenceProfile,
}

pub fn draft_from_value(value: &Value, ctx: &DraftContext<'_>) -> Result<RecipeDraft, DraftError> {
    let object = match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .iter()
            .find_map(Value::as_object)
            .ok_or(DraftError::NotAnObject)?,
        _ => return Err(DraftError::NotAnObject),
    };

    let ingredients = string_list(first_of(object, &["ingredients"]));
    if ingredients.is_empty() {
        return Err(DraftError::MissingIngredients);
    }
    let instructions = string_list(first_of(object, &["instructions", "steps", "directions"]));
    if instructions.is_empty() {
        return Err(DraftError::MissingInstructions);
    }

    let cuisine = text_field(object, &["cuisine", "cuisine_type"])
        .or_else(|| ctx.cuisine.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_CUISINE.to_string());

    let meal_type = text_field(object, &["meal_type"])
        .and_then(|m| MealType::from_label(&m))
        .unwrap_or(ctx.meal_type);

    let title = text_field(object, &["title", "name"]).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let description = text_field(object, &["description"])
        .unwrap_or_else(|| format!("A {} {} recipe.", cuisine, meal_type));

    let prep_time = minutes_field(object, "prep_time").unwrap_or(DEFAULT_PREP_TIME);
    let cook_time = minutes_field(object, "cook_time").unwrap_or(DEFAULT_COOK_TIME);
    let total_time =
        minutes_field(object, "total_time").unwrap_or_else(|| prep_time.saturating_add(cook_time));

    let difficulty = text_field(object, &["difficulty"])
        .and_then(|d| Difficulty::from_label(&d))
        .unwrap_or_default();

    let defaults = ctx.profile.dietary_flags;
    let dietary = DietaryFlags {
        vegetarian: bool_field(object, "vegetarian").unwrap_or(defaults.vegetarian),
        vegan: bool_field(object, "vegan").unwrap_or(defaults.vegan),
        gluten_free: bool_field(object, "gluten_free").unwrap_or(defaults.gluten_free),
        dairy_free: bool_field(object, "dairy_free").unwrap_or(defaults.dairy_free),
        nut_free: bool_field(object, "nut_free").unwrap_or(defaults.nut_free),
    };

    let spicy_level = minutes_field(object, "spicy_level")
        .map(|level| level.min(RecipeDraft::MAX_SPICY_LEVEL as u32) as u8)
        .unwrap_or_else(|| ctx.profile.spicy_target());

    let tags: BTreeSet<String> = string_list(first_of(object, &["tags"]))
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect();

    Ok(RecipeDraft {
        title,
        description,
        ingredients,
        instructions,
        cuisine,
        meal_type,
        prep_time,
        cook_time,
        total_time,
        difficulty,
        dietary,
        spicy_level,
        tags,
        provenance: Provenance::LlmGenerated,
        owner: Some(ctx.owner),
    })
}

/// Accepts a JSON list or a delimited string.
///
/// Strings containing line breaks are split on lines, otherwise on commas.
/// Fragments are trimmed and empty ones dropped.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Object(map) => map
                    .get("name")
                    .or_else(|| map.get("item"))
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(text)) => {
            let parts: Vec<&str> = if text.contains('\n') {
                text.lines().collect()
            } else {
                text.split(',').collect()
            };
            parts
                .into_iter()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Prefixes over-produced dish titles with a random variation
pub fn decorate_repeated_dish<R: Rng + ?Sized>(title: &str, cuisine: &str, rng: &mut R) -> String {
    let lowered = title.to_lowercase();
    if !OVERPRODUCED_DISHES.iter().any(|dish| lowered.contains(dish)) {
        return title.to_string();
    }

    let cuisine = if cuisine.trim().is_empty() { "Fusion" } else { cuisine.trim() };
    let variations = [
        format!("{} Inspired Dish", cuisine),
        "Seasonal Special".to_string(),
        "Chef's Creation".to_string(),
        "Flavor Fusion".to_string(),
        "Signature Dish".to_string(),
        format!("{} Twist", cuisine),
        "House Special".to_string(),
        "Gourmet Edition".to_string(),
    ];
    let prefix = variations
        .choose(rng)
        .map(String::as_str)
        .unwrap_or("Chef's Creation");

    tracing::debug!(title = %title, prefix = %prefix, "Decorating over-produced dish title");
    format!("{} - {}", prefix, title)
}

fn first_of<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key)).filter(|v| !v.is_null())
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_of(object, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Non-negative integer from a number or a string such as "15 minutes",
/// capped at [`MAX_MINUTES`]
fn minutes_field(object: &Map<String, Value>, key: &str) -> Option<u32> {
    let minutes = match object.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            // Overlong digit runs are saturated rather than rejected
            match digits.parse::<u64>() {
                Ok(n) => Some(n),
                Err(_) if !digits.is_empty() => Some(u64::MAX),
                Err(_) => None,
            }
        }
        _ => None,
    }?;
    Some(minutes.min(MAX_MINUTES as u64) as u32)
}

fn bool_field(object: &Map<String, Value>, key: &str) -> Option<bool> {
    match object.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
