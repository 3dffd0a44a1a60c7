/// Prompt construction for recipe and cuisine requests
///
/// Pure and deterministic: the same profile and kind always produce the same
/// text. Every prompt ends with the output schema rendered from the field
/// tables below, which the draft normaliser reads from as well.
use std::fmt::Write;

use crate::models::{Flavor, MealType, PreferenceProfile};

pub const MIN_CUISINE_LIMIT: usize = 3;
pub const MAX_CUISINE_LIMIT: usize = 10;

const MIN_TIME_LIMIT: u32 = 5;
const MAX_TIME_LIMIT: u32 = 24 * 60;

/// One field of the JSON shape a prompt asks for
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub json_type: &'static str,
    pub hint: &'static str,
}

const fn field(name: &'static str, json_type: &'static str, hint: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        json_type,
        hint,
    }
}

pub const RECIPE_FIELDS: &[FieldSpec] = &[
    field("title", "string", "recipe title"),
    field("description", "string", "brief description of the dish"),
    field("ingredients", "array of strings", "each ingredient with its quantity"),
    field("instructions", "array of strings", "one step per element"),
    field("cuisine", "string", "cuisine of the dish"),
    field("meal_type", "string", "one of breakfast, lunch, dinner, snack, dessert"),
    field("prep_time", "integer", "preparation time in minutes"),
    field("cook_time", "integer", "cooking time in minutes"),
    field("total_time", "integer", "prep_time plus cook_time"),
    field("difficulty", "string", "one of easy, medium, hard"),
    field("vegetarian", "boolean", ""),
    field("vegan", "boolean", ""),
    field("gluten_free", "boolean", ""),
    field("dairy_free", "boolean", ""),
    field("nut_free", "boolean", ""),
    field("spicy_level", "integer", "0 (not spicy) to 4 (very spicy)"),
    field("tags", "array of strings", "short descriptive tags"),
];

pub const CUISINE_FIELDS: &[FieldSpec] = &[
    field("name", "string", "cuisine or dish name"),
    field("description", "string", "one or two sentences"),
    field("key_ingredients", "array of strings", ""),
    field("flavor_profile", "string", ""),
    field("similarity_reason", "string", "why it resembles the query"),
];

/// What the prompt asks the model to produce
#[derive(Debug, Clone, Copy)]
pub enum PromptKind<'a> {
    /// A single recipe, optionally pinned to one cuisine
    Recipe {
        cuisine: Option<&'a str>,
        meal_type: MealType,
    },
    /// A list of cuisines resembling a free-text food query
    Cuisines { query: &'a str, limit: usize },
}

pub fn clamp_cuisine_limit(limit: usize) -> usize {
    limit.clamp(MIN_CUISINE_LIMIT, MAX_CUISINE_LIMIT)
}

pub fn build(profile: &PreferenceProfile, kind: &PromptKind<'_>) -> String {
    match kind {
        PromptKind::Recipe { cuisine, meal_type } => recipe_prompt(profile, *cuisine, *meal_type),
        PromptKind::Cuisines { query, limit } => cuisine_prompt(profile, query, *limit),
    }
}

fn recipe_prompt(profile: &PreferenceProfile, cuisine: Option<&str>, meal_type: MealType) -> String {
    let mut prompt = String::from("Create a detailed recipe with the following specifications:\n\n");

    let cuisines: Vec<&str> = match cuisine.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => vec![c],
        None => profile.distinct_cuisines(),
    };
    if !cuisines.is_empty() {
        let _ = writeln!(prompt, "CUISINE PREFERENCES (VERY IMPORTANT): {}", cuisines.join(", "));
        prompt.push_str(
            "The recipe must strongly reflect this cuisine in both ingredients and preparation.\n\n",
        );
    }

    let restrictions: Vec<String> = profile.combined_restrictions().into_iter().collect();
    if !restrictions.is_empty() {
        let _ = writeln!(prompt, "DIETARY RESTRICTIONS (STRICTLY FOLLOW): {}", restrictions.join(", "));
        prompt.push_str("Do not include any ingredient these restrictions prohibit.\n\n");
    }

    let allergies = profile.allergy_constraints();
    if !allergies.is_empty() {
        let _ = writeln!(prompt, "ALLERGIES (STRICTLY AVOID - CRITICAL): {}", allergies.join(", "));
        prompt.push_str("The user is allergic to these items. They must be completely absent from the recipe.\n\n");
    }

    let goals: Vec<&str> = profile
        .health_goals
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .collect();
    if !goals.is_empty() {
        let _ = writeln!(prompt, "HEALTH GOALS (Consider): {}\n", goals.join(", "));
    }

    prompt.push_str("FLAVOR PREFERENCES (1-5):");
    for flavor in Flavor::ALL {
        let _ = write!(prompt, " {} {}/5;", flavor.as_str(), profile.flavor_level(flavor));
    }
    let _ = writeln!(
        prompt,
        "\nTarget spicy level: {} on a 0-4 scale\n",
        profile.spicy_target()
    );

    let _ = writeln!(prompt, "Meal type: {}", meal_type);
    if let Some(skill) = profile.skill_level {
        let _ = writeln!(prompt, "Cooking skill level: {}", skill.as_str());
    }
    if let Some(limit) = profile.max_total_time {
        let _ = writeln!(
            prompt,
            "Maximum total time: {} minutes",
            limit.clamp(MIN_TIME_LIMIT, MAX_TIME_LIMIT)
        );
    }

    prompt.push_str("\nReturn ONLY a valid JSON object with exactly these fields. Do not include any additional text, explanation or markdown.\n");
    render_schema(&mut prompt, RECIPE_FIELDS);
    prompt
}

fn cuisine_prompt(profile: &PreferenceProfile, query: &str, limit: usize) -> String {
    let limit = clamp_cuisine_limit(limit);
    let mut prompt = format!(
        "Give exactly {} cuisine recommendations similar to \"{}\" as a JSON array.\n",
        limit,
        query.trim()
    );

    let restrictions: Vec<String> = profile.combined_restrictions().into_iter().collect();
    if !restrictions.is_empty() {
        let _ = writeln!(prompt, "DIETARY RESTRICTIONS (STRICTLY FOLLOW): {}", restrictions.join(", "));
    }
    let allergies = profile.allergy_constraints();
    if !allergies.is_empty() {
        let _ = writeln!(prompt, "ALLERGIES (STRICTLY AVOID - CRITICAL): {}", allergies.join(", "));
    }

    prompt.push_str("\nReturn ONLY a valid JSON array, no other text. Each element must have exactly these fields:\n");
    render_schema(&mut prompt, CUISINE_FIELDS);
    prompt
}

fn render_schema(prompt: &mut String, fields: &[FieldSpec]) {
    for spec in fields {
        if spec.hint.is_empty() {
            let _ = writeln!(prompt, "- \"{}\" ({})", spec.name, spec.json_type);
        } else {
            let _ = writeln!(prompt, "- \"{}\" ({}): {}", spec.name, spec.json_type, spec.hint);
        }
    }
}
