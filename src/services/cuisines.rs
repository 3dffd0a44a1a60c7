/// Cuisine advice for free-text food queries ("I want to eat biryani")
///
/// Asks the fast model for similar dishes and falls back to a local dish
/// table when the model is unavailable, slow or returns nothing usable.
use serde_json::{Map, Value};
use std::{sync::Arc, time::Duration};

use crate::{
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{CuisineRecommendation, PreferenceProfile},
    services::{
        draft::string_list,
        llm::GenerationClient,
        parser,
        prompt::{self, PromptKind},
    },
};

const DEFAULT_FLAVOR_PROFILE: &str = "Rich and flavorful";
const DEFAULT_KEY_INGREDIENT: &str = "Various ingredients";

struct Dish {
    name: &'static str,
    description: &'static str,
    key_ingredients: &'static [&'static str],
    flavor_profile: &'static str,
}

const DISH_TABLE: &[(&str, &[Dish])] = &[
    (
        "Indian",
        &[
            Dish {
                name: "Dosa",
                description: "A thin crispy pancake made from fermented rice and lentil batter, often served with chutneys and sambar.",
                key_ingredients: &["Rice flour", "Lentils", "Fenugreek seeds", "Ghee"],
                flavor_profile: "Savory with tangy notes from fermentation",
            },
            Dish {
                name: "Vada",
                description: "Crispy savory doughnut-shaped fritters made from lentil or gram flour, often served as a breakfast item or snack.",
                key_ingredients: &["Urad dal", "Rice flour", "Ginger", "Green chilies", "Curry leaves"],
                flavor_profile: "Savory and spicy with a crispy exterior and soft interior",
            },
            Dish {
                name: "Uttapam",
                description: "A thick pancake made with a fermented rice and lentil batter, topped with vegetables and herbs.",
                key_ingredients: &["Rice", "Urad dal", "Onions", "Tomatoes", "Green chilies"],
                flavor_profile: "Savory and slightly tangy with fresh vegetable flavors",
            },
        ],
    ),
    (
        "Thai",
        &[
            Dish {
                name: "Pad Thai",
                description: "Stir-fried rice noodles with a sweet, savory and slightly sour sauce, typically with tofu, bean sprouts, peanuts and egg.",
                key_ingredients: &["Rice noodles", "Tamarind paste", "Fish sauce", "Palm sugar", "Bean sprouts", "Peanuts"],
                flavor_profile: "Sweet, sour, and savory with umami notes",
            },
            Dish {
                name: "Tom Kha Gai",
                description: "A creamy coconut soup with chicken, galangal, lemongrass and lime.",
                key_ingredients: &["Coconut milk", "Galangal", "Lemongrass", "Kaffir lime leaves", "Chicken"],
                flavor_profile: "Creamy and aromatic with sour, spicy and sweet notes",
            },
            Dish {
                name: "Green Curry",
                description: "A rich, aromatic curry made with fresh green chili paste, coconut milk and Thai basil.",
                key_ingredients: &["Green curry paste", "Coconut milk", "Thai basil", "Kaffir lime leaves", "Fish sauce"],
                flavor_profile: "Spicy, aromatic and herbaceous with a creamy texture",
            },
        ],
    ),
    (
        "Mexican",
        &[
            Dish {
                name: "Tacos al Pastor",
                description: "Marinated pork tacos cooked on a vertical spit, served on corn tortillas with pineapple, onion and cilantro.",
                key_ingredients: &["Marinated pork", "Corn tortillas", "Pineapple", "Onion", "Cilantro"],
                flavor_profile: "Savory and spicy with sweet notes from the pineapple",
            },
            Dish {
                name: "Chiles Rellenos",
                description: "Poblano peppers stuffed with cheese, battered and fried, served with a tomato-based sauce.",
                key_ingredients: &["Poblano peppers", "Cheese", "Eggs", "Tomato sauce"],
                flavor_profile: "Mild spice with a rich, cheesy interior",
            },
            Dish {
                name: "Mole Poblano",
                description: "A rich sauce of chocolate, chili peppers and spices, usually served over chicken or turkey.",
                key_ingredients: &["Chocolate", "Dried chilies", "Nuts", "Seeds", "Spices"],
                flavor_profile: "Complex mix of spicy, sweet and savory with earthy notes",
            },
        ],
    ),
    (
        "Italian",
        &[
            Dish {
                name: "Risotto ai Funghi",
                description: "Creamy rice cooked slowly with mushrooms, white wine and Parmesan.",
                key_ingredients: &["Arborio rice", "Mushrooms", "White wine", "Parmesan cheese", "Onion"],
                flavor_profile: "Rich and creamy with earthy mushroom flavors",
            },
            Dish {
                name: "Osso Buco",
                description: "Veal shanks braised with vegetables, white wine and broth, served with gremolata.",
                key_ingredients: &["Veal shanks", "Mirepoix", "White wine", "Tomatoes", "Gremolata"],
                flavor_profile: "Rich and savory with bright citrus notes",
            },
            Dish {
                name: "Spaghetti alla Carbonara",
                description: "Pasta with eggs, hard cheese, cured pork and black pepper.",
                key_ingredients: &["Spaghetti", "Eggs", "Pecorino Romano", "Guanciale or pancetta", "Black pepper"],
                flavor_profile: "Rich and savory with a silky texture and peppery finish",
            },
        ],
    ),
    (
        "Japanese",
        &[
            Dish {
                name: "Ramen",
                description: "Wheat noodles in a meat or fish broth flavored with soy sauce or miso, topped with sliced pork, nori and green onions.",
                key_ingredients: &["Wheat noodles", "Pork or chicken broth", "Soy sauce", "Chashu pork", "Nori"],
                flavor_profile: "Rich and savory with deep umami",
            },
            Dish {
                name: "Okonomiyaki",
                description: "Savory cabbage pancake with meat or seafood, topped with mayonnaise and okonomiyaki sauce.",
                key_ingredients: &["Cabbage", "Flour batter", "Eggs", "Pork belly", "Okonomiyaki sauce"],
                flavor_profile: "Savory with sweet and tangy sauce notes",
            },
            Dish {
                name: "Katsu Curry",
                description: "Breaded, deep-fried cutlet served with Japanese curry sauce over rice.",
                key_ingredients: &["Pork or chicken cutlet", "Japanese curry roux", "Rice", "Vegetables"],
                flavor_profile: "Savory, mildly spiced curry with a crispy cutlet",
            },
        ],
    ),
];

/// Cuisine affinities used when the food term matches no dish directly
const KEYWORD_AFFINITIES: &[(&[&str], &[(&str, f32)])] = &[
    (
        &["rice", "curry", "dosa", "idli"],
        &[("Indian", 0.9), ("Thai", 0.7), ("Japanese", 0.5)],
    ),
    (
        &["pasta", "pizza"],
        &[("Italian", 0.9), ("Mexican", 0.4), ("Indian", 0.2)],
    ),
    (
        &["taco", "burrito"],
        &[("Mexican", 0.9), ("Indian", 0.4), ("Thai", 0.3)],
    ),
    (
        &["sushi", "ramen"],
        &[("Japanese", 0.9), ("Thai", 0.5), ("Indian", 0.2)],
    ),
];

const GENERIC_NAMES: [&str; 4] = ["Specialty", "Delicacy", "Classic", "Favorite"];
const GENERIC_QUALIFIERS: [&str; 4] = ["Fresh", "Aromatic", "Traditional", "Local"];
const GENERIC_FLAVORS: [&str; 4] = [
    "Rich and aromatic",
    "Perfectly balanced",
    "Bold and flavorful",
    "Delicate and nuanced",
];

#[derive(Clone)]
pub struct CuisineAdvisor {
    client: Arc<dyn GenerationClient>,
    cache: Option<Cache>,
    timeout: Duration,
}

impl CuisineAdvisor {
    pub fn new(client: Arc<dyn GenerationClient>, timeout: Duration) -> Self {
        Self {
            client,
            cache: None,
            timeout,
        }
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Recommends up to `limit` (clamped to 3..=10) dishes similar to `query`.
    ///
    /// Only an empty query is an error; every model failure degrades to the
    /// local dish table. Answers are cached only for anonymous queries, since
    /// a profile changes the prompt.
    pub async fn recommend(
        &self,
        query: &str,
        limit: usize,
        profile: Option<&PreferenceProfile>,
    ) -> AppResult<Vec<CuisineRecommendation>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("Query must not be empty".to_string()));
        }
        let limit = prompt::clamp_cuisine_limit(limit);

        let cache_key = CacheKey::CuisineAdvice {
            query: query.to_string(),
            limit,
        };
        let cache = self.cache.as_ref().filter(|_| profile.is_none());

        if let Some(cache) = cache {
            match cache.get::<Vec<CuisineRecommendation>>(&cache_key).await {
                Ok(Some(cached)) => return Ok(cached),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Cuisine cache read failed"),
            }
        }

        let default_profile = PreferenceProfile::default();
        let prompt = prompt::build(
            profile.unwrap_or(&default_profile),
            &PromptKind::Cuisines { query, limit },
        );

        let from_model = match self.client.call(&prompt, self.timeout).await {
            Ok(raw) => match parser::extract(&raw) {
                Ok(value) => validate_items(&value, limit),
                Err(e) => {
                    tracing::warn!(error = %e, "Unparseable cuisine advice");
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!(client = self.client.name(), error = %e, "Cuisine advice call failed");
                Vec::new()
            }
        };

        if from_model.is_empty() {
            tracing::info!(query = %query, "Using local cuisine advice");
            return Ok(fallback_recommendations(query, limit));
        }

        if let Some(cache) = cache {
            if let Err(e) = cache.set(&cache_key, &from_model).await {
                tracing::warn!(error = %e, "Cuisine cache write failed");
            }
        }

        tracing::info!(query = %query, count = from_model.len(), "Cuisine advice from model");
        Ok(from_model)
    }
}

/// Turns parsed model output into at most `limit` recommendations.
///
/// Items without a name are skipped; other gaps are filled with defaults.
pub fn validate_items(value: &Value, limit: usize) -> Vec<CuisineRecommendation> {
    let items: Vec<&Map<String, Value>> = match value {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(validate_item)
        .take(limit)
        .collect()
}

fn validate_item(item: &Map<String, Value>) -> Option<CuisineRecommendation> {
    let name = non_empty_str(item.get("name"))?;

    let text_or = |field: &str| {
        non_empty_str(item.get(field))
            .unwrap_or_else(|| format!("Information about {} for {}", field, name))
    };

    let flavor_profile = match item.get("flavor_profile") {
        Some(Value::Array(parts)) => {
            let parts: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            Some(parts.join(", ")).filter(|s| !s.is_empty())
        }
        other => non_empty_str(other),
    }
    .unwrap_or_else(|| DEFAULT_FLAVOR_PROFILE.to_string());

    let mut key_ingredients = match item.get("key_ingredients") {
        Some(Value::String(s)) if s.trim_start().starts_with('[') => parser::extract(s)
            .map(|parsed| string_list(Some(&parsed)))
            .unwrap_or_default(),
        other => string_list(other),
    };
    if key_ingredients.is_empty() {
        key_ingredients.push(DEFAULT_KEY_INGREDIENT.to_string());
    }

    Some(CuisineRecommendation {
        description: text_or("description"),
        similarity_reason: text_or("similarity_reason"),
        name,
        key_ingredients,
        flavor_profile,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The word after "eat", else the last word, without trailing punctuation
pub fn food_term(query: &str) -> String {
    let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    let term = match words.iter().position(|w| w == "eat") {
        Some(i) if i + 1 < words.len() => &words[i + 1],
        _ => match words.last() {
            Some(last) => last,
            None => return String::new(),
        },
    };
    term.trim_matches(|c| matches!(c, '.' | ',' | '?' | '!')).to_string()
}

fn cuisine_affinities(term: &str) -> Vec<(&'static str, f32)> {
    let mut scores: Vec<(&'static str, f32)> = Vec::new();
    let mut direct_match = false;

    for (cuisine, dishes) in DISH_TABLE {
        for dish in dishes.iter() {
            let score = if !term.is_empty() && dish.name.to_lowercase().contains(term) {
                direct_match = true;
                0.9
            } else if dish.key_ingredients.iter().any(|i| i.to_lowercase() == term) {
                0.7
            } else {
                continue;
            };
            match scores.iter_mut().find(|(c, _)| c == cuisine) {
                Some((_, existing)) => *existing = existing.max(score),
                None => scores.push((*cuisine, score)),
            }
        }
    }

    if !direct_match {
        scores = KEYWORD_AFFINITIES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| term.contains(*k)))
            .map(|(_, affinities)| affinities.to_vec())
            .unwrap_or_else(|| DISH_TABLE.iter().map(|(c, _)| (*c, 0.3)).collect());
    }

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scores
}

/// Deterministic recommendations from the local dish table
pub fn fallback_recommendations(query: &str, limit: usize) -> Vec<CuisineRecommendation> {
    let term = food_term(query);
    let subject = if term.is_empty() { "this dish" } else { term.as_str() };
    let affinities = cuisine_affinities(&term);

    let mut recommendations: Vec<CuisineRecommendation> = Vec::with_capacity(limit);
    'cuisines: for (cuisine, _) in &affinities {
        let dishes = DISH_TABLE
            .iter()
            .find(|(c, _)| c == cuisine)
            .map(|(_, dishes)| *dishes)
            .unwrap_or_default();
        for dish in dishes {
            if recommendations.len() >= limit {
                break 'cuisines;
            }
            let similarity_reason = if !term.is_empty() && dish.name.to_lowercase().contains(&term) {
                format!("This is a variation of {} from {} cuisine.", subject, cuisine)
            } else {
                format!(
                    "This {} dish has a similar texture and flavor profile to {}.",
                    cuisine, subject
                )
            };
            recommendations.push(CuisineRecommendation {
                name: dish.name.to_string(),
                description: dish.description.to_string(),
                key_ingredients: dish.key_ingredients.iter().map(|s| s.to_string()).collect(),
                flavor_profile: dish.flavor_profile.to_string(),
                similarity_reason,
            });
        }
    }

    for i in recommendations.len()..limit {
        let (cuisine, _) = affinities[i % affinities.len()];
        recommendations.push(CuisineRecommendation {
            name: format!("{} {}", cuisine, GENERIC_NAMES[i % 4]),
            description: format!(
                "A traditional {} dish with flavors that complement {}.",
                cuisine, subject
            ),
            key_ingredients: vec![
                format!("{} ingredients", GENERIC_QUALIFIERS[i % 4]),
                format!("{} spices and herbs", cuisine),
                "Regional vegetables".to_string(),
                "Authentic seasonings".to_string(),
            ],
            flavor_profile: GENERIC_FLAVORS[i % 4].to_string(),
            similarity_reason: format!(
                "Uses cooking techniques and flavor combinations that would appeal to fans of {}.",
                subject
            ),
        });
    }

    recommendations
}
