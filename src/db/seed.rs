use std::collections::BTreeSet;

use crate::{
    db::RecipeStore,
    error::AppResult,
    models::{DietaryFlags, Difficulty, MealType, Provenance, RecipeDraft},
};

struct Curated {
    title: &'static str,
    description: &'static str,
    cuisine: &'static str,
    meal_type: MealType,
    ingredients: &'static [&'static str],
    instructions: &'static [&'static str],
    prep_time: u32,
    cook_time: u32,
    difficulty: Difficulty,
    dietary: DietaryFlags,
    spicy_level: u8,
    tags: &'static [&'static str],
}

const CURATED: &[Curated] = &[
    Curated {
        title: "Mushroom Risotto",
        description: "Creamy arborio rice slowly cooked with mushrooms and parmesan.",
        cuisine: "Italian",
        meal_type: MealType::Dinner,
        ingredients: &["Arborio rice", "Mixed mushrooms", "Vegetable stock", "Parmesan", "Butter", "Shallot", "White wine"],
        instructions: &["Sauté shallot and mushrooms", "Toast the rice", "Add stock a ladle at a time", "Stir in butter and parmesan"],
        prep_time: 10,
        cook_time: 30,
        difficulty: Difficulty::Medium,
        dietary: DietaryFlags { vegetarian: true, vegan: false, gluten_free: true, dairy_free: false, nut_free: true },
        spicy_level: 0,
        tags: &["comfort", "rice"],
    },
    Curated {
        title: "Beef Tacos",
        description: "Street-style tacos with seasoned beef, salsa and fresh coriander.",
        cuisine: "Mexican",
        meal_type: MealType::Dinner,
        ingredients: &["Ground beef", "Corn tortillas", "Tomato salsa", "Onion", "Coriander", "Lime", "Chili powder"],
        instructions: &["Brown the beef with spices", "Warm the tortillas", "Fill and top with salsa and coriander"],
        prep_time: 10,
        cook_time: 15,
        difficulty: Difficulty::Easy,
        dietary: DietaryFlags { vegetarian: false, vegan: false, gluten_free: true, dairy_free: true, nut_free: true },
        spicy_level: 2,
        tags: &["street food", "quick"],
    },
    Curated {
        title: "Thai Green Curry",
        description: "Spicy coconut curry with chicken, vegetables and Thai basil.",
        cuisine: "Thai",
        meal_type: MealType::Dinner,
        ingredients: &["Green curry paste", "Coconut milk", "Chicken thighs", "Thai basil", "Bamboo shoots", "Fish sauce"],
        instructions: &["Fry the curry paste", "Add coconut milk and chicken", "Simmer with vegetables", "Finish with basil"],
        prep_time: 15,
        cook_time: 20,
        difficulty: Difficulty::Medium,
        dietary: DietaryFlags { vegetarian: false, vegan: false, gluten_free: true, dairy_free: true, nut_free: true },
        spicy_level: 3,
        tags: &["curry", "spicy"],
    },
    Curated {
        title: "Shakshuka",
        description: "Eggs poached in a spiced tomato and pepper sauce.",
        cuisine: "Middle Eastern",
        meal_type: MealType::Breakfast,
        ingredients: &["Eggs", "Canned tomatoes", "Red pepper", "Onion", "Cumin", "Paprika"],
        instructions: &["Soften onion and pepper", "Add tomatoes and spices", "Crack in the eggs", "Cover until set"],
        prep_time: 10,
        cook_time: 20,
        difficulty: Difficulty::Easy,
        dietary: DietaryFlags { vegetarian: true, vegan: false, gluten_free: true, dairy_free: true, nut_free: true },
        spicy_level: 1,
        tags: &["eggs", "one pan"],
    },
    Curated {
        title: "Vegetable Sushi Rolls",
        description: "Maki rolls with cucumber, avocado and pickled carrot.",
        cuisine: "Japanese",
        meal_type: MealType::Lunch,
        ingredients: &["Sushi rice", "Nori", "Cucumber", "Avocado", "Carrot", "Rice vinegar"],
        instructions: &["Season the rice", "Spread rice on nori", "Add fillings and roll", "Slice and serve"],
        prep_time: 30,
        cook_time: 15,
        difficulty: Difficulty::Hard,
        dietary: DietaryFlags { vegetarian: true, vegan: true, gluten_free: true, dairy_free: true, nut_free: true },
        spicy_level: 0,
        tags: &["rice", "rolls"],
    },
    Curated {
        title: "Chana Masala",
        description: "Chickpeas simmered in a tangy tomato and onion masala.",
        cuisine: "Indian",
        meal_type: MealType::Lunch,
        ingredients: &["Chickpeas", "Tomatoes", "Onion", "Ginger", "Garlic", "Garam masala", "Green chili"],
        instructions: &["Fry onion, ginger and garlic", "Add spices and tomatoes", "Simmer with chickpeas"],
        prep_time: 10,
        cook_time: 25,
        difficulty: Difficulty::Easy,
        dietary: DietaryFlags { vegetarian: true, vegan: true, gluten_free: true, dairy_free: true, nut_free: true },
        spicy_level: 2,
        tags: &["curry", "legumes"],
    },
    Curated {
        title: "Hummus with Crudités",
        description: "Smooth chickpea and tahini dip served with raw vegetables.",
        cuisine: "Mediterranean",
        meal_type: MealType::Snack,
        ingredients: &["Chickpeas", "Tahini", "Lemon juice", "Garlic", "Olive oil", "Carrot sticks", "Cucumber"],
        instructions: &["Blend chickpeas with tahini, lemon and garlic", "Drizzle with olive oil", "Serve with vegetables"],
        prep_time: 10,
        cook_time: 0,
        difficulty: Difficulty::Easy,
        dietary: DietaryFlags { vegetarian: true, vegan: true, gluten_free: true, dairy_free: true, nut_free: true },
        spicy_level: 0,
        tags: &["dip", "no cook"],
    },
    Curated {
        title: "Mango Sticky Rice",
        description: "Sweet coconut glutinous rice with ripe mango.",
        cuisine: "Thai",
        meal_type: MealType::Dessert,
        ingredients: &["Glutinous rice", "Coconut milk", "Sugar", "Salt", "Ripe mango"],
        instructions: &["Steam the rice", "Stir in sweetened coconut milk", "Serve with sliced mango"],
        prep_time: 15,
        cook_time: 25,
        difficulty: Difficulty::Medium,
        dietary: DietaryFlags { vegetarian: true, vegan: true, gluten_free: true, dairy_free: true, nut_free: true },
        spicy_level: 0,
        tags: &["sweet", "fruit"],
    },
];

/// The shared recipes every user can see
pub fn curated_recipes() -> Vec<RecipeDraft> {
    CURATED
        .iter()
        .map(|c| RecipeDraft {
            title: c.title.to_string(),
            description: c.description.to_string(),
            ingredients: c.ingredients.iter().map(|s| s.to_string()).collect(),
            instructions: c.instructions.iter().map(|s| s.to_string()).collect(),
            cuisine: c.cuisine.to_string(),
            meal_type: c.meal_type,
            prep_time: c.prep_time,
            cook_time: c.cook_time,
            total_time: c.prep_time + c.cook_time,
            difficulty: c.difficulty,
            dietary: c.dietary,
            spicy_level: c.spicy_level,
            tags: c.tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            provenance: Provenance::Curated,
            owner: None,
        })
        .collect()
}

/// Inserts the curated recipes unless some are already stored
pub async fn seed_curated(store: &dyn RecipeStore) -> AppResult<usize> {
    if store.count_curated().await? > 0 {
        tracing::debug!("Curated recipes already present, skipping seed");
        return Ok(0);
    }

    let recipes = curated_recipes();
    let count = recipes.len();
    for draft in recipes {
        store.insert(draft).await?;
    }

    tracing::info!(count, "Seeded curated recipes");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryRecipeStore;

    #[test]
    fn test_curated_recipes_satisfy_invariants() {
        for draft in curated_recipes() {
            assert!(draft.check_invariants().is_ok(), "{}", draft.title);
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = InMemoryRecipeStore::new();
        assert_eq!(seed_curated(&store).await.unwrap(), CURATED.len());
        assert_eq!(seed_curated(&store).await.unwrap(), 0);
        assert_eq!(store.count_curated().await.unwrap() as usize, CURATED.len());
    }
}
