/// Local recipe synthesis for when the model is unavailable or unreliable
///
/// Always succeeds. Content is illustrative: templates fill in the cuisine
/// but ingredient and instruction lists are fixed per template.
use rand::{seq::SliceRandom, Rng};
use std::collections::BTreeSet;

use crate::models::{DietaryFlags, Difficulty, MealType, Provenance, RecipeDraft, UserId};

pub const FALLBACK_CUISINES: &[&str] = &[
    "Mediterranean",
    "Asian",
    "Mexican",
    "Italian",
    "Indian",
    "Thai",
    "Vietnamese",
];

const TITLE_SUFFIXES: &[&str] = &[
    "with a Twist",
    "Special",
    "Chef's Style",
    "Home-style",
    "Traditional",
    "Modern",
    "Signature",
    "Express",
    "Deluxe",
    "Classic",
];

const SUBSTITUTE_INGREDIENT: &str = "Seasonal vegetables";

struct Template {
    dish: &'static str,
    /// `{cuisine}` is replaced with the chosen cuisine
    description: &'static str,
    ingredients: &'static [&'static str],
    instructions: &'static [&'static str],
    prep_time: u32,
    cook_time: u32,
    dietary: DietaryFlags,
    spicy_level: u8,
    difficulty: Difficulty,
    tags: &'static [&'static str],
}

const fn flags(vegetarian: bool, vegan: bool, gluten_free: bool, dairy_free: bool) -> DietaryFlags {
    DietaryFlags {
        vegetarian,
        vegan,
        gluten_free,
        dairy_free,
        nut_free: true,
    }
}

const BREAKFAST: &[Template] = &[
    Template {
        dish: "Vegetable Frittata",
        description: "A light and fluffy egg dish with fresh vegetables and herbs in {cuisine} style.",
        ingredients: &["Eggs", "Bell peppers", "Onion", "Spinach", "Herbs", "Olive oil", "Salt", "Pepper"],
        instructions: &["Sauté vegetables", "Beat eggs", "Combine and cook until set", "Finish under broiler"],
        prep_time: 10,
        cook_time: 15,
        dietary: flags(true, false, true, true),
        spicy_level: 1,
        difficulty: Difficulty::Easy,
        tags: &["breakfast", "egg", "healthy"],
    },
    Template {
        dish: "Breakfast Bowl",
        description: "A nutritious grain bowl with protein and vegetables inspired by {cuisine} flavors.",
        ingredients: &["Quinoa", "Avocado", "Cherry tomatoes", "Poached egg", "Fresh herbs", "Lemon juice"],
        instructions: &["Cook quinoa", "Prepare vegetables", "Poach egg", "Assemble bowl", "Add dressing"],
        prep_time: 15,
        cook_time: 20,
        dietary: flags(true, false, true, true),
        spicy_level: 1,
        difficulty: Difficulty::Medium,
        tags: &["breakfast", "bowl", "healthy"],
    },
    Template {
        dish: "Savory Porridge",
        description: "A comforting savory porridge with {cuisine}-inspired toppings and seasonings.",
        ingredients: &["Steel-cut oats", "Vegetable broth", "Scallions", "Ginger", "Garlic", "Soy sauce", "Sesame oil"],
        instructions: &["Cook oats in broth", "Prepare toppings", "Season to taste", "Assemble and serve hot"],
        prep_time: 5,
        cook_time: 25,
        dietary: flags(true, true, true, true),
        spicy_level: 2,
        difficulty: Difficulty::Easy,
        tags: &["breakfast", "porridge", "savory"],
    },
];

const LUNCH: &[Template] = &[
    Template {
        dish: "Grain Salad",
        description: "A refreshing salad combining grains, vegetables and herbs with a {cuisine} dressing.",
        ingredients: &["Farro", "Cucumber", "Cherry tomatoes", "Red onion", "Feta cheese", "Olive oil", "Lemon juice"],
        instructions: &["Cook grain", "Chop vegetables", "Make dressing", "Combine ingredients", "Serve chilled"],
        prep_time: 15,
        cook_time: 20,
        dietary: flags(true, false, false, false),
        spicy_level: 1,
        difficulty: Difficulty::Easy,
        tags: &["lunch", "salad", "healthy"],
    },
    Template {
        dish: "Vegetable Wrap",
        description: "A flavorful wrap filled with roasted vegetables and a sauce inspired by {cuisine}.",
        ingredients: &["Tortilla", "Roasted vegetables", "Hummus", "Fresh herbs", "Lemon juice"],
        instructions: &["Roast vegetables", "Warm tortilla", "Spread hummus", "Add vegetables", "Roll and serve"],
        prep_time: 10,
        cook_time: 15,
        dietary: flags(true, true, false, true),
        spicy_level: 2,
        difficulty: Difficulty::Easy,
        tags: &["lunch", "wrap", "vegetarian"],
    },
    Template {
        dish: "Noodle Bowl",
        description: "A satisfying bowl of noodles with vegetables and protein in a {cuisine}-inspired sauce.",
        ingredients: &["Rice noodles", "Mixed vegetables", "Tofu", "Herbs", "Lime", "Soy sauce"],
        instructions: &["Cook noodles", "Prepare vegetables and protein", "Make sauce", "Combine in bowl", "Garnish and serve"],
        prep_time: 15,
        cook_time: 15,
        dietary: flags(true, true, true, true),
        spicy_level: 2,
        difficulty: Difficulty::Medium,
        tags: &["lunch", "noodles", "bowl"],
    },
];

const DINNER: &[Template] = &[
    Template {
        dish: "Roasted Vegetable Bowl",
        description: "A hearty bowl of roasted seasonal vegetables with grains in {cuisine} style.",
        ingredients: &["Mixed vegetables", "Quinoa", "Olive oil", "Herbs", "Lemon", "Garlic"],
        instructions: &["Roast vegetables", "Cook quinoa", "Prepare sauce", "Combine in bowl", "Garnish and serve"],
        prep_time: 15,
        cook_time: 30,
        dietary: flags(true, true, true, true),
        spicy_level: 2,
        difficulty: Difficulty::Medium,
        tags: &["dinner", "vegetable", "healthy"],
    },
    Template {
        dish: "Herb-Crusted Fish",
        description: "A delicate fish fillet with a flavorful herb crust inspired by {cuisine}.",
        ingredients: &["White fish", "Fresh herbs", "Breadcrumbs", "Lemon", "Olive oil", "Garlic"],
        instructions: &["Prepare herb crust", "Season fish", "Apply crust", "Bake", "Serve with lemon"],
        prep_time: 15,
        cook_time: 20,
        dietary: flags(false, false, false, true),
        spicy_level: 1,
        difficulty: Difficulty::Medium,
        tags: &["dinner", "fish", "seafood"],
    },
    Template {
        dish: "Stuffed Bell Peppers",
        description: "Bell peppers stuffed with grains, vegetables and spices in {cuisine} style.",
        ingredients: &["Bell peppers", "Rice", "Onions", "Garlic", "Tomatoes", "Herbs", "Spices"],
        instructions: &["Prepare peppers", "Cook filling", "Stuff peppers", "Bake until tender", "Garnish and serve"],
        prep_time: 20,
        cook_time: 40,
        dietary: flags(true, true, true, true),
        spicy_level: 2,
        difficulty: Difficulty::Medium,
        tags: &["dinner", "stuffed", "baked"],
    },
];

const SNACK: &[Template] = &[
    Template {
        dish: "Vegetable Dip",
        description: "A flavorful dip made with vegetables and herbs in {cuisine} style.",
        ingredients: &["Yogurt", "Cucumber", "Garlic", "Fresh herbs", "Lemon juice", "Olive oil"],
        instructions: &["Grate cucumber", "Mix with yogurt", "Add herbs and seasonings", "Chill", "Serve with vegetables"],
        prep_time: 10,
        cook_time: 0,
        dietary: flags(true, false, true, false),
        spicy_level: 1,
        difficulty: Difficulty::Easy,
        tags: &["snack", "dip", "vegetable"],
    },
    Template {
        dish: "Spiced Chickpeas",
        description: "Crispy roasted chickpeas seasoned with {cuisine} spices for a protein-rich snack.",
        ingredients: &["Chickpeas", "Olive oil", "Spice blend", "Salt"],
        instructions: &["Dry chickpeas", "Toss with oil and spices", "Roast until crispy", "Cool and store"],
        prep_time: 5,
        cook_time: 30,
        dietary: flags(true, true, true, true),
        spicy_level: 3,
        difficulty: Difficulty::Easy,
        tags: &["snack", "chickpeas", "crunchy"],
    },
    Template {
        dish: "Vegetable Fritters",
        description: "Light and crispy vegetable fritters with {cuisine} seasonings.",
        ingredients: &["Grated vegetables", "Flour", "Eggs", "Herbs", "Spices", "Oil for frying"],
        instructions: &["Grate vegetables", "Mix batter", "Form patties", "Fry until golden", "Drain and serve"],
        prep_time: 15,
        cook_time: 10,
        dietary: flags(true, false, false, true),
        spicy_level: 2,
        difficulty: Difficulty::Medium,
        tags: &["snack", "fritters", "fried"],
    },
];

const DESSERT: &[Template] = &[
    Template {
        dish: "Fruit Compote",
        description: "A lightly sweetened fruit dessert with spices inspired by {cuisine}.",
        ingredients: &["Seasonal fruits", "Honey", "Lemon", "Cinnamon", "Vanilla"],
        instructions: &["Prepare fruits", "Add sweetener and spices", "Simmer", "Cool", "Serve with yogurt"],
        prep_time: 10,
        cook_time: 15,
        dietary: flags(true, true, true, true),
        spicy_level: 0,
        difficulty: Difficulty::Easy,
        tags: &["dessert", "fruit", "light"],
    },
    Template {
        dish: "Spiced Cake",
        description: "A moist cake flavored with aromatic spices common in {cuisine} cooking.",
        ingredients: &["Flour", "Sugar", "Eggs", "Butter", "Spices", "Vanilla"],
        instructions: &["Mix dry ingredients", "Cream butter and sugar", "Add eggs", "Combine mixtures", "Bake"],
        prep_time: 20,
        cook_time: 30,
        dietary: flags(true, false, false, false),
        spicy_level: 1,
        difficulty: Difficulty::Medium,
        tags: &["dessert", "cake", "baked"],
    },
    Template {
        dish: "Rice Pudding",
        description: "A creamy rice pudding infused with {cuisine} flavors and spices.",
        ingredients: &["Rice", "Milk", "Sugar", "Cinnamon", "Cardamom", "Rose water"],
        instructions: &["Cook rice", "Add milk and spices", "Simmer until creamy", "Add sweeteners", "Chill and serve"],
        prep_time: 5,
        cook_time: 35,
        dietary: flags(true, false, true, false),
        spicy_level: 0,
        difficulty: Difficulty::Easy,
        tags: &["dessert", "pudding", "creamy"],
    },
];

fn templates_for(meal_type: MealType) -> &'static [Template] {
    match meal_type {
        MealType::Breakfast => BREAKFAST,
        MealType::Lunch => LUNCH,
        MealType::Dinner => DINNER,
        MealType::Snack => SNACK,
        MealType::Dessert => DESSERT,
    }
}

fn mentions_allergen(ingredient: &str, allergies: &BTreeSet<String>) -> bool {
    let ingredient = ingredient.to_lowercase();
    allergies
        .iter()
        .map(|a| a.trim().to_lowercase())
        .any(|a| !a.is_empty() && ingredient.contains(&a))
}

/// Builds a fallback draft for `owner`.
///
/// Uses the first non-blank cuisine, or a random one. The meal type label is
/// resolved through the synonym map; unknown or absent labels pick one at
/// random. Templates free of the given allergens are preferred; when none
/// are, the offending ingredients are dropped.
pub fn synthesize<R: Rng + ?Sized>(
    cuisines: &[String],
    meal_type: Option<&str>,
    allergies: &BTreeSet<String>,
    owner: UserId,
    rng: &mut R,
) -> RecipeDraft {
    let cuisine = cuisines
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            FALLBACK_CUISINES
                .choose(rng)
                .copied()
                .unwrap_or("Mediterranean")
                .to_string()
        });

    let meal_type = meal_type
        .and_then(MealType::from_label)
        .unwrap_or_else(|| *MealType::ALL.choose(rng).unwrap_or(&MealType::Dinner));

    let templates = templates_for(meal_type);
    let safe: Vec<&Template> = templates
        .iter()
        .filter(|t| !t.ingredients.iter().any(|i| mentions_allergen(i, allergies)))
        .collect();
    let template = match safe.choose(rng) {
        Some(t) => *t,
        None => templates.choose(rng).unwrap_or(&templates[0]),
    };

    let mut ingredients: Vec<String> = template
        .ingredients
        .iter()
        .filter(|i| !mentions_allergen(i, allergies))
        .map(|i| i.to_string())
        .collect();
    if ingredients.is_empty() {
        ingredients.push(SUBSTITUTE_INGREDIENT.to_string());
    }

    let suffix = TITLE_SUFFIXES.choose(rng).copied().unwrap_or("Special");
    let title = format!("{} {} - {}", cuisine, template.dish, suffix);

    tracing::debug!(
        title = %title,
        meal_type = %meal_type,
        "Synthesized fallback recipe"
    );

    RecipeDraft {
        title,
        description: template.description.replace("{cuisine}", &cuisine),
        ingredients,
        instructions: template.instructions.iter().map(|s| s.to_string()).collect(),
        cuisine,
        meal_type,
        prep_time: template.prep_time,
        cook_time: template.cook_time,
        total_time: template.prep_time + template.cook_time,
        difficulty: template.difficulty,
        dietary: template.dietary,
        spicy_level: template.spicy_level,
        tags: template.tags.iter().map(|t| t.to_string()).collect(),
        provenance: Provenance::Fallback,
        owner: Some(owner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use uuid::Uuid;

    #[test]
    fn test_every_meal_type_has_at_least_three_templates() {
        for meal_type in MealType::ALL {
            assert!(templates_for(meal_type).len() >= 3, "{}", meal_type);
        }
    }

    #[test]
    fn test_synthesize_is_total_for_empty_inputs() {
        let mut rng = StdRng::seed_from_u64(42);
        let owner = Uuid::new_v4();
        for _ in 0..50 {
            let draft = synthesize(&[], None, &BTreeSet::new(), owner, &mut rng);
            assert!(!draft.title.is_empty());
            assert!(!draft.ingredients.is_empty());
            assert!(!draft.instructions.is_empty());
            assert!(MealType::ALL.contains(&draft.meal_type));
            assert!(FALLBACK_CUISINES.contains(&draft.cuisine.as_str()));
            assert!(draft.check_invariants().is_ok());
        }
    }

    #[test]
    fn test_meal_type_synonyms_resolve() {
        let mut rng = StdRng::seed_from_u64(3);
        let cuisines = vec!["Korean".to_string()];
        let owner = Uuid::new_v4();

        let brunch = synthesize(&cuisines, Some("Brunch"), &BTreeSet::new(), owner, &mut rng);
        assert_eq!(brunch.meal_type, MealType::Breakfast);
        assert!(brunch.title.starts_with("Korean "));
        assert!(brunch.description.contains("Korean"));

        let starter = synthesize(&cuisines, Some("appetizer"), &BTreeSet::new(), owner, &mut rng);
        assert_eq!(starter.meal_type, MealType::Snack);

        let unknown = synthesize(&cuisines, Some("elevenses"), &BTreeSet::new(), owner, &mut rng);
        assert!(MealType::ALL.contains(&unknown.meal_type));
    }

    #[test]
    fn test_title_carries_a_suffix() {
        let mut rng = StdRng::seed_from_u64(9);
        let draft = synthesize(
            &["Thai".to_string()],
            Some("dinner"),
            &BTreeSet::new(),
            Uuid::new_v4(),
            &mut rng,
        );
        let suffix = draft.title.rsplit(" - ").next().unwrap();
        assert!(TITLE_SUFFIXES.contains(&suffix));
        assert_eq!(draft.provenance, Provenance::Fallback);
    }

    #[test]
    fn test_allergen_free_template_is_preferred() {
        let allergies: BTreeSet<String> = ["egg".to_string()].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let draft = synthesize(&[], Some("breakfast"), &allergies, Uuid::new_v4(), &mut rng);
            assert!(draft.allergens_present(&allergies).is_empty());
            assert!(draft.title.contains("Savory Porridge"));
        }
    }

    #[test]
    fn test_allergens_are_dropped_when_no_template_is_safe() {
        let allergies: BTreeSet<String> = ["oil".to_string(), "herbs".to_string()]
            .into_iter()
            .collect();
        let mut rng = StdRng::seed_from_u64(5);
        let draft = synthesize(&[], Some("dinner"), &allergies, Uuid::new_v4(), &mut rng);
        assert!(draft.allergens_present(&allergies).is_empty());
        assert!(!draft.ingredients.is_empty());
    }
}
