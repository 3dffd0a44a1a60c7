use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{DietaryFlags, MealType, RecipeFilters};

/// Flavor intensities at or below this level are not emphasised
pub const FLAVOR_MIDPOINT: u8 = 3;

/// Query used when a profile carries no usable terms
pub const DEFAULT_QUERY: &str = "food recipe";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "beginner" | "easy" | "novice" => Some(SkillLevel::Beginner),
            "intermediate" | "medium" => Some(SkillLevel::Intermediate),
            "advanced" | "hard" | "expert" => Some(SkillLevel::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Spicy,
    Sweet,
    Savory,
    Bitter,
    Sour,
}

impl Flavor {
    pub const ALL: [Flavor; 5] = [
        Flavor::Spicy,
        Flavor::Sweet,
        Flavor::Savory,
        Flavor::Bitter,
        Flavor::Sour,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Spicy => "spicy",
            Flavor::Sweet => "sweet",
            Flavor::Savory => "savory",
            Flavor::Bitter => "bitter",
            Flavor::Sour => "sour",
        }
    }
}

/// A user's food preferences, as captured by the questionnaire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    /// Favorite cuisines; repeats weight the rotation towards a cuisine
    #[serde(default)]
    pub cuisines: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: BTreeSet<String>,
    #[serde(default)]
    pub dietary_flags: DietaryFlags,
    /// Ingredients that must never appear in generated recipes
    #[serde(default)]
    pub allergies: BTreeSet<String>,
    #[serde(default)]
    pub health_goals: Vec<String>,
    /// Intensity from 1 to 5 per flavor
    #[serde(default = "default_flavors")]
    pub flavors: BTreeMap<Flavor, u8>,
    #[serde(default = "default_meal_types")]
    pub meal_types: BTreeSet<MealType>,
    #[serde(default)]
    pub skill_level: Option<SkillLevel>,
    /// Upper bound on prep + cook time, in minutes
    #[serde(default)]
    pub max_total_time: Option<u32>,
}

fn default_flavors() -> BTreeMap<Flavor, u8> {
    Flavor::ALL.iter().map(|f| (*f, FLAVOR_MIDPOINT)).collect()
}

fn default_meal_types() -> BTreeSet<MealType> {
    MealType::ALL.into_iter().collect()
}

impl Default for PreferenceProfile {
    fn default() -> Self {
        Self {
            cuisines: Vec::new(),
            dietary_restrictions: BTreeSet::new(),
            dietary_flags: DietaryFlags::default(),
            allergies: BTreeSet::new(),
            health_goals: Vec::new(),
            flavors: default_flavors(),
            meal_types: default_meal_types(),
            skill_level: None,
            max_total_time: None,
        }
    }
}

/// Query text and hard filters derived from a profile
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceQuery {
    pub text: String,
    pub filters: RecipeFilters,
}

impl PreferenceProfile {
    /// Intensity for a flavor, clamped to 1..=5
    pub fn flavor_level(&self, flavor: Flavor) -> u8 {
        self.flavors
            .get(&flavor)
            .copied()
            .unwrap_or(FLAVOR_MIDPOINT)
            .clamp(1, 5)
    }

    /// Flavors the user asked for more strongly than the midpoint
    pub fn strong_flavors(&self) -> Vec<Flavor> {
        Flavor::ALL
            .into_iter()
            .filter(|f| self.flavor_level(*f) > FLAVOR_MIDPOINT)
            .collect()
    }

    /// Spicy flavor intensity mapped onto the 0..=4 recipe scale
    pub fn spicy_target(&self) -> u8 {
        self.flavor_level(Flavor::Spicy) - 1
    }

    /// Explicit restriction entries plus the boolean convenience flags
    pub fn combined_restrictions(&self) -> BTreeSet<String> {
        self.dietary_restrictions
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .chain(self.dietary_flags.labels().into_iter().map(str::to_string))
            .collect()
    }

    /// Allergies rendered as negative constraints ("no peanuts")
    pub fn allergy_constraints(&self) -> Vec<String> {
        self.allergies
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(|a| format!("no {}", a))
            .collect()
    }

    /// Cuisines in first-seen order without repeats
    pub fn distinct_cuisines(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.cuisines
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
            .collect()
    }

    /// Meal types in canonical order, used for round-robin generation
    pub fn meal_type_rotation(&self) -> Vec<MealType> {
        self.meal_types.iter().copied().collect()
    }

    /// Builds the similarity query and filter set for this profile
    pub fn derive_query(&self) -> PreferenceQuery {
        let mut terms: Vec<String> = self.distinct_cuisines().iter().map(|c| c.to_string()).collect();
        terms.extend(self.meal_types.iter().map(|m| m.as_str().to_string()));
        terms.extend(self.strong_flavors().iter().map(|f| f.as_str().to_string()));

        let text = if terms.is_empty() {
            DEFAULT_QUERY.to_string()
        } else {
            terms.join(" ")
        };

        let flag = |set: bool| if set { Some(true) } else { None };
        let filters = RecipeFilters {
            vegetarian: flag(self.dietary_flags.vegetarian),
            vegan: flag(self.dietary_flags.vegan),
            gluten_free: flag(self.dietary_flags.gluten_free),
            dairy_free: flag(self.dietary_flags.dairy_free),
            nut_free: flag(self.dietary_flags.nut_free),
            max_total_time: self.max_total_time,
            ..Default::default()
        };

        PreferenceQuery { text, filters }
    }
}
