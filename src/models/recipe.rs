use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Display};
use uuid::Uuid;

use super::{SkillLevel, UserId};

/// Course a recipe is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Dessert,
}

impl MealType {
    pub const ALL: [MealType; 5] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
        MealType::Dessert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Dessert => "dessert",
        }
    }

    /// Resolves free-form meal labels ("Brunch", "main course", "sweets")
    /// to one of the five canonical meal types.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "breakfast" | "brunch" => Some(MealType::Breakfast),
            "lunch" => Some(MealType::Lunch),
            "dinner" | "main" | "main course" | "supper" | "entree" | "entrée" => {
                Some(MealType::Dinner)
            }
            "snack" | "snacks" | "appetizer" | "appetiser" | "starter" => Some(MealType::Snack),
            "dessert" | "desserts" | "sweet" | "sweets" => Some(MealType::Dessert),
            _ => None,
        }
    }
}

impl Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Parses a difficulty label, accepting skill-level wording as synonyms
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "easy" | "simple" => Some(Difficulty::Easy),
            "medium" | "moderate" | "intermediate" => Some(Difficulty::Medium),
            "hard" | "difficult" | "advanced" => Some(Difficulty::Hard),
            "beginner" => Some(Difficulty::Easy),
            _ => None,
        }
    }
}

impl From<SkillLevel> for Difficulty {
    fn from(skill: SkillLevel) -> Self {
        match skill {
            SkillLevel::Beginner => Difficulty::Easy,
            SkillLevel::Intermediate => Difficulty::Medium,
            SkillLevel::Advanced => Difficulty::Hard,
        }
    }
}

/// Where a draft came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    LlmGenerated,
    Fallback,
    Curated,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::LlmGenerated => "llm-generated",
            Provenance::Fallback => "fallback",
            Provenance::Curated => "curated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "llm-generated" => Some(Provenance::LlmGenerated),
            "fallback" => Some(Provenance::Fallback),
            "curated" => Some(Provenance::Curated),
            _ => None,
        }
    }

    /// Per-user generated content, purged and regenerated with the owner's preferences
    pub fn is_generated(&self) -> bool {
        matches!(self, Provenance::LlmGenerated | Provenance::Fallback)
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DietaryFlags {
    #[serde(default)]
    pub vegetarian: bool,
    #[serde(default)]
    pub vegan: bool,
    #[serde(default)]
    pub gluten_free: bool,
    #[serde(default)]
    pub dairy_free: bool,
    #[serde(default)]
    pub nut_free: bool,
}

impl DietaryFlags {
    /// Restriction labels for the flags that are set, in prompt wording
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.vegetarian {
            labels.push("vegetarian");
        }
        if self.vegan {
            labels.push("vegan");
        }
        if self.gluten_free {
            labels.push("gluten-free");
        }
        if self.dairy_free {
            labels.push("dairy-free");
        }
        if self.nut_free {
            labels.push("nut-free");
        }
        labels
    }
}

/// A recipe record, regardless of provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub cuisine: String,
    pub meal_type: MealType,
    pub prep_time: u32,
    pub cook_time: u32,
    pub total_time: u32,
    pub difficulty: Difficulty,
    #[serde(flatten)]
    pub dietary: DietaryFlags,
    /// 0 (not spicy) to 4 (extremely spicy)
    pub spicy_level: u8,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub provenance: Provenance,
    pub owner: Option<UserId>,
}

impl RecipeDraft {
    pub const MAX_SPICY_LEVEL: u8 = 4;

    /// Non-empty title, at least one ingredient and at least one instruction step
    pub fn is_materially_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.ingredients.is_empty() && !self.instructions.is_empty()
    }

    /// Checks the ownership invariants tied to provenance
    pub fn check_invariants(&self) -> Result<(), String> {
        match (self.provenance, self.owner) {
            (Provenance::Curated, Some(_)) => {
                return Err("curated recipes must not have an owner".to_string())
            }
            (Provenance::LlmGenerated | Provenance::Fallback, None) => {
                return Err(format!("{} recipes must have an owner", self.provenance))
            }
            _ => {}
        }
        if !self.is_materially_valid() {
            return Err(format!(
                "recipe '{}' needs a title, ingredients and instructions",
                self.title
            ));
        }
        Ok(())
    }

    pub fn active_time(&self) -> u32 {
        self.prep_time.saturating_add(self.cook_time)
    }

    pub fn is_visible_to(&self, viewer: UserId) -> bool {
        match self.owner {
            None => true,
            Some(owner) => owner == viewer,
        }
    }

    /// Mentions of any of the given allergens among the ingredients
    pub fn allergens_present<'a, I>(&self, allergies: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a String>,
    {
        allergies
            .into_iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .filter(|allergen| {
                let needle = allergen.to_lowercase();
                self.ingredients
                    .iter()
                    .any(|ingredient| ingredient.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

/// A persisted draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecipe {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub draft: RecipeDraft,
}

impl StoredRecipe {
    pub fn new(draft: RecipeDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            draft,
        }
    }
}
