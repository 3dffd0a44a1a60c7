use serde::{Deserialize, Serialize};

use super::{Difficulty, MealType, RecipeDraft, SkillLevel};

/// Hard constraints applied to an already ranked candidate list.
///
/// Unset fields do not constrain. Dietary fields require an exact match on
/// the corresponding draft flag, so `Some(false)` selects drafts without it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegetarian: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegan: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gluten_free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dairy_free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nut_free: Option<bool>,
    /// Limit on prep + cook time, in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_time: Option<u32>,
    /// Case-insensitive exact cuisine name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    /// Mapped to a difficulty when `difficulty` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<SkillLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<MealType>,
}

impl RecipeFilters {
    pub fn is_empty(&self) -> bool {
        *self == RecipeFilters::default()
    }

    fn effective_difficulty(&self) -> Option<Difficulty> {
        self.difficulty.or(self.skill_level.map(Difficulty::from))
    }

    pub fn matches(&self, draft: &RecipeDraft) -> bool {
        let flag_ok = |wanted: Option<bool>, actual: bool| wanted.map_or(true, |w| w == actual);

        flag_ok(self.vegetarian, draft.dietary.vegetarian)
            && flag_ok(self.vegan, draft.dietary.vegan)
            && flag_ok(self.gluten_free, draft.dietary.gluten_free)
            && flag_ok(self.dairy_free, draft.dietary.dairy_free)
            && flag_ok(self.nut_free, draft.dietary.nut_free)
            && self
                .max_total_time
                .map_or(true, |limit| draft.active_time() <= limit)
            && self
                .cuisine
                .as_deref()
                .map_or(true, |c| c.trim().eq_ignore_ascii_case(draft.cuisine.trim()))
            && self
                .effective_difficulty()
                .map_or(true, |d| d == draft.difficulty)
            && self.meal_type.map_or(true, |m| m == draft.meal_type)
    }
}
