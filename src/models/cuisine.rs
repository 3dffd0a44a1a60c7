use serde::{Deserialize, Serialize};

/// A cuisine or dish suggested in answer to a free-text food query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuisineRecommendation {
    pub name: String,
    pub description: String,
    pub key_ingredients: Vec<String>,
    pub flavor_profile: String,
    pub similarity_reason: String,
}
