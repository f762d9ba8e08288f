//! Best-effort nutrition lookup for a free-text meal name.
//!
//! Two external collaborators feed [`NutritionEnricher`]: a food
//! composition database (USDA FoodData Central) that supplies baseline
//! candidates, and a generative text model (Gemini) that refines them into
//! one serving's macros, tags, prep time and ingredients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::meals::repo_types::Nutrition;

pub mod enricher;
pub mod gemini;
pub mod usda;

pub use enricher::{extract_manual_nutrition, NutritionEnricher};
pub use gemini::GeminiClient;
pub use usda::UsdaClient;

/// Candidates requested from the food database per lookup.
pub const CANDIDATE_PAGE_SIZE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodNutrient {
    #[serde(default)]
    pub nutrient_name: String,
    /// FoodData Central sends `null` for some nutrients.
    #[serde(default)]
    pub value: Option<f64>,
}

/// A food record returned by the composition database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodCandidate {
    pub fdc_id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub food_nutrients: Vec<FoodNutrient>,
}

/// Data used to auto-populate a new meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedMeal {
    pub nutrition: Nutrition,
    pub prep_time: i32,
    pub description: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
}

#[async_trait]
pub trait FoodDatabase: Send + Sync {
    async fn search(&self, query: &str, page_size: u32) -> anyhow::Result<Vec<FoodCandidate>>;
}

#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}
