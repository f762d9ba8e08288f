use serde::Deserialize;

use super::repo_types::Nutrition;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealRequest {
    pub name: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub prep_time: Option<i32>,
    pub nutrition: Option<Nutrition>,
}

#[derive(Debug, Deserialize)]
pub struct EnrichQuery {
    #[serde(default)]
    pub q: String,
}
