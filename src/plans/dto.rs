use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::meals::repo_types::Nutrition;

/// Entry to place on a day. The slot comes from the path.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntryRequest {
    pub meal_id: Option<Uuid>,
    pub name: String,
    pub notes: Option<String>,
    pub nutrition: Option<Nutrition>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct QuickAddRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub removed: bool,
}
