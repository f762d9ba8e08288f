use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const CATEGORY_GENERAL: &str = "General";
pub const CATEGORY_PLAN: &str = "Plan";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItem {
    pub id: Uuid,
    pub family_id: Uuid,
    pub name: String,
    pub completed: bool,
    pub category: Option<String>,
    pub source_meal_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
}

/// Trimmed, lower-cased form used for duplicate checks.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
