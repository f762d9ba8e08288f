use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Macros for one serving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

/// Reusable recipe template in the family library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: Uuid,
    pub family_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub prep_time: Option<i32>, // minutes
    pub nutrition: Option<Nutrition>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Partial update of a meal; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPatch {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub prep_time: Option<i32>,
    pub nutrition: Option<Nutrition>,
}

impl MealPatch {
    pub fn apply(self, meal: &mut Meal) {
        if let Some(name) = self.name {
            meal.name = name;
        }
        if let Some(notes) = self.notes {
            meal.notes = Some(notes);
        }
        if let Some(ingredients) = self.ingredients {
            meal.ingredients = ingredients;
        }
        if let Some(tags) = self.tags {
            meal.tags = tags;
        }
        if let Some(prep_time) = self.prep_time {
            meal.prep_time = Some(prep_time);
        }
        if let Some(nutrition) = self.nutrition {
            meal.nutrition = Some(nutrition);
        }
    }
}
