use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::meals::repo_types::Nutrition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Snack,
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Snack,
        MealType::Dinner,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Snack => "snack",
            MealType::Dinner => "dinner",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One placement of a meal onto a day and slot. Its id is the instance id,
/// independent of the library meal it may reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub id: Uuid,
    pub meal_id: Option<Uuid>,
    pub name: String,
    pub meal_type: MealType,
    pub notes: Option<String>,
    pub nutrition: Option<Nutrition>,
    pub completed: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub assigned_to: Option<Uuid>,
}

/// Four independently ordered lists, one per meal-time category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMeals {
    #[serde(default)]
    pub breakfast: Vec<MealEntry>,
    #[serde(default)]
    pub lunch: Vec<MealEntry>,
    #[serde(default)]
    pub snack: Vec<MealEntry>,
    #[serde(default)]
    pub dinner: Vec<MealEntry>,
}

impl PlanMeals {
    pub fn slot(&self, meal_type: MealType) -> &Vec<MealEntry> {
        match meal_type {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Snack => &self.snack,
            MealType::Dinner => &self.dinner,
        }
    }

    pub fn slot_mut(&mut self, meal_type: MealType) -> &mut Vec<MealEntry> {
        match meal_type {
            MealType::Breakfast => &mut self.breakfast,
            MealType::Lunch => &mut self.lunch,
            MealType::Snack => &mut self.snack,
            MealType::Dinner => &mut self.dinner,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MealEntry> {
        MealType::ALL.into_iter().flat_map(|t| self.slot(t).iter())
    }

    pub fn len(&self) -> usize {
        MealType::ALL.iter().map(|t| self.slot(*t).len()).sum()
    }
}

/// Meal placements for one calendar date. `date` (YYYY-MM-DD) is the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub date: String,
    pub family_id: Uuid,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub meal_count: i32,
    pub meals: PlanMeals,
}

impl DayPlan {
    pub fn empty(family_id: Uuid, date: &str) -> Self {
        Self {
            date: date.to_string(),
            family_id,
            updated_at: None,
            meal_count: 0,
            meals: PlanMeals::default(),
        }
    }

    /// Recomputes `meal_count` and bumps `updated_at` after a mutation.
    pub fn touch(&mut self, now: OffsetDateTime) {
        self.meal_count = self.meals.len() as i32;
        self.updated_at = Some(now);
    }
}
