//! Builds grocery items from the ingredients of meals planned in a date
//! range, skipping anything already on the list.

use std::collections::HashSet;

use futures::future::join_all;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::repo_types::{normalize_name, GroceryItem, CATEGORY_PLAN};
use crate::plans::repo_types::DayPlan;
use crate::store::FamilyStore;

/// Distinct library meal ids referenced by the plans, in first-seen order.
/// Entries without a meal reference are skipped.
fn referenced_meals(plans: &[DayPlan]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    plans
        .iter()
        .flat_map(|plan| plan.meals.iter())
        .filter_map(|entry| entry.meal_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Exact-string dedup of non-blank ingredients, keeping first occurrences.
fn unique_ingredients(lists: Vec<Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|name| !name.trim().is_empty())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Inserts one `"Plan"` item per ingredient not already on the list and
/// returns the inserted items. `start > end` inserts nothing.
///
/// Existing names are read once up front. Names inserted during the run
/// join that set, so two ingredients differing only in case yield one item:
/// the list never holds two pending items with the same normalized name.
pub async fn generate_from_range(
    store: &dyn FamilyStore,
    family_id: Uuid,
    user_id: Uuid,
    start: &str,
    end: &str,
) -> anyhow::Result<Vec<GroceryItem>> {
    if start > end {
        return Ok(Vec::new());
    }

    let plans = store.day_plans_in_range(family_id, start, end).await?;
    let meal_ids = referenced_meals(&plans);
    if meal_ids.is_empty() {
        debug!(%family_id, start, end, plans = plans.len(), "no library meals planned in range");
        return Ok(Vec::new());
    }

    // Any failed fetch aborts the run before anything is inserted.
    let fetched = join_all(meal_ids.iter().map(|id| store.get_meal(family_id, *id)))
        .await
        .into_iter()
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut lists = Vec::with_capacity(fetched.len());
    for (meal_id, meal) in meal_ids.iter().zip(fetched) {
        match meal {
            Some(meal) => lists.push(meal.ingredients),
            None => debug!(%meal_id, "planned meal no longer in library"),
        }
    }
    let ingredients = unique_ingredients(lists);

    let mut existing: HashSet<String> = store
        .list_grocery_items(family_id)
        .await?
        .iter()
        .map(|item| normalize_name(&item.name))
        .collect();

    let mut inserted = Vec::new();
    for ingredient in ingredients {
        if !existing.insert(normalize_name(&ingredient)) {
            continue;
        }
        let item = GroceryItem {
            id: Uuid::new_v4(),
            family_id,
            name: ingredient.trim().to_string(),
            completed: false,
            category: Some(CATEGORY_PLAN.to_string()),
            source_meal_id: None,
            created_by: Some(user_id),
            added_at: OffsetDateTime::now_utc(),
        };
        store.insert_grocery_item(&item).await?;
        inserted.push(item);
    }

    info!(%family_id, start, end, meals = meal_ids.len(), inserted = inserted.len(), "grocery list generated");
    Ok(inserted)
}
