use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::date_key;
use super::dto::NewEntryRequest;
use super::repo_types::{DayPlan, MealEntry, MealType};
use crate::auth::session::Session;
use crate::error::{ServiceError, ServiceResult};
use crate::events::ChangeKind;
use crate::meals::{services::insert_meal, CreateMealRequest};
use crate::state::AppState;

/// The stored plan, or an empty one when nothing is planned yet.
pub async fn get_day_plan(state: &AppState, session: &Session, date: &str) -> ServiceResult<DayPlan> {
    let date = date_key::normalize(date)?;
    let Some(family_id) = session.active_family_id else {
        return Ok(DayPlan::empty(Uuid::nil(), &date));
    };
    Ok(state
        .store
        .get_day_plan(family_id, &date)
        .await?
        .unwrap_or_else(|| DayPlan::empty(family_id, &date)))
}

/// Stored plans between both dates inclusive, ordered by date.
pub async fn list_range(
    state: &AppState,
    session: &Session,
    start: &str,
    end: &str,
) -> ServiceResult<Vec<DayPlan>> {
    let (start, end) = (date_key::normalize(start)?, date_key::normalize(end)?);
    match session.active_family_id {
        Some(family_id) if start <= end => {
            Ok(state.store.day_plans_in_range(family_id, &start, &end).await?)
        }
        _ => Ok(Vec::new()),
    }
}

/// Places a new entry in `meal_type`. `None` without an active family.
pub async fn add_meal_to_day(
    state: &AppState,
    session: &Session,
    date: &str,
    meal_type: MealType,
    req: NewEntryRequest,
) -> ServiceResult<Option<MealEntry>> {
    let date = date_key::normalize(date)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ServiceError::bad_request("Meal name is required"));
    }
    let Some(family_id) = session.active_family_id else {
        debug!(user_id = %session.user_id, "add meal to day without active family");
        return Ok(None);
    };

    let entry = MealEntry {
        id: Uuid::new_v4(),
        meal_id: req.meal_id,
        name: name.to_string(),
        meal_type,
        notes: req.notes,
        nutrition: req.nutrition,
        completed: false,
        completed_at: None,
        assigned_to: req.assigned_to,
    };
    let plan = state
        .store
        .append_entry(family_id, &date, &entry, OffsetDateTime::now_utc())
        .await?;

    info!(%family_id, %date, %meal_type, entry_id = %entry.id, meal_count = plan.meal_count, "meal planned");
    state
        .changes
        .publish(family_id, ChangeKind::DayPlanChanged { date });
    Ok(Some(entry))
}

/// Removes the entry equal to `entry` in every field.
pub async fn remove_meal_from_day(
    state: &AppState,
    session: &Session,
    date: &str,
    meal_type: MealType,
    entry: &MealEntry,
) -> ServiceResult<bool> {
    let date = date_key::normalize(date)?;
    let Some(family_id) = session.active_family_id else {
        return Ok(false);
    };

    let removed = state
        .store
        .remove_entry(family_id, &date, meal_type, entry, OffsetDateTime::now_utc())
        .await?;
    if removed {
        info!(%family_id, %date, %meal_type, entry_id = %entry.id, "meal unplanned");
        state
            .changes
            .publish(family_id, ChangeKind::DayPlanChanged { date });
    } else {
        debug!(%family_id, %date, entry_id = %entry.id, "no matching entry to remove");
    }
    Ok(removed)
}

pub async fn toggle_meal_completion(
    state: &AppState,
    session: &Session,
    date: &str,
    meal_type: MealType,
    entry_id: Uuid,
) -> ServiceResult<Option<MealEntry>> {
    let date = date_key::normalize(date)?;
    let Some(family_id) = session.active_family_id else {
        return Ok(None);
    };

    let entry = state
        .store
        .toggle_entry(family_id, &date, meal_type, entry_id, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| ServiceError::not_found("Meal entry not found"))?;
    state
        .changes
        .publish(family_id, ChangeKind::DayPlanChanged { date });
    Ok(Some(entry))
}

/// Plans a meal by name. Reuses a library meal with the same name
/// (case-insensitive); otherwise creates one, enriched when possible.
pub async fn quick_add(
    state: &AppState,
    session: &Session,
    date: &str,
    meal_type: MealType,
    name: &str,
) -> ServiceResult<Option<MealEntry>> {
    date_key::parse(date)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::bad_request("Meal name is required"));
    }
    let Some(family_id) = session.active_family_id else {
        return Ok(None);
    };

    let wanted = name.to_lowercase();
    let existing = state
        .store
        .list_meals(family_id)
        .await?
        .into_iter()
        .find(|m| m.name.to_lowercase() == wanted);

    let meal = match existing {
        Some(meal) => meal,
        None => {
            let mut req = CreateMealRequest {
                name: name.to_string(),
                ..Default::default()
            };
            if let Some(enriched) = state.nutrition.search_food(name).await {
                req.notes = Some(enriched.description).filter(|d| !d.is_empty());
                req.ingredients = enriched.ingredients;
                req.tags = enriched.tags;
                req.prep_time = Some(enriched.prep_time);
                req.nutrition = Some(enriched.nutrition);
            }
            insert_meal(state, family_id, session.user_id, req).await?
        }
    };

    let entry = NewEntryRequest {
        meal_id: Some(meal.id),
        name: name.to_string(),
        notes: meal.notes,
        nutrition: meal.nutrition,
        assigned_to: None,
    };
    add_meal_to_day(state, session, date, meal_type, entry).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::services::tests::{family_session, session_for};
    use crate::meals::services::{create_meal, list_meals};
    use crate::nutrition::enricher::tests::{CannedFoods, ScriptedModel};
    use crate::nutrition::{
        FoodCandidate, FoodDatabase, FoodNutrient, NutritionEnricher, TextModel,
    };
    use std::sync::Arc;

    fn named(name: &str) -> NewEntryRequest {
        NewEntryRequest {
            name: name.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_plan_reads_as_empty() {
        let state = AppState::fake();
        let session = family_session(&state, "a@b.co").await;
        let plan = get_day_plan(&state, &session, "2024-06-03").await.unwrap();
        assert_eq!(plan.meal_count, 0);
        assert_eq!(plan.meals.len(), 0);
        assert!(plan.updated_at.is_none());
    }

    #[tokio::test]
    async fn malformed_date_is_bad_request() {
        let state = AppState::fake();
        let session = family_session(&state, "a@b.co").await;
        let err = get_day_plan(&state, &session, "03/06/2024").await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn add_uses_slot_and_fresh_instance() {
        let state = AppState::fake();
        let session = family_session(&state, "a@b.co").await;

        let first = add_meal_to_day(&state, &session, "2024-06-03", MealType::Lunch, named("Soup"))
            .await
            .unwrap()
            .unwrap();
        let second = add_meal_to_day(&state, &session, "2024-06-03", MealType::Lunch, named("Soup"))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.meal_type, MealType::Lunch);
        assert!(!first.completed);

        let plan = get_day_plan(&state, &session, "2024-06-03").await.unwrap();
        assert_eq!(plan.meal_count, 2);
        assert_eq!(plan.meals.lunch.len(), 2);
    }

    #[tokio::test]
    async fn no_active_family_is_a_no_op() {
        let state = AppState::fake();
        let session = session_for(&state, "a@b.co").await;
        let added = add_meal_to_day(&state, &session, "2024-06-03", MealType::Dinner, named("Soup"))
            .await
            .unwrap();
        assert!(added.is_none());
        assert!(list_range(&state, &session, "2024-06-01", "2024-06-30")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn toggle_then_remove() {
        let state = AppState::fake();
        let session = family_session(&state, "a@b.co").await;
        let entry = add_meal_to_day(&state, &session, "2024-06-03", MealType::Dinner, named("Stew"))
            .await
            .unwrap()
            .unwrap();

        let done = toggle_meal_completion(&state, &session, "2024-06-03", MealType::Dinner, entry.id)
            .await
            .unwrap()
            .unwrap();
        assert!(done.completed);
        assert!(done.completed_at.is_some());

        // the pre-toggle snapshot no longer matches
        let removed = remove_meal_from_day(&state, &session, "2024-06-03", MealType::Dinner, &entry)
            .await
            .unwrap();
        assert!(!removed);
        let removed = remove_meal_from_day(&state, &session, "2024-06-03", MealType::Dinner, &done)
            .await
            .unwrap();
        assert!(removed);

        let err = toggle_meal_completion(&state, &session, "2024-06-03", MealType::Dinner, entry.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn range_is_inclusive_and_ordered() {
        let state = AppState::fake();
        let session = family_session(&state, "a@b.co").await;
        for date in ["2024-06-05", "2024-06-01", "2024-06-07", "2024-06-08"] {
            add_meal_to_day(&state, &session, date, MealType::Lunch, named("Soup"))
                .await
                .unwrap();
        }
        let plans = list_range(&state, &session, "2024-06-01", "2024-06-07").await.unwrap();
        let dates: Vec<_> = plans.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, ["2024-06-01", "2024-06-05", "2024-06-07"]);

        let backwards = list_range(&state, &session, "2024-06-07", "2024-06-01").await.unwrap();
        assert!(backwards.is_empty());
    }

    #[tokio::test]
    async fn quick_add_reuses_library_meal() {
        let state = AppState::fake();
        let session = family_session(&state, "a@b.co").await;
        let meal = create_meal(
            &state,
            &session,
            CreateMealRequest {
                name: "Pancakes".into(),
                notes: Some("fluffy".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let entry = quick_add(&state, &session, "2024-06-03", MealType::Breakfast, " pancakes ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.meal_id, Some(meal.id));
        assert_eq!(entry.name, "pancakes");
        assert_eq!(entry.notes.as_deref(), Some("fluffy"));
        assert_eq!(list_meals(&state, &session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quick_add_creates_enriched_meal() {
        let apple = FoodCandidate {
            fdc_id: 7,
            description: "Apples, raw".into(),
            food_nutrients: vec![FoodNutrient {
                nutrient_name: "Energy".into(),
                value: Some(52.0),
            }],
        };
        let model = ScriptedModel::new(vec![Ok(
            r#"{"calories":95,"protein":0.5,"carbs":25,"fats":0.3,"prepTime":2,"description":"Crisp apple","tags":["fruit"],"ingredients":["apple"]}"#,
        )]);
        let foods: Arc<dyn FoodDatabase> = CannedFoods::ok(vec![apple]);
        let model: Arc<dyn TextModel> = model;
        let state = AppState::fake_with(NutritionEnricher::new(Some(foods), Some(model)));
        let session = family_session(&state, "a@b.co").await;

        let entry = quick_add(&state, &session, "2024-06-03", MealType::Snack, "Apple")
            .await
            .unwrap()
            .unwrap();
        let meals = list_meals(&state, &session).await.unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].ingredients, vec!["apple".to_string()]);
        assert_eq!(meals[0].prep_time, Some(2));
        assert_eq!(entry.meal_id, Some(meals[0].id));
        assert_eq!(entry.notes.as_deref(), Some("Crisp apple"));
        assert_eq!(entry.nutrition.unwrap().calories, 95.0);
    }

    #[tokio::test]
    async fn quick_add_without_enrichment_still_plans() {
        let state = AppState::fake();
        let session = family_session(&state, "a@b.co").await;
        let entry = quick_add(&state, &session, "2024-06-03", MealType::Dinner, "Leftovers")
            .await
            .unwrap()
            .unwrap();
        assert!(entry.meal_id.is_some());
        assert!(entry.nutrition.is_none());
    }
}
