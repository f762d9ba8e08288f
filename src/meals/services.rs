use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::dto::CreateMealRequest;
use super::repo_types::{Meal, MealPatch};
use crate::auth::session::Session;
use crate::error::{ServiceError, ServiceResult};
use crate::events::ChangeKind;
use crate::nutrition::EnrichedMeal;
use crate::state::AppState;

fn require_family(session: &Session) -> ServiceResult<Uuid> {
    session
        .active_family_id
        .ok_or_else(|| ServiceError::bad_request("No active family"))
}

fn meal_not_found() -> ServiceError {
    ServiceError::not_found("Meal not found")
}

/// Newest first; empty without an active family.
pub async fn list_meals(state: &AppState, session: &Session) -> ServiceResult<Vec<Meal>> {
    match session.active_family_id {
        Some(family_id) => Ok(state.store.list_meals(family_id).await?),
        None => Ok(Vec::new()),
    }
}

pub async fn create_meal(
    state: &AppState,
    session: &Session,
    req: CreateMealRequest,
) -> ServiceResult<Meal> {
    let family_id = require_family(session)?;
    insert_meal(state, family_id, session.user_id, req).await
}

/// Inserts into a known family's library. Shared with quick-add.
pub(crate) async fn insert_meal(
    state: &AppState,
    family_id: Uuid,
    user_id: Uuid,
    req: CreateMealRequest,
) -> ServiceResult<Meal> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ServiceError::bad_request("Meal name is required"));
    }

    let meal = Meal {
        id: Uuid::new_v4(),
        family_id,
        name: name.to_string(),
        notes: req.notes,
        ingredients: req.ingredients,
        tags: req.tags,
        prep_time: req.prep_time,
        nutrition: req.nutrition,
        created_by: user_id,
        created_at: OffsetDateTime::now_utc(),
    };
    state.store.insert_meal(&meal).await?;

    info!(meal_id = %meal.id, %family_id, name = %meal.name, "meal created");
    state.changes.publish(family_id, ChangeKind::MealsChanged);
    Ok(meal)
}

pub async fn get_meal(state: &AppState, session: &Session, meal_id: Uuid) -> ServiceResult<Meal> {
    let family_id = session.active_family_id.ok_or_else(meal_not_found)?;
    state
        .store
        .get_meal(family_id, meal_id)
        .await?
        .ok_or_else(meal_not_found)
}

pub async fn update_meal(
    state: &AppState,
    session: &Session,
    meal_id: Uuid,
    mut patch: MealPatch,
) -> ServiceResult<Meal> {
    let family_id = session.active_family_id.ok_or_else(meal_not_found)?;
    if let Some(name) = patch.name.take() {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::bad_request("Meal name is required"));
        }
        patch.name = Some(name.to_string());
    }

    let meal = state
        .store
        .update_meal(family_id, meal_id, patch)
        .await?
        .ok_or_else(meal_not_found)?;
    state.changes.publish(family_id, ChangeKind::MealsChanged);
    Ok(meal)
}

pub async fn delete_meal(state: &AppState, session: &Session, meal_id: Uuid) -> ServiceResult<()> {
    let family_id = session.active_family_id.ok_or_else(meal_not_found)?;
    if !state.store.delete_meal(family_id, meal_id).await? {
        return Err(meal_not_found());
    }
    info!(%meal_id, %family_id, "meal deleted");
    state.changes.publish(family_id, ChangeKind::MealsChanged);
    Ok(())
}

/// Suggested fields for a new meal; `None` when nothing could be found.
pub async fn enrich(state: &AppState, query: &str) -> Option<EnrichedMeal> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    state.nutrition.search_food(query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::services::tests::{family_session, session_for};
    use crate::meals::repo_types::Nutrition;

    fn request(name: &str) -> CreateMealRequest {
        CreateMealRequest {
            name: name.into(),
            ingredients: vec!["Eggs".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_trims_name_and_records_creator() {
        let state = AppState::fake();
        let session = family_session(&state, "a@b.co").await;

        let meal = create_meal(&state, &session, request("  Omelette ")).await.unwrap();
        assert_eq!(meal.name, "Omelette");
        assert_eq!(meal.created_by, session.user_id);
        assert_eq!(Some(meal.family_id), session.active_family_id);

        let err = create_meal(&state, &session, request("  ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn create_without_family_is_rejected() {
        let state = AppState::fake();
        let session = session_for(&state, "a@b.co").await;
        let err = create_meal(&state, &session, request("Soup")).await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
        assert!(list_meals(&state, &session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn meals_are_scoped_to_the_family() {
        let state = AppState::fake();
        let mine = family_session(&state, "a@b.co").await;
        let other = family_session(&state, "b@b.co").await;

        let meal = create_meal(&state, &mine, request("Soup")).await.unwrap();
        let err = get_meal(&state, &other, meal.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(list_meals(&state, &other).await.unwrap().is_empty());
        assert_eq!(list_meals(&state, &mine).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn patch_and_delete() {
        let state = AppState::fake();
        let session = family_session(&state, "a@b.co").await;
        let meal = create_meal(&state, &session, request("Soup")).await.unwrap();

        let patch = MealPatch {
            nutrition: Some(Nutrition {
                calories: 120.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = update_meal(&state, &session, meal.id, patch).await.unwrap();
        assert_eq!(updated.name, "Soup");
        assert_eq!(updated.nutrition.unwrap().calories, 120.0);

        let blank = MealPatch {
            name: Some(" ".into()),
            ..Default::default()
        };
        assert!(update_meal(&state, &session, meal.id, blank).await.is_err());

        delete_meal(&state, &session, meal.id).await.unwrap();
        let err = delete_meal(&state, &session, meal.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn enrich_without_keys_is_absent() {
        let state = AppState::fake();
        assert!(enrich(&state, "Apple").await.is_none());
        assert!(enrich(&state, "   ").await.is_none());
    }
}
