use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateMealRequest, EnrichQuery};
use super::repo_types::{Meal, MealPatch};
use super::services;
use crate::{auth::session::Session, nutrition::EnrichedMeal, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(create_meal))
        .route("/meals/enrich", get(enrich_meal))
        .route(
            "/meals/:id",
            get(get_meal).patch(update_meal).delete(delete_meal),
        )
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn list_meals(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Meal>>, (StatusCode, String)> {
    Ok(Json(services::list_meals(&state, &session).await?))
}

#[instrument(skip(state, session, payload), fields(user_id = %session.user_id))]
pub async fn create_meal(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateMealRequest>,
) -> Result<(StatusCode, Json<Meal>), (StatusCode, String)> {
    let meal = services::create_meal(&state, &session, payload).await?;
    Ok((StatusCode::CREATED, Json(meal)))
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn get_meal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Meal>, (StatusCode, String)> {
    Ok(Json(services::get_meal(&state, &session, id).await?))
}

#[instrument(skip(state, session, patch), fields(user_id = %session.user_id))]
pub async fn update_meal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(patch): Json<MealPatch>,
) -> Result<Json<Meal>, (StatusCode, String)> {
    Ok(Json(services::update_meal(&state, &session, id, patch).await?))
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn delete_meal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    services::delete_meal(&state, &session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns `null` when no enrichment was possible.
#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn enrich_meal(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<EnrichQuery>,
) -> Json<Option<EnrichedMeal>> {
    Json(services::enrich(&state, &query.q).await)
}
