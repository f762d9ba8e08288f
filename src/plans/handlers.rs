use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{NewEntryRequest, QuickAddRequest, RangeQuery, RemoveResponse};
use super::repo_types::{DayPlan, MealEntry, MealType};
use super::services;
use crate::{auth::session::Session, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_range))
        .route("/plans/:date", get(get_day_plan))
        .route(
            "/plans/:date/:meal_type",
            post(add_meal_to_day).delete(remove_meal_from_day),
        )
        .route("/plans/:date/:meal_type/quick-add", post(quick_add))
        .route(
            "/plans/:date/:meal_type/:entry_id/toggle",
            post(toggle_meal_completion),
        )
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn get_day_plan(
    State(state): State<AppState>,
    session: Session,
    Path(date): Path<String>,
) -> Result<Json<DayPlan>, (StatusCode, String)> {
    Ok(Json(services::get_day_plan(&state, &session, &date).await?))
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn list_range(
    State(state): State<AppState>,
    session: Session,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<DayPlan>>, (StatusCode, String)> {
    Ok(Json(
        services::list_range(&state, &session, &range.start, &range.end).await?,
    ))
}

#[instrument(skip(state, session, payload), fields(user_id = %session.user_id))]
pub async fn add_meal_to_day(
    State(state): State<AppState>,
    session: Session,
    Path((date, meal_type)): Path<(String, MealType)>,
    Json(payload): Json<NewEntryRequest>,
) -> Result<Json<Option<MealEntry>>, (StatusCode, String)> {
    Ok(Json(
        services::add_meal_to_day(&state, &session, &date, meal_type, payload).await?,
    ))
}

/// The body is the entry exactly as last read.
#[instrument(skip(state, session, entry), fields(user_id = %session.user_id))]
pub async fn remove_meal_from_day(
    State(state): State<AppState>,
    session: Session,
    Path((date, meal_type)): Path<(String, MealType)>,
    Json(entry): Json<MealEntry>,
) -> Result<Json<RemoveResponse>, (StatusCode, String)> {
    let removed = services::remove_meal_from_day(&state, &session, &date, meal_type, &entry).await?;
    Ok(Json(RemoveResponse { removed }))
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn toggle_meal_completion(
    State(state): State<AppState>,
    session: Session,
    Path((date, meal_type, entry_id)): Path<(String, MealType, Uuid)>,
) -> Result<Json<Option<MealEntry>>, (StatusCode, String)> {
    Ok(Json(
        services::toggle_meal_completion(&state, &session, &date, meal_type, entry_id).await?,
    ))
}

#[instrument(skip(state, session, payload), fields(user_id = %session.user_id))]
pub async fn quick_add(
    State(state): State<AppState>,
    session: Session,
    Path((date, meal_type)): Path<(String, MealType)>,
    Json(payload): Json<QuickAddRequest>,
) -> Result<Json<Option<MealEntry>>, (StatusCode, String)> {
    Ok(Json(
        services::quick_add(&state, &session, &date, meal_type, &payload.name).await?,
    ))
}
