use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{AddItemRequest, GenerateRequest};
use super::repo_types::GroceryItem;
use super::services;
use crate::{auth::session::Session, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/grocery", get(list_items).post(add_item))
        .route("/grocery/generate", post(generate_from_range))
        .route("/grocery/:id", delete(delete_item))
        .route("/grocery/:id/toggle", post(toggle_item))
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn list_items(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<GroceryItem>>, (StatusCode, String)> {
    Ok(Json(services::list_items(&state, &session).await?))
}

/// `null` when a pending item with the same name is already listed.
#[instrument(skip(state, session, payload), fields(user_id = %session.user_id))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<AddItemRequest>,
) -> Result<Json<Option<GroceryItem>>, (StatusCode, String)> {
    Ok(Json(
        services::add_item(&state, &session, &payload.name, payload.category.as_deref()).await?,
    ))
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn toggle_item(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<GroceryItem>, (StatusCode, String)> {
    Ok(Json(services::toggle_item(&state, &session, id).await?))
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn delete_item(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    services::delete_item(&state, &session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, session, payload), fields(user_id = %session.user_id))]
pub async fn generate_from_range(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<Vec<GroceryItem>>, (StatusCode, String)> {
    Ok(Json(
        services::generate_from_range(&state, &session, &payload.start, &payload.end).await?,
    ))
}
