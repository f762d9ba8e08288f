use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{CreateFamilyRequest, JoinFamilyRequest};
use super::repo_types::Family;
use super::services;
use crate::{auth::session::Session, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/families", post(create_family))
        .route("/families/join", post(join_family))
        .route("/families/active", get(active_family))
}

#[instrument(skip(state, session, body), fields(user_id = %session.user_id))]
pub async fn create_family(
    State(state): State<AppState>,
    mut session: Session,
    Json(body): Json<CreateFamilyRequest>,
) -> Result<(StatusCode, Json<Family>), (StatusCode, String)> {
    let family = services::create_family(&state, &mut session, &body.name).await?;
    Ok((StatusCode::CREATED, Json(family)))
}

#[instrument(skip(state, session, body), fields(user_id = %session.user_id))]
pub async fn join_family(
    State(state): State<AppState>,
    mut session: Session,
    Json(body): Json<JoinFamilyRequest>,
) -> Result<Json<Family>, (StatusCode, String)> {
    Ok(Json(
        services::join_family(&state, &mut session, &body.invite_code).await?,
    ))
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn active_family(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Family>, (StatusCode, String)> {
    Ok(Json(services::active_family(&state, &session).await?))
}
