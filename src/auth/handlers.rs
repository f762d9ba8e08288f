use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MeResponse, RefreshRequest, RegisterRequest,
            SetActiveFamilyRequest,
        },
        jwt::JwtKeys,
        services,
        session::Session,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/active-family", put(set_active_family))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let res = services::register(state.store.as_ref(), &keys, payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(services::login(state.store.as_ref(), &keys, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(
        services::refresh(state.store.as_ref(), &keys, &payload.refresh_token).await?,
    ))
}

#[instrument(skip(session), fields(user_id = %session.user_id))]
pub async fn get_me(session: Session) -> Json<MeResponse> {
    Json(MeResponse {
        profile: session.profile,
        active_family_id: session.active_family_id,
    })
}

#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn set_active_family(
    State(state): State<AppState>,
    mut session: Session,
    Json(body): Json<SetActiveFamilyRequest>,
) -> Result<Json<MeResponse>, (StatusCode, String)> {
    session
        .switch_family(state.store.as_ref(), body.family_id)
        .await?;
    Ok(Json(MeResponse {
        profile: session.profile,
        active_family_id: session.active_family_id,
    }))
}
