use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest};
use super::jwt::JwtKeys;
use super::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use super::repo_types::User;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{FamilyStore, NewUser};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn issue_tokens(keys: &JwtKeys, user: &User) -> ServiceResult<AuthResponse> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user: PublicUser {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
        },
    })
}

pub async fn register(
    store: &dyn FamilyStore,
    keys: &JwtKeys,
    payload: RegisterRequest,
) -> ServiceResult<AuthResponse> {
    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ServiceError::bad_request("Invalid email"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ServiceError::bad_request("Password too short"));
    }
    if store.find_user_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ServiceError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password).await?;
    let display_name = payload
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let user = store
        .create_user(NewUser {
            email: &email,
            password_hash: &hash,
            display_name,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_tokens(keys, &user)
}

pub async fn login(
    store: &dyn FamilyStore,
    keys: &JwtKeys,
    payload: LoginRequest,
) -> ServiceResult<AuthResponse> {
    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ServiceError::bad_request("Invalid email"));
    }

    let invalid = || ServiceError::Unauthorized("Invalid credentials".into());
    let Some(user) = store.find_user_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(invalid());
    };
    if !verify_password(&payload.password, &user.password_hash).await? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    issue_tokens(keys, &user)
}

pub async fn refresh(
    store: &dyn FamilyStore,
    keys: &JwtKeys,
    refresh_token: &str,
) -> ServiceResult<AuthResponse> {
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|e| ServiceError::Unauthorized(e.to_string()))?;
    let user = find_user(store, claims.sub).await?;
    issue_tokens(keys, &user)
}

async fn find_user(store: &dyn FamilyStore, user_id: Uuid) -> ServiceResult<User> {
    store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("User not found".into()))
}
