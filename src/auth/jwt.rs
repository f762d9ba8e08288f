use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, error::ServiceError, state::AppState};

/// Signing material plus the validation rules every token must pass.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        let mut validation = Validation::default();
        validation.set_issuer(&[cfg.issuer.as_str()]);
        validation.set_audience(&[cfg.audience.as_str()]);
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            validation,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.ttl_minutes.max(0)),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes.max(0)),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn sign(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims::issue(
            user_id,
            kind,
            &self.issuer,
            &self.audience,
            OffsetDateTime::now_utc(),
            ttl,
        );
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(%user_id, ?kind, "token signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Refresh)
    }

    /// Checks signature, expiry, issuer, audience and the token kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        if claims.kind != kind {
            anyhow::bail!("expected {kind:?} token, got {:?}", claims.kind);
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify(token, TokenKind::Refresh)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
}

/// Caller identity taken from a valid bearer access token.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".into()))?;

        match JwtKeys::from_ref(state).verify(token, TokenKind::Access) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(e) => {
                warn!(error = %e, "rejected access token");
                Err(ServiceError::Unauthorized("Invalid or expired token".into()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    #[test]
    fn access_token_round_trip() {
        let keys = keys("familymeals", "households");
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).unwrap();
        let claims = keys.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.aud, "households");
        assert_eq!(claims.exp - claims.iat, 5 * 60);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let keys = keys("iss", "aud");
        let access = keys.sign_access(Uuid::new_v4()).unwrap();
        let refresh = keys.sign_refresh(Uuid::new_v4()).unwrap();
        assert!(keys.verify_refresh(&access).is_err());
        assert!(keys.verify(&refresh, TokenKind::Access).is_err());
        assert!(keys.verify_refresh(&refresh).is_ok());
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let token = keys("good", "aud").sign_access(Uuid::new_v4()).unwrap();
        assert!(keys("bad", "aud").verify(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        assert!(bearer_token(&parts).is_none());
        parts
            .headers
            .insert(AUTHORIZATION, "Token abc".parse().unwrap());
        assert!(bearer_token(&parts).is_none());
        parts
            .headers
            .insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&parts), Some("abc"));
    }
}
