//! Per-request session context: who is calling and which family they are
//! working in. Only the active family selection is persisted.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use tracing::debug;
use uuid::Uuid;

use super::{jwt::AuthUser, repo_types::UserProfile};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use crate::store::FamilyStore;

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub profile: UserProfile,
    pub active_family_id: Option<Uuid>,
}

/// Keeps a stored selection only while the user still belongs to it,
/// otherwise falls back to the first family.
pub fn pick_active_family(stored: Option<Uuid>, family_ids: &[Uuid]) -> Option<Uuid> {
    match stored {
        Some(id) if family_ids.contains(&id) => Some(id),
        _ => family_ids.first().copied(),
    }
}

impl Session {
    pub async fn resolve(store: &dyn FamilyStore, user_id: Uuid) -> ServiceResult<Self> {
        let profile = store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("User not found".into()))?;

        let stored = store.load_active_family(user_id).await?;
        let active = pick_active_family(stored, &profile.family_ids);
        if active != stored {
            debug!(%user_id, ?stored, ?active, "active family reset");
            store.save_active_family(user_id, active).await?;
        }

        Ok(Self {
            user_id,
            profile,
            active_family_id: active,
        })
    }

    /// Persists a new active family; the user must belong to it.
    pub async fn switch_family(
        &mut self,
        store: &dyn FamilyStore,
        family_id: Uuid,
    ) -> ServiceResult<()> {
        if !self.profile.family_ids.contains(&family_id) {
            self.profile = store
                .get_profile(self.user_id)
                .await?
                .ok_or_else(|| ServiceError::Unauthorized("User not found".into()))?;
        }
        if !self.profile.family_ids.contains(&family_id) {
            return Err(ServiceError::Forbidden("Not a member of this family".into()));
        }
        store.save_active_family(self.user_id, Some(family_id)).await?;
        self.active_family_id = Some(family_id);
        Ok(())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        Ok(Session::resolve(state.store.as_ref(), user_id).await?)
    }
}
