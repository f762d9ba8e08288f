use std::collections::BTreeMap;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo_types::{Family, FamilyMember, FamilyRole};
use crate::auth::session::Session;
use crate::error::{ServiceError, ServiceResult};
use crate::events::ChangeKind;
use crate::state::AppState;
use crate::store::FamilyStore;

const INVITE_CODE_ATTEMPTS: usize = 5;

/// First eight characters of a fresh UUID, uppercased.
pub fn generate_invite_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Draws codes from `generate` until one is not held by any family.
async fn unused_invite_code(
    store: &dyn FamilyStore,
    mut generate: impl FnMut() -> String,
) -> ServiceResult<String> {
    for attempt in 1..=INVITE_CODE_ATTEMPTS {
        let code = generate();
        if store.find_family_by_invite_code(&code).await?.is_none() {
            return Ok(code);
        }
        warn!(attempt, "invite code collision");
    }
    Err(ServiceError::Internal(anyhow::anyhow!(
        "no unused invite code after {INVITE_CODE_ATTEMPTS} attempts"
    )))
}

fn member_for(session: &Session, role: FamilyRole, now: OffsetDateTime) -> FamilyMember {
    FamilyMember {
        role,
        joined_at: now,
        email: Some(session.profile.email.clone()),
        display_name: session.profile.display_name.clone(),
    }
}

/// Creates a family owned by the caller and makes it their active family.
pub async fn create_family(
    state: &AppState,
    session: &mut Session,
    name: &str,
) -> ServiceResult<Family> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::bad_request("Family name is required"));
    }

    let invite_code = unused_invite_code(state.store.as_ref(), generate_invite_code).await?;
    let now = OffsetDateTime::now_utc();
    let mut members = BTreeMap::new();
    members.insert(session.user_id, member_for(session, FamilyRole::Owner, now));
    let family = Family {
        id: Uuid::new_v4(),
        name: name.to_string(),
        owner_id: session.user_id,
        created_at: now,
        invite_code,
        members,
    };
    state.store.create_family(&family).await?;
    session
        .switch_family(state.store.as_ref(), family.id)
        .await?;

    info!(family_id = %family.id, user_id = %session.user_id, "family created");
    state.changes.publish(family.id, ChangeKind::FamilyChanged);
    Ok(family)
}

/// Joins by invite code. Codes match case-insensitively. Joining a family
/// the caller already belongs to only switches the active family.
pub async fn join_family(
    state: &AppState,
    session: &mut Session,
    invite_code: &str,
) -> ServiceResult<Family> {
    let code = invite_code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ServiceError::bad_request("Invite code is required"));
    }
    let Some(mut family) = state.store.find_family_by_invite_code(&code).await? else {
        warn!(code = %code, user_id = %session.user_id, "invalid invite code");
        return Err(ServiceError::not_found("Invalid invite code"));
    };

    if !family.is_member(session.user_id) {
        let member = member_for(session, FamilyRole::Member, OffsetDateTime::now_utc());
        state
            .store
            .add_member(family.id, session.user_id, &member)
            .await?;
        family.members.insert(session.user_id, member);
        info!(family_id = %family.id, user_id = %session.user_id, "member joined family");
        state.changes.publish(family.id, ChangeKind::FamilyChanged);
    }

    session
        .switch_family(state.store.as_ref(), family.id)
        .await?;
    Ok(family)
}

pub async fn active_family(state: &AppState, session: &Session) -> ServiceResult<Family> {
    let no_family = || ServiceError::not_found("No active family");
    let family_id = session.active_family_id.ok_or_else(no_family)?;
    state.store.get_family(family_id).await?.ok_or_else(no_family)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::NewUser;

    /// Registers a user directly in the store and resolves their session.
    pub(crate) async fn session_for(state: &AppState, email: &str) -> Session {
        let user = state
            .store
            .create_user(NewUser {
                email,
                password_hash: "x",
                display_name: Some("Cook"),
            })
            .await
            .unwrap();
        Session::resolve(state.store.as_ref(), user.id).await.unwrap()
    }

    /// A user with a freshly created active family.
    pub(crate) async fn family_session(state: &AppState, email: &str) -> Session {
        let mut session = session_for(state, email).await;
        create_family(state, &mut session, "Home").await.unwrap();
        session
    }

    #[test]
    fn invite_codes_are_eight_uppercase_chars() {
        let code = generate_invite_code();
        assert_eq!(code.len(), 8);
        assert_eq!(code, code.to_uppercase());
    }

    #[tokio::test]
    async fn taken_invite_code_is_redrawn() {
        let state = AppState::fake();
        let mut owner = session_for(&state, "owner@b.co").await;
        let taken = create_family(&state, &mut owner, "Home").await.unwrap().invite_code;

        let mut codes = vec![taken.clone(), "FRESH456".to_string()].into_iter();
        let code = unused_invite_code(state.store.as_ref(), || codes.next().unwrap())
            .await
            .unwrap();
        assert_eq!(code, "FRESH456");

        let err = unused_invite_code(state.store.as_ref(), || taken.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[tokio::test]
    async fn create_requires_name_and_sets_active() {
        let state = AppState::fake();
        let mut session = session_for(&state, "a@b.co").await;

        let err = create_family(&state, &mut session, "   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));

        let family = create_family(&state, &mut session, "  Smiths ").await.unwrap();
        assert_eq!(family.name, "Smiths");
        assert_eq!(family.members[&session.user_id].role, FamilyRole::Owner);
        assert_eq!(session.active_family_id, Some(family.id));
        assert_eq!(
            state.store.load_active_family(session.user_id).await.unwrap(),
            Some(family.id)
        );
    }

    #[tokio::test]
    async fn join_normalizes_code_and_adds_member() {
        let state = AppState::fake();
        let mut owner = session_for(&state, "owner@b.co").await;
        let family = create_family(&state, &mut owner, "Home").await.unwrap();

        let mut guest = session_for(&state, "guest@b.co").await;
        let joined = join_family(&state, &mut guest, &format!(" {} ", family.invite_code.to_lowercase()))
            .await
            .unwrap();
        assert_eq!(joined.id, family.id);
        assert_eq!(joined.members[&guest.user_id].role, FamilyRole::Member);
        assert_eq!(guest.active_family_id, Some(family.id));

        let stored = state.store.get_family(family.id).await.unwrap().unwrap();
        assert_eq!(stored.members.len(), 2);
    }

    #[tokio::test]
    async fn join_existing_member_only_switches() {
        let state = AppState::fake();
        let mut owner = session_for(&state, "owner@b.co").await;
        let first = create_family(&state, &mut owner, "First").await.unwrap();
        let second = create_family(&state, &mut owner, "Second").await.unwrap();
        assert_eq!(owner.active_family_id, Some(second.id));

        let family = join_family(&state, &mut owner, &first.invite_code).await.unwrap();
        assert_eq!(family.members.len(), 1);
        assert_eq!(family.members[&owner.user_id].role, FamilyRole::Owner);
        assert_eq!(owner.active_family_id, Some(first.id));
    }

    #[tokio::test]
    async fn active_family_is_not_found_without_membership() {
        let state = AppState::fake();
        let session = session_for(&state, "a@b.co").await;
        let err = active_family(&state, &session).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let session = family_session(&state, "b@b.co").await;
        let family = active_family(&state, &session).await.unwrap();
        assert_eq!(Some(family.id), session.active_family_id);
    }

    #[tokio::test]
    async fn join_unknown_code_is_not_found() {
        let state = AppState::fake();
        let mut session = session_for(&state, "a@b.co").await;
        let err = join_family(&state, &mut session, "NOPE1234").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "Invalid invite code"));
    }
}
