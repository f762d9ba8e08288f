use std::cmp::Reverse;

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::generator;
use super::repo_types::{normalize_name, GroceryItem, CATEGORY_GENERAL};
use crate::auth::session::Session;
use crate::error::{ServiceError, ServiceResult};
use crate::events::ChangeKind;
use crate::plans::date_key;
use crate::state::AppState;

fn item_not_found() -> ServiceError {
    ServiceError::not_found("Grocery item not found")
}

/// Pending items first, newest first within each group.
pub fn sort_for_display(items: &mut [GroceryItem]) {
    items.sort_by_key(|item| (item.completed, Reverse(item.added_at)));
}

pub async fn list_items(state: &AppState, session: &Session) -> ServiceResult<Vec<GroceryItem>> {
    let Some(family_id) = session.active_family_id else {
        return Ok(Vec::new());
    };
    let mut items = state.store.list_grocery_items(family_id).await?;
    sort_for_display(&mut items);
    Ok(items)
}

/// Adds a manual item unless a pending one with the same name exists.
/// Returns `None` when nothing was added.
pub async fn add_item(
    state: &AppState,
    session: &Session,
    name: &str,
    category: Option<&str>,
) -> ServiceResult<Option<GroceryItem>> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::bad_request("Item name is required"));
    }
    let Some(family_id) = session.active_family_id else {
        return Ok(None);
    };

    let wanted = normalize_name(name);
    let duplicate = state
        .store
        .list_grocery_items(family_id)
        .await?
        .iter()
        .any(|item| !item.completed && normalize_name(&item.name) == wanted);
    if duplicate {
        debug!(%family_id, name, "pending item already listed");
        return Ok(None);
    }

    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(CATEGORY_GENERAL);
    let item = GroceryItem {
        id: Uuid::new_v4(),
        family_id,
        name: name.to_string(),
        completed: false,
        category: Some(category.to_string()),
        source_meal_id: None,
        created_by: Some(session.user_id),
        added_at: OffsetDateTime::now_utc(),
    };
    state.store.insert_grocery_item(&item).await?;

    info!(%family_id, item_id = %item.id, name = %item.name, "grocery item added");
    state.changes.publish(family_id, ChangeKind::GroceryChanged);
    Ok(Some(item))
}

pub async fn toggle_item(
    state: &AppState,
    session: &Session,
    item_id: Uuid,
) -> ServiceResult<GroceryItem> {
    let family_id = session.active_family_id.ok_or_else(item_not_found)?;
    let mut item = state
        .store
        .list_grocery_items(family_id)
        .await?
        .into_iter()
        .find(|item| item.id == item_id)
        .ok_or_else(item_not_found)?;

    item.completed = !item.completed;
    if !state
        .store
        .set_grocery_completed(family_id, item_id, item.completed)
        .await?
    {
        return Err(item_not_found());
    }
    state.changes.publish(family_id, ChangeKind::GroceryChanged);
    Ok(item)
}

pub async fn delete_item(state: &AppState, session: &Session, item_id: Uuid) -> ServiceResult<()> {
    let family_id = session.active_family_id.ok_or_else(item_not_found)?;
    if !state.store.delete_grocery_item(family_id, item_id).await? {
        return Err(item_not_found());
    }
    state.changes.publish(family_id, ChangeKind::GroceryChanged);
    Ok(())
}

/// Adds ingredients of meals planned between `start` and `end` inclusive.
pub async fn generate_from_range(
    state: &AppState,
    session: &Session,
    start: &str,
    end: &str,
) -> ServiceResult<Vec<GroceryItem>> {
    let (start, end) = (date_key::normalize(start)?, date_key::normalize(end)?);
    let Some(family_id) = session.active_family_id else {
        debug!(user_id = %session.user_id, "generate without active family");
        return Ok(Vec::new());
    };

    let inserted = generator::generate_from_range(
        state.store.as_ref(),
        family_id,
        session.user_id,
        &start,
        &end,
    )
    .await?;
    if !inserted.is_empty() {
        state.changes.publish(family_id, ChangeKind::GroceryChanged);
    }
    Ok(inserted)
}
