//! Persistence seam for everything scoped by a family.
//!
//! `FamilyStore` covers the point reads, range query, create/upsert, patch
//! and delete operations the services need. `PgStore` backs it with
//! Postgres, `MemoryStore` keeps everything in process.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{User, UserProfile};
use crate::families::repo_types::{Family, FamilyMember};
use crate::grocery::repo_types::GroceryItem;
use crate::meals::repo_types::{Meal, MealPatch};
use crate::plans::repo_types::{DayPlan, MealEntry, MealType};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Fields needed to create a user account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub display_name: Option<&'a str>,
}

#[async_trait]
pub trait FamilyStore: Send + Sync {
    // ---- users & session ----
    async fn create_user(&self, new: NewUser<'_>) -> anyhow::Result<User>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn get_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>>;
    async fn get_profile(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>>;
    async fn load_active_family(&self, user_id: Uuid) -> anyhow::Result<Option<Uuid>>;
    async fn save_active_family(&self, user_id: Uuid, family_id: Option<Uuid>)
        -> anyhow::Result<()>;

    // ---- families ----
    async fn create_family(&self, family: &Family) -> anyhow::Result<()>;
    async fn get_family(&self, family_id: Uuid) -> anyhow::Result<Option<Family>>;
    /// `code` is expected already normalized to uppercase.
    async fn find_family_by_invite_code(&self, code: &str) -> anyhow::Result<Option<Family>>;
    async fn add_member(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        member: &FamilyMember,
    ) -> anyhow::Result<()>;

    // ---- meals ----
    async fn list_meals(&self, family_id: Uuid) -> anyhow::Result<Vec<Meal>>;
    async fn get_meal(&self, family_id: Uuid, meal_id: Uuid) -> anyhow::Result<Option<Meal>>;
    async fn insert_meal(&self, meal: &Meal) -> anyhow::Result<()>;
    async fn update_meal(
        &self,
        family_id: Uuid,
        meal_id: Uuid,
        patch: MealPatch,
    ) -> anyhow::Result<Option<Meal>>;
    async fn delete_meal(&self, family_id: Uuid, meal_id: Uuid) -> anyhow::Result<bool>;

    // ---- day plans ----
    async fn get_day_plan(&self, family_id: Uuid, date: &str) -> anyhow::Result<Option<DayPlan>>;
    /// Inclusive on both ends, compared as date-key strings, ordered by date.
    async fn day_plans_in_range(
        &self,
        family_id: Uuid,
        start: &str,
        end: &str,
    ) -> anyhow::Result<Vec<DayPlan>>;
    /// Appends to the slot, creating the plan if it does not exist yet.
    async fn append_entry(
        &self,
        family_id: Uuid,
        date: &str,
        entry: &MealEntry,
        now: OffsetDateTime,
    ) -> anyhow::Result<DayPlan>;
    /// Removes entries equal to `entry` in every field. Returns whether any matched.
    async fn remove_entry(
        &self,
        family_id: Uuid,
        date: &str,
        meal_type: MealType,
        entry: &MealEntry,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool>;
    /// Flips completion of the entry with `entry_id`, returning its new state.
    async fn toggle_entry(
        &self,
        family_id: Uuid,
        date: &str,
        meal_type: MealType,
        entry_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<MealEntry>>;

    // ---- grocery ----
    async fn list_grocery_items(&self, family_id: Uuid) -> anyhow::Result<Vec<GroceryItem>>;
    async fn insert_grocery_item(&self, item: &GroceryItem) -> anyhow::Result<()>;
    async fn set_grocery_completed(
        &self,
        family_id: Uuid,
        item_id: Uuid,
        completed: bool,
    ) -> anyhow::Result<bool>;
    async fn delete_grocery_item(&self, family_id: Uuid, item_id: Uuid) -> anyhow::Result<bool>;
}

/// Flips completion on one entry in place; shared by both store backends.
pub(crate) fn toggle_in_plan(
    plan: &mut DayPlan,
    meal_type: MealType,
    entry_id: Uuid,
    now: OffsetDateTime,
) -> Option<MealEntry> {
    let entry = plan
        .meals
        .slot_mut(meal_type)
        .iter_mut()
        .find(|e| e.id == entry_id)?;
    entry.completed = !entry.completed;
    entry.completed_at = entry.completed.then_some(now);
    let updated = entry.clone();
    plan.touch(now);
    Some(updated)
}

/// Exact-match removal; shared by both store backends.
pub(crate) fn remove_from_plan(
    plan: &mut DayPlan,
    meal_type: MealType,
    entry: &MealEntry,
    now: OffsetDateTime,
) -> bool {
    let slot = plan.meals.slot_mut(meal_type);
    let before = slot.len();
    slot.retain(|e| e != entry);
    let removed = slot.len() != before;
    if removed {
        plan.touch(now);
    }
    removed
}
