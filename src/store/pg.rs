use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{remove_from_plan, toggle_in_plan, FamilyStore, NewUser};
use crate::auth::repo_types::{User, UserProfile};
use crate::families::repo_types::{Family, FamilyMember};
use crate::grocery::repo_types::GroceryItem;
use crate::meals::repo_types::{Meal, MealPatch};
use crate::plans::repo_types::{DayPlan, MealEntry, MealType};
use crate::{auth, families, grocery, meals, plans};

/// Postgres-backed store. Day plan mutations lock the plan row
/// (`SELECT ... FOR UPDATE`) for the duration of the read-modify-write.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FamilyStore for PgStore {
    async fn create_user(&self, new: NewUser<'_>) -> anyhow::Result<User> {
        User::create(&self.db, new.email, new.password_hash, new.display_name).await
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        User::find_by_email(&self.db, email).await
    }

    async fn get_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        User::find_by_id(&self.db, user_id).await
    }

    async fn get_profile(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        auth::repo::load_profile(&self.db, user_id).await
    }

    async fn load_active_family(&self, user_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        auth::repo::load_active_family(&self.db, user_id).await
    }

    async fn save_active_family(
        &self,
        user_id: Uuid,
        family_id: Option<Uuid>,
    ) -> anyhow::Result<()> {
        auth::repo::save_active_family(&self.db, user_id, family_id).await
    }

    async fn create_family(&self, family: &Family) -> anyhow::Result<()> {
        families::repo::insert_family(&self.db, family).await
    }

    async fn get_family(&self, family_id: Uuid) -> anyhow::Result<Option<Family>> {
        families::repo::get_family(&self.db, family_id).await
    }

    async fn find_family_by_invite_code(&self, code: &str) -> anyhow::Result<Option<Family>> {
        families::repo::find_by_invite_code(&self.db, code).await
    }

    async fn add_member(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        member: &FamilyMember,
    ) -> anyhow::Result<()> {
        families::repo::upsert_member(&self.db, family_id, user_id, member).await
    }

    async fn list_meals(&self, family_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        meals::repo::list_by_family(&self.db, family_id).await
    }

    async fn get_meal(&self, family_id: Uuid, meal_id: Uuid) -> anyhow::Result<Option<Meal>> {
        meals::repo::get(&self.db, family_id, meal_id).await
    }

    async fn insert_meal(&self, meal: &Meal) -> anyhow::Result<()> {
        meals::repo::insert(&self.db, meal).await
    }

    async fn update_meal(
        &self,
        family_id: Uuid,
        meal_id: Uuid,
        patch: MealPatch,
    ) -> anyhow::Result<Option<Meal>> {
        meals::repo::update(&self.db, family_id, meal_id, patch).await
    }

    async fn delete_meal(&self, family_id: Uuid, meal_id: Uuid) -> anyhow::Result<bool> {
        meals::repo::delete(&self.db, family_id, meal_id).await
    }

    async fn get_day_plan(&self, family_id: Uuid, date: &str) -> anyhow::Result<Option<DayPlan>> {
        plans::repo::get(&self.db, family_id, date).await
    }

    async fn day_plans_in_range(
        &self,
        family_id: Uuid,
        start: &str,
        end: &str,
    ) -> anyhow::Result<Vec<DayPlan>> {
        plans::repo::list_range(&self.db, family_id, start, end).await
    }

    async fn append_entry(
        &self,
        family_id: Uuid,
        date: &str,
        entry: &MealEntry,
        now: OffsetDateTime,
    ) -> anyhow::Result<DayPlan> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let mut plan = plans::repo::lock_tx(&mut tx, family_id, date, true)
            .await?
            .context("day plan missing after upsert")?;
        plan.meals.slot_mut(entry.meal_type).push(entry.clone());
        plan.touch(now);
        plans::repo::save_tx(&mut tx, &plan).await?;
        tx.commit().await.context("commit tx")?;
        Ok(plan)
    }

    async fn remove_entry(
        &self,
        family_id: Uuid,
        date: &str,
        meal_type: MealType,
        entry: &MealEntry,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let Some(mut plan) = plans::repo::lock_tx(&mut tx, family_id, date, false).await? else {
            return Ok(false);
        };
        let removed = remove_from_plan(&mut plan, meal_type, entry, now);
        if removed {
            plans::repo::save_tx(&mut tx, &plan).await?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(removed)
    }

    async fn toggle_entry(
        &self,
        family_id: Uuid,
        date: &str,
        meal_type: MealType,
        entry_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<MealEntry>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let Some(mut plan) = plans::repo::lock_tx(&mut tx, family_id, date, false).await? else {
            return Ok(None);
        };
        let toggled = toggle_in_plan(&mut plan, meal_type, entry_id, now);
        if toggled.is_some() {
            plans::repo::save_tx(&mut tx, &plan).await?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(toggled)
    }

    async fn list_grocery_items(&self, family_id: Uuid) -> anyhow::Result<Vec<GroceryItem>> {
        grocery::repo::list_by_family(&self.db, family_id).await
    }

    async fn insert_grocery_item(&self, item: &GroceryItem) -> anyhow::Result<()> {
        grocery::repo::insert(&self.db, item).await
    }

    async fn set_grocery_completed(
        &self,
        family_id: Uuid,
        item_id: Uuid,
        completed: bool,
    ) -> anyhow::Result<bool> {
        grocery::repo::set_completed(&self.db, family_id, item_id, completed).await
    }

    async fn delete_grocery_item(&self, family_id: Uuid, item_id: Uuid) -> anyhow::Result<bool> {
        grocery::repo::delete(&self.db, family_id, item_id).await
    }
}
