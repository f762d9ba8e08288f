use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{remove_from_plan, toggle_in_plan, FamilyStore, NewUser};
use crate::auth::repo_types::{User, UserProfile};
use crate::families::repo_types::{Family, FamilyMember};
use crate::grocery::repo_types::GroceryItem;
use crate::meals::repo_types::{Meal, MealPatch};
use crate::plans::repo_types::{DayPlan, MealEntry, MealType};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    active_family: HashMap<Uuid, Uuid>,
    families: HashMap<Uuid, Family>,
    meals: HashMap<Uuid, Meal>,
    plans: HashMap<(Uuid, String), DayPlan>,
    grocery: HashMap<Uuid, GroceryItem>,
}

/// Process-local store. Every operation runs under one lock, so
/// read-modify-write sequences are atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn family_ids_of(inner: &Inner, user_id: Uuid) -> Vec<Uuid> {
    let mut joined: Vec<(OffsetDateTime, Uuid)> = inner
        .families
        .values()
        .filter_map(|f| f.members.get(&user_id).map(|m| (m.joined_at, f.id)))
        .collect();
    joined.sort();
    joined.into_iter().map(|(_, id)| id).collect()
}

#[async_trait]
impl FamilyStore for MemoryStore {
    async fn create_user(&self, new: NewUser<'_>) -> anyhow::Result<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == new.email) {
            anyhow::bail!("email already registered");
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email.to_string(),
            display_name: new.display_name.map(str::to_string),
            photo_url: None,
            password_hash: new.password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&user_id).cloned())
    }

    async fn get_profile(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&user_id)
            .map(|u| UserProfile::from_user(u, family_ids_of(&inner, user_id))))
    }

    async fn load_active_family(&self, user_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        Ok(self.inner.read().await.active_family.get(&user_id).copied())
    }

    async fn save_active_family(
        &self,
        user_id: Uuid,
        family_id: Option<Uuid>,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        match family_id {
            Some(id) => inner.active_family.insert(user_id, id),
            None => inner.active_family.remove(&user_id),
        };
        Ok(())
    }

    async fn create_family(&self, family: &Family) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .families
            .values()
            .any(|f| f.invite_code == family.invite_code)
        {
            anyhow::bail!("invite code collision");
        }
        inner.families.insert(family.id, family.clone());
        Ok(())
    }

    async fn get_family(&self, family_id: Uuid) -> anyhow::Result<Option<Family>> {
        Ok(self.inner.read().await.families.get(&family_id).cloned())
    }

    async fn find_family_by_invite_code(&self, code: &str) -> anyhow::Result<Option<Family>> {
        let inner = self.inner.read().await;
        Ok(inner
            .families
            .values()
            .find(|f| f.invite_code == code)
            .cloned())
    }

    async fn add_member(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        member: &FamilyMember,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        let family = inner
            .families
            .get_mut(&family_id)
            .ok_or_else(|| anyhow::anyhow!("family {family_id} not found"))?;
        family.members.insert(user_id, member.clone());
        Ok(())
    }

    async fn list_meals(&self, family_id: Uuid) -> anyhow::Result<Vec<Meal>> {
        let inner = self.inner.read().await;
        let mut meals: Vec<Meal> = inner
            .meals
            .values()
            .filter(|m| m.family_id == family_id)
            .cloned()
            .collect();
        meals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(meals)
    }

    async fn get_meal(&self, family_id: Uuid, meal_id: Uuid) -> anyhow::Result<Option<Meal>> {
        let inner = self.inner.read().await;
        Ok(inner
            .meals
            .get(&meal_id)
            .filter(|m| m.family_id == family_id)
            .cloned())
    }

    async fn insert_meal(&self, meal: &Meal) -> anyhow::Result<()> {
        self.inner.write().await.meals.insert(meal.id, meal.clone());
        Ok(())
    }

    async fn update_meal(
        &self,
        family_id: Uuid,
        meal_id: Uuid,
        patch: MealPatch,
    ) -> anyhow::Result<Option<Meal>> {
        let mut inner = self.inner.write().await;
        let Some(meal) = inner
            .meals
            .get_mut(&meal_id)
            .filter(|m| m.family_id == family_id)
        else {
            return Ok(None);
        };
        patch.apply(meal);
        Ok(Some(meal.clone()))
    }

    async fn delete_meal(&self, family_id: Uuid, meal_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .meals
            .get(&meal_id)
            .is_some_and(|m| m.family_id == family_id);
        if owned {
            inner.meals.remove(&meal_id);
        }
        Ok(owned)
    }

    async fn get_day_plan(&self, family_id: Uuid, date: &str) -> anyhow::Result<Option<DayPlan>> {
        let inner = self.inner.read().await;
        Ok(inner.plans.get(&(family_id, date.to_string())).cloned())
    }

    async fn day_plans_in_range(
        &self,
        family_id: Uuid,
        start: &str,
        end: &str,
    ) -> anyhow::Result<Vec<DayPlan>> {
        let inner = self.inner.read().await;
        let mut plans: Vec<DayPlan> = inner
            .plans
            .iter()
            .filter(|((fid, date), _)| {
                *fid == family_id && date.as_str() >= start && date.as_str() <= end
            })
            .map(|(_, p)| p.clone())
            .collect();
        plans.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(plans)
    }

    async fn append_entry(
        &self,
        family_id: Uuid,
        date: &str,
        entry: &MealEntry,
        now: OffsetDateTime,
    ) -> anyhow::Result<DayPlan> {
        let mut inner = self.inner.write().await;
        let plan = inner
            .plans
            .entry((family_id, date.to_string()))
            .or_insert_with(|| DayPlan::empty(family_id, date));
        plan.meals.slot_mut(entry.meal_type).push(entry.clone());
        plan.touch(now);
        Ok(plan.clone())
    }

    async fn remove_entry(
        &self,
        family_id: Uuid,
        date: &str,
        meal_type: MealType,
        entry: &MealEntry,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .plans
            .get_mut(&(family_id, date.to_string()))
            .is_some_and(|plan| remove_from_plan(plan, meal_type, entry, now)))
    }

    async fn toggle_entry(
        &self,
        family_id: Uuid,
        date: &str,
        meal_type: MealType,
        entry_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<MealEntry>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .plans
            .get_mut(&(family_id, date.to_string()))
            .and_then(|plan| toggle_in_plan(plan, meal_type, entry_id, now)))
    }

    async fn list_grocery_items(&self, family_id: Uuid) -> anyhow::Result<Vec<GroceryItem>> {
        let inner = self.inner.read().await;
        Ok(inner
            .grocery
            .values()
            .filter(|i| i.family_id == family_id)
            .cloned()
            .collect())
    }

    async fn insert_grocery_item(&self, item: &GroceryItem) -> anyhow::Result<()> {
        self.inner.write().await.grocery.insert(item.id, item.clone());
        Ok(())
    }

    async fn set_grocery_completed(
        &self,
        family_id: Uuid,
        item_id: Uuid,
        completed: bool,
    ) -> anyhow::Result<bool> {
        let mut inner = self.inner.write().await;
        match inner
            .grocery
            .get_mut(&item_id)
            .filter(|i| i.family_id == family_id)
        {
            Some(item) => {
                item.completed = completed;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_grocery_item(&self, family_id: Uuid, item_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .grocery
            .get(&item_id)
            .is_some_and(|i| i.family_id == family_id);
        if owned {
            inner.grocery.remove(&item_id);
        }
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, meal_type: MealType) -> MealEntry {
        MealEntry {
            id: Uuid::new_v4(),
            meal_id: None,
            name: name.into(),
            meal_type,
            notes: None,
            nutrition: None,
            completed: false,
            completed_at: None,
            assigned_to: None,
        }
    }

    #[tokio::test]
    async fn append_creates_plan_and_range_is_inclusive() {
        let store = MemoryStore::new();
        let family = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        for date in ["2024-05-31", "2024-06-01", "2024-06-07", "2024-06-08"] {
            store
                .append_entry(family, date, &entry("Toast", MealType::Breakfast), now)
                .await
                .unwrap();
        }

        let plans = store
            .day_plans_in_range(family, "2024-06-01", "2024-06-07")
            .await
            .unwrap();
        let dates: Vec<_> = plans.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-06-01", "2024-06-07"]);
        assert_eq!(plans[0].meal_count, 1);
    }

    #[tokio::test]
    async fn range_is_scoped_by_family() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        store
            .append_entry(Uuid::new_v4(), "2024-06-02", &entry("Pie", MealType::Dinner), now)
            .await
            .unwrap();
        let plans = store
            .day_plans_in_range(Uuid::new_v4(), "2024-06-01", "2024-06-07")
            .await
            .unwrap();
        assert!(plans.is_empty());
    }

    #[tokio::test]
    async fn remove_requires_exact_match() {
        let store = MemoryStore::new();
        let family = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let e = entry("Salad", MealType::Lunch);
        store.append_entry(family, "2024-06-03", &e, now).await.unwrap();

        let mut altered = e.clone();
        altered.notes = Some("extra dressing".into());
        assert!(!store
            .remove_entry(family, "2024-06-03", MealType::Lunch, &altered, now)
            .await
            .unwrap());
        assert!(store
            .remove_entry(family, "2024-06-03", MealType::Lunch, &e, now)
            .await
            .unwrap());

        let plan = store.get_day_plan(family, "2024-06-03").await.unwrap().unwrap();
        assert_eq!(plan.meal_count, 0);
    }

    #[tokio::test]
    async fn toggle_sets_and_clears_completed_at() {
        let store = MemoryStore::new();
        let family = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let e = entry("Curry", MealType::Dinner);
        store.append_entry(family, "2024-06-03", &e, now).await.unwrap();

        let done = store
            .toggle_entry(family, "2024-06-03", MealType::Dinner, e.id, now)
            .await
            .unwrap()
            .unwrap();
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(now));

        let undone = store
            .toggle_entry(family, "2024-06-03", MealType::Dinner, e.id, now)
            .await
            .unwrap()
            .unwrap();
        assert!(!undone.completed);
        assert!(undone.completed_at.is_none());
    }

    #[tokio::test]
    async fn meals_are_invisible_to_other_families() {
        let store = MemoryStore::new();
        let family = Uuid::new_v4();
        let meal = Meal {
            id: Uuid::new_v4(),
            family_id: family,
            name: "Tacos".into(),
            notes: None,
            ingredients: vec!["Tortillas".into()],
            tags: vec![],
            prep_time: None,
            nutrition: None,
            created_by: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
        };
        store.insert_meal(&meal).await.unwrap();
        assert!(store.get_meal(Uuid::new_v4(), meal.id).await.unwrap().is_none());
        assert!(!store.delete_meal(Uuid::new_v4(), meal.id).await.unwrap());
        assert_eq!(store.get_meal(family, meal.id).await.unwrap(), Some(meal));
    }
}
