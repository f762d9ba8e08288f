use anyhow::Context;
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{DayPlan, PlanMeals};

#[derive(Debug, FromRow)]
struct DayPlanRow {
    family_id: Uuid,
    date_key: String,
    updated_at: Option<OffsetDateTime>,
    meal_count: i32,
    meals: Json<PlanMeals>,
}

impl From<DayPlanRow> for DayPlan {
    fn from(r: DayPlanRow) -> Self {
        Self {
            date: r.date_key,
            family_id: r.family_id,
            updated_at: r.updated_at,
            meal_count: r.meal_count,
            meals: r.meals.0,
        }
    }
}

pub async fn get(db: &PgPool, family_id: Uuid, date: &str) -> anyhow::Result<Option<DayPlan>> {
    let row = sqlx::query_as::<_, DayPlanRow>(
        r#"
        SELECT family_id, date_key, updated_at, meal_count, meals
          FROM day_plans
         WHERE family_id = $1 AND date_key = $2
        "#,
    )
    .bind(family_id)
    .bind(date)
    .fetch_optional(db)
    .await
    .context("get day plan")?;
    Ok(row.map(DayPlan::from))
}

pub async fn list_range(
    db: &PgPool,
    family_id: Uuid,
    start: &str,
    end: &str,
) -> anyhow::Result<Vec<DayPlan>> {
    let rows = sqlx::query_as::<_, DayPlanRow>(
        r#"
        SELECT family_id, date_key, updated_at, meal_count, meals
          FROM day_plans
         WHERE family_id = $1 AND date_key >= $2 AND date_key <= $3
         ORDER BY date_key ASC
        "#,
    )
    .bind(family_id)
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await
    .context("list day plans in range")?;
    Ok(rows.into_iter().map(DayPlan::from).collect())
}

/// Lock the plan row for a read-modify-write. With `create` the row is
/// upserted first so the lock always lands on something.
pub async fn lock_tx(
    tx: &mut Transaction<'_, Postgres>,
    family_id: Uuid,
    date: &str,
    create: bool,
) -> anyhow::Result<Option<DayPlan>> {
    if create {
        sqlx::query(
            r#"
            INSERT INTO day_plans (family_id, date_key)
            VALUES ($1, $2)
            ON CONFLICT (family_id, date_key) DO NOTHING
            "#,
        )
        .bind(family_id)
        .bind(date)
        .execute(&mut **tx)
        .await
        .context("upsert day plan")?;
    }

    let row = sqlx::query_as::<_, DayPlanRow>(
        r#"
        SELECT family_id, date_key, updated_at, meal_count, meals
          FROM day_plans
         WHERE family_id = $1 AND date_key = $2
         FOR UPDATE
        "#,
    )
    .bind(family_id)
    .bind(date)
    .fetch_optional(&mut **tx)
    .await
    .context("lock day plan")?;
    Ok(row.map(DayPlan::from))
}

pub async fn save_tx(tx: &mut Transaction<'_, Postgres>, plan: &DayPlan) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE day_plans
           SET updated_at = $3, meal_count = $4, meals = $5
         WHERE family_id = $1 AND date_key = $2
        "#,
    )
    .bind(plan.family_id)
    .bind(&plan.date)
    .bind(plan.updated_at)
    .bind(plan.meal_count)
    .bind(Json(&plan.meals))
    .execute(&mut **tx)
    .await
    .context("save day plan")?;
    Ok(())
}
