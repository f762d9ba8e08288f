use anyhow::Context;
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Meal, MealPatch, Nutrition};

#[derive(Debug, FromRow)]
struct MealRow {
    id: Uuid,
    family_id: Uuid,
    name: String,
    notes: Option<String>,
    ingredients: Vec<String>,
    tags: Vec<String>,
    prep_time: Option<i32>,
    nutrition: Option<Json<Nutrition>>,
    created_by: Uuid,
    created_at: OffsetDateTime,
}

impl From<MealRow> for Meal {
    fn from(r: MealRow) -> Self {
        Self {
            id: r.id,
            family_id: r.family_id,
            name: r.name,
            notes: r.notes,
            ingredients: r.ingredients,
            tags: r.tags,
            prep_time: r.prep_time,
            nutrition: r.nutrition.map(|n| n.0),
            created_by: r.created_by,
            created_at: r.created_at,
        }
    }
}

pub async fn list_by_family(db: &PgPool, family_id: Uuid) -> anyhow::Result<Vec<Meal>> {
    let rows = sqlx::query_as::<_, MealRow>(
        r#"
        SELECT id, family_id, name, notes, ingredients, tags, prep_time, nutrition,
               created_by, created_at
        FROM meals
        WHERE family_id = $1
        ORDER BY created_at DESC
    "#,
    )
    .bind(family_id)
    .fetch_all(db)
    .await
    .context("list meals")?;
    Ok(rows.into_iter().map(Meal::from).collect())
}

pub async fn get(db: &PgPool, family_id: Uuid, meal_id: Uuid) -> anyhow::Result<Option<Meal>> {
    let row = sqlx::query_as::<_, MealRow>(
        r#"
        SELECT id, family_id, name, notes, ingredients, tags, prep_time, nutrition,
               created_by, created_at
        FROM meals
        WHERE id = $1 AND family_id = $2
        "#,
    )
    .bind(meal_id)
    .bind(family_id)
    .fetch_optional(db)
    .await
    .context("get meal")?;
    Ok(row.map(Meal::from))
}

pub async fn insert(db: &PgPool, meal: &Meal) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO meals (id, family_id, name, notes, ingredients, tags, prep_time,
                           nutrition, created_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(meal.id)
    .bind(meal.family_id)
    .bind(&meal.name)
    .bind(&meal.notes)
    .bind(&meal.ingredients)
    .bind(&meal.tags)
    .bind(meal.prep_time)
    .bind(meal.nutrition.map(Json))
    .bind(meal.created_by)
    .bind(meal.created_at)
    .execute(db)
    .await
    .context("insert meal")?;
    Ok(())
}

/// Read-modify-write under a row lock.
pub async fn update(
    db: &PgPool,
    family_id: Uuid,
    meal_id: Uuid,
    patch: MealPatch,
) -> anyhow::Result<Option<Meal>> {
    let mut tx = db.begin().await.context("begin tx")?;
    let row = sqlx::query_as::<_, MealRow>(
        r#"
        SELECT id, family_id, name, notes, ingredients, tags, prep_time, nutrition,
               created_by, created_at
        FROM meals
        WHERE id = $1 AND family_id = $2
        FOR UPDATE
        "#,
    )
    .bind(meal_id)
    .bind(family_id)
    .fetch_optional(&mut *tx)
    .await
    .context("lock meal")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut meal = Meal::from(row);
    patch.apply(&mut meal);

    sqlx::query(
        r#"
        UPDATE meals
           SET name = $3, notes = $4, ingredients = $5, tags = $6,
               prep_time = $7, nutrition = $8
         WHERE id = $1 AND family_id = $2
        "#,
    )
    .bind(meal.id)
    .bind(meal.family_id)
    .bind(&meal.name)
    .bind(&meal.notes)
    .bind(&meal.ingredients)
    .bind(&meal.tags)
    .bind(meal.prep_time)
    .bind(meal.nutrition.map(Json))
    .execute(&mut *tx)
    .await
    .context("update meal")?;
    tx.commit().await.context("commit tx")?;
    Ok(Some(meal))
}

pub async fn delete(db: &PgPool, family_id: Uuid, meal_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query(r#"DELETE FROM meals WHERE id = $1 AND family_id = $2"#)
        .bind(meal_id)
        .bind(family_id)
        .execute(db)
        .await
        .context("delete meal")?;
    Ok(res.rows_affected() > 0)
}
