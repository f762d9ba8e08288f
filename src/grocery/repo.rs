use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::GroceryItem;

pub async fn list_by_family(db: &PgPool, family_id: Uuid) -> anyhow::Result<Vec<GroceryItem>> {
    let rows = sqlx::query_as::<_, GroceryItem>(
        r#"
        SELECT id, family_id, name, completed, category, source_meal_id, created_by, added_at
          FROM grocery_items
         WHERE family_id = $1
        "#,
    )
    .bind(family_id)
    .fetch_all(db)
    .await
    .context("list grocery items")?;
    Ok(rows)
}

pub async fn insert(db: &PgPool, item: &GroceryItem) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO grocery_items (id, family_id, name, completed, category, source_meal_id,
                                   created_by, added_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(item.id)
    .bind(item.family_id)
    .bind(&item.name)
    .bind(item.completed)
    .bind(&item.category)
    .bind(item.source_meal_id)
    .bind(item.created_by)
    .bind(item.added_at)
    .execute(db)
    .await
    .context("insert grocery item")?;
    Ok(())
}

pub async fn set_completed(
    db: &PgPool,
    family_id: Uuid,
    item_id: Uuid,
    completed: bool,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"UPDATE grocery_items SET completed = $3 WHERE id = $1 AND family_id = $2"#,
    )
    .bind(item_id)
    .bind(family_id)
    .bind(completed)
    .execute(db)
    .await
    .context("update grocery item")?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete(db: &PgPool, family_id: Uuid, item_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query(r#"DELETE FROM grocery_items WHERE id = $1 AND family_id = $2"#)
        .bind(item_id)
        .bind(family_id)
        .execute(db)
        .await
        .context("delete grocery item")?;
    Ok(res.rows_affected() > 0)
}
