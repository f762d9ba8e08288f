use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{User, UserProfile};

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, photo_url, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, photo_url, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, display_name)
            VALUES ($1, $2, $3)
            RETURNING id, email, display_name, photo_url, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}

pub async fn load_profile(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
    let Some(user) = User::find_by_id(db, user_id).await? else {
        return Ok(None);
    };
    let family_ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT family_id
          FROM family_members
         WHERE user_id = $1
         ORDER BY joined_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list family ids")?;
    Ok(Some(UserProfile::from_user(&user, family_ids)))
}

pub async fn load_active_family(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Uuid>> {
    let active: Option<Option<Uuid>> =
        sqlx::query_scalar(r#"SELECT active_family_id FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(db)
            .await
            .context("load active family")?;
    Ok(active.flatten())
}

pub async fn save_active_family(
    db: &PgPool,
    user_id: Uuid,
    family_id: Option<Uuid>,
) -> anyhow::Result<()> {
    sqlx::query(r#"UPDATE users SET active_family_id = $2 WHERE id = $1"#)
        .bind(user_id)
        .bind(family_id)
        .execute(db)
        .await
        .context("save active family")?;
    Ok(())
}
