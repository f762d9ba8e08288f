use std::collections::BTreeMap;

use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Family, FamilyMember, FamilyRole};

#[derive(Debug, FromRow)]
struct FamilyRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    created_at: OffsetDateTime,
    invite_code: String,
}

#[derive(Debug, FromRow)]
struct MemberRow {
    user_id: Uuid,
    role: String,
    joined_at: OffsetDateTime,
    email: Option<String>,
    display_name: Option<String>,
}

async fn with_members(db: &PgPool, row: FamilyRow) -> anyhow::Result<Family> {
    let rows = sqlx::query_as::<_, MemberRow>(
        r#"
        SELECT user_id, role, joined_at, email, display_name
          FROM family_members
         WHERE family_id = $1
        "#,
    )
    .bind(row.id)
    .fetch_all(db)
    .await
    .context("list family members")?;

    let mut members = BTreeMap::new();
    for m in rows {
        let role = FamilyRole::parse(&m.role)
            .with_context(|| format!("unknown family role {:?}", m.role))?;
        members.insert(
            m.user_id,
            FamilyMember {
                role,
                joined_at: m.joined_at,
                email: m.email,
                display_name: m.display_name,
            },
        );
    }

    Ok(Family {
        id: row.id,
        name: row.name,
        owner_id: row.owner_id,
        created_at: row.created_at,
        invite_code: row.invite_code,
        members,
    })
}

/// Insert the family and its initial members in one transaction.
pub async fn insert_family(db: &PgPool, family: &Family) -> anyhow::Result<()> {
    let mut tx = db.begin().await.context("begin tx")?;
    sqlx::query(
        r#"
        INSERT INTO families (id, name, owner_id, invite_code, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(family.id)
    .bind(&family.name)
    .bind(family.owner_id)
    .bind(&family.invite_code)
    .bind(family.created_at)
    .execute(&mut *tx)
    .await
    .context("insert family")?;

    for (user_id, member) in &family.members {
        sqlx::query(
            r#"
            INSERT INTO family_members (family_id, user_id, role, joined_at, email, display_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(family.id)
        .bind(user_id)
        .bind(member.role.as_str())
        .bind(member.joined_at)
        .bind(&member.email)
        .bind(&member.display_name)
        .execute(&mut *tx)
        .await
        .context("insert family member")?;
    }
    tx.commit().await.context("commit tx")?;
    Ok(())
}

pub async fn get_family(db: &PgPool, family_id: Uuid) -> anyhow::Result<Option<Family>> {
    let row = sqlx::query_as::<_, FamilyRow>(
        r#"
        SELECT id, name, owner_id, created_at, invite_code
          FROM families
         WHERE id = $1
        "#,
    )
    .bind(family_id)
    .fetch_optional(db)
    .await
    .context("get family")?;
    match row {
        Some(row) => Ok(Some(with_members(db, row).await?)),
        None => Ok(None),
    }
}

pub async fn find_by_invite_code(db: &PgPool, code: &str) -> anyhow::Result<Option<Family>> {
    let row = sqlx::query_as::<_, FamilyRow>(
        r#"
        SELECT id, name, owner_id, created_at, invite_code
          FROM families
         WHERE invite_code = $1
         LIMIT 1
        "#,
    )
    .bind(code)
    .fetch_optional(db)
    .await
    .context("find family by invite code")?;
    match row {
        Some(row) => Ok(Some(with_members(db, row).await?)),
        None => Ok(None),
    }
}

pub async fn upsert_member(
    db: &PgPool,
    family_id: Uuid,
    user_id: Uuid,
    member: &FamilyMember,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO family_members (family_id, user_id, role, joined_at, email, display_name)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (family_id, user_id) DO UPDATE
           SET role = EXCLUDED.role,
               email = EXCLUDED.email,
               display_name = EXCLUDED.display_name
        "#,
    )
    .bind(family_id)
    .bind(user_id)
    .bind(member.role.as_str())
    .bind(member.joined_at)
    .bind(&member.email)
    .bind(&member.display_name)
    .execute(db)
    .await
    .context("upsert family member")?;
    Ok(())
}
