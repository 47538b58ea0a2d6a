use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::PasswordReset;

const COLUMNS: &str = "id, user_id, token_hash, expires_at, used_at, created_at";

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO password_resets (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Only unconsumed rows are returned; expiry is checked by the caller so
/// the "expired" and "unknown" cases produce the same error message.
pub async fn find_by_token_hash(pool: &PgPool, token_hash: &str) -> AppResult<Option<PasswordReset>> {
    let row = sqlx::query_as::<_, PasswordReset>(&format!(
        "SELECT {COLUMNS} FROM password_resets WHERE token_hash = $1 AND used_at IS NULL"
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn mark_used(pool: &PgPool, reset_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE password_resets SET used_at = NOW() WHERE id = $1")
        .bind(reset_id)
        .execute(pool)
        .await?;
    Ok(())
}
