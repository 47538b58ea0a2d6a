use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Tenant;
use crate::schemas::TenantInput;

const COLUMNS: &str = "id, user_id, last_name, first_name, email, rent, charges, address, \
                       property_id, last_receipt_sent_at, created_at";

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<Tenant>> {
    let rows = sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {COLUMNS} FROM tenants WHERE user_id = $1 ORDER BY created_at ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid, tenant_id: Uuid) -> AppResult<Option<Tenant>> {
    let row = sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {COLUMNS} FROM tenants WHERE id = $1 AND user_id = $2"
    ))
    .bind(tenant_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create(pool: &PgPool, user_id: Uuid, input: &TenantInput) -> AppResult<Tenant> {
    let row = sqlx::query_as::<_, Tenant>(&format!(
        "INSERT INTO tenants (user_id, last_name, first_name, email, rent, charges, address, property_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(&input.last_name)
    .bind(&input.first_name)
    .bind(&input.email)
    .bind(input.rent)
    .bind(input.charges)
    .bind(&input.address)
    .bind(input.property_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Full-replace update of the mutable column set, scoped by owner.
pub async fn update(
    pool: &PgPool,
    user_id: Uuid,
    tenant_id: Uuid,
    input: &TenantInput,
) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE tenants SET last_name = $3, first_name = $4, email = $5, rent = $6, \
         charges = $7, address = $8, property_id = $9 WHERE id = $1 AND user_id = $2",
    )
    .bind(tenant_id)
    .bind(user_id)
    .bind(&input.last_name)
    .bind(&input.first_name)
    .bind(&input.email)
    .bind(input.rent)
    .bind(input.charges)
    .bind(&input.address)
    .bind(input.property_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &PgPool, user_id: Uuid, tenant_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM tenants WHERE id = $1 AND user_id = $2")
        .bind(tenant_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Referential guard for property deletion.
pub async fn count_for_property(pool: &PgPool, user_id: Uuid, property_id: Uuid) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tenants WHERE property_id = $1 AND user_id = $2",
    )
    .bind(property_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Stamp the last successful receipt send. The predicate keeps the marker
/// monotonic: a concurrent or out-of-order write can never move it
/// backward.
pub async fn update_last_sent(
    pool: &PgPool,
    user_id: Uuid,
    tenant_id: Uuid,
    sent_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE tenants SET last_receipt_sent_at = $3 \
         WHERE id = $1 AND user_id = $2 \
           AND (last_receipt_sent_at IS NULL OR last_receipt_sent_at <= $3)",
    )
    .bind(tenant_id)
    .bind(user_id)
    .bind(sent_at)
    .execute(pool)
    .await?;
    Ok(())
}
