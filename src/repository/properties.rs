use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Property;

const COLUMNS: &str = "id, user_id, name, address, created_at";

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<Property>> {
    let rows = sqlx::query_as::<_, Property>(&format!(
        "SELECT {COLUMNS} FROM properties WHERE user_id = $1 ORDER BY created_at ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(
    pool: &PgPool,
    user_id: Uuid,
    property_id: Uuid,
) -> AppResult<Option<Property>> {
    let row = sqlx::query_as::<_, Property>(&format!(
        "SELECT {COLUMNS} FROM properties WHERE id = $1 AND user_id = $2"
    ))
    .bind(property_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// First property by creation order; used as the default home for new
/// tenants created without an explicit property.
pub async fn first_for_user(pool: &PgPool, user_id: Uuid) -> AppResult<Option<Property>> {
    let row = sqlx::query_as::<_, Property>(&format!(
        "SELECT {COLUMNS} FROM properties WHERE user_id = $1 ORDER BY created_at ASC LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    address: &str,
) -> AppResult<Property> {
    let row = sqlx::query_as::<_, Property>(&format!(
        "INSERT INTO properties (user_id, name, address) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(name)
    .bind(address)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Full-replace update scoped by owner; returns the number of rows
/// touched so the route can turn a silent miss into a 404.
pub async fn update(
    pool: &PgPool,
    user_id: Uuid,
    property_id: Uuid,
    name: &str,
    address: &str,
) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE properties SET name = $3, address = $4 WHERE id = $1 AND user_id = $2",
    )
    .bind(property_id)
    .bind(user_id)
    .bind(name)
    .bind(address)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &PgPool, user_id: Uuid, property_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM properties WHERE id = $1 AND user_id = $2")
        .bind(property_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
