use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::ConfigRow;
use crate::schemas::UserConfig;

const COLUMNS: &str = "user_id, owner_last_name, owner_first_name, owner_address, \
                       owner_signature, email_user, email_from, email_oauth_refresh_token, \
                       app_name";

async fn read(pool: &PgPool, user_id: Uuid) -> AppResult<Option<ConfigRow>> {
    let row = sqlx::query_as::<_, ConfigRow>(&format!(
        "SELECT {COLUMNS} FROM configs WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Read the user's config, lazily creating the default row on first
/// access. The create-then-reread happens at most once; a still-missing
/// row after the insert is a hard failure, not a retry.
pub async fn get_or_create(pool: &PgPool, user_id: Uuid) -> AppResult<UserConfig> {
    if let Some(row) = read(pool, user_id).await? {
        return Ok(UserConfig::from_row(row));
    }

    sqlx::query("INSERT INTO configs (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    match read(pool, user_id).await? {
        Some(row) => Ok(UserConfig::from_row(row)),
        None => Err(AppError::Dependency(
            "Could not initialize user configuration.".to_string(),
        )),
    }
}

/// Full-replace upsert of the config document.
pub async fn update(pool: &PgPool, user_id: Uuid, config: &UserConfig) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO configs (user_id, owner_last_name, owner_first_name, owner_address, \
                              owner_signature, email_user, email_from, \
                              email_oauth_refresh_token, app_name) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (user_id) DO UPDATE SET \
             owner_last_name = EXCLUDED.owner_last_name, \
             owner_first_name = EXCLUDED.owner_first_name, \
             owner_address = EXCLUDED.owner_address, \
             owner_signature = EXCLUDED.owner_signature, \
             email_user = EXCLUDED.email_user, \
             email_from = EXCLUDED.email_from, \
             email_oauth_refresh_token = EXCLUDED.email_oauth_refresh_token, \
             app_name = EXCLUDED.app_name",
    )
    .bind(user_id)
    .bind(&config.owner.last_name)
    .bind(&config.owner.first_name)
    .bind(&config.owner.address)
    .bind(&config.owner.signature)
    .bind(&config.email.user)
    .bind(&config.email.from)
    .bind(&config.email.oauth2.refresh_token)
    .bind(&config.app_name)
    .execute(pool)
    .await?;
    Ok(())
}

/// Store the refresh token obtained from the OAuth consent flow without
/// touching the rest of the document.
pub async fn set_refresh_token(pool: &PgPool, user_id: Uuid, refresh_token: &str) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO configs (user_id, email_oauth_refresh_token) VALUES ($1, $2) \
         ON CONFLICT (user_id) DO UPDATE SET \
             email_oauth_refresh_token = EXCLUDED.email_oauth_refresh_token",
    )
    .bind(user_id)
    .bind(refresh_token)
    .execute(pool)
    .await?;
    Ok(())
}
