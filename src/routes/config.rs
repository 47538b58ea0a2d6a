use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::error::{AppError, AppResult};
use crate::repository::configs;
use crate::schemas::{SupportMessageInput, UserConfig};
use crate::services::mailer;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config", get(get_config).put(update_config))
        .route("/test-email", post(test_email))
        .route("/support-message", post(support_message))
}

async fn get_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<UserConfig>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = crate::state::db_pool(&state)?;
    Ok(Json(configs::get_or_create(pool, user_id).await?))
}

/// Full-replace write; fields the client omits fall back to serde
/// defaults, so the stored document never holds nulls.
async fn update_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<UserConfig>,
) -> AppResult<Json<UserConfig>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = crate::state::db_pool(&state)?;

    configs::update(pool, user_id, &input).await?;
    Ok(Json(configs::get_or_create(pool, user_id).await?))
}

/// A failed check is a normal response, not an HTTP error; the frontend
/// shows the message either way.
async fn test_email(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = crate::state::db_pool(&state)?;
    let config = configs::get_or_create(pool, user_id).await?;

    let body = match mailer::verify_gmail(&state, &config).await {
        Ok(()) => json!({
            "success": true,
            "message": "SMTP connection verified.",
        }),
        Err(error) => json!({
            "success": false,
            "message": error.to_string(),
        }),
    };
    Ok(Json(body))
}

async fn support_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SupportMessageInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    if input.message.trim().len() < 5 {
        return Err(AppError::BadRequest(
            "The support message is too short.".to_string(),
        ));
    }

    let pool = crate::state::db_pool(&state)?;
    let config = configs::get_or_create(pool, user_id).await?;
    mailer::send_support_email(&state, &config, &input).await?;

    Ok(Json(json!({ "success": true })))
}
