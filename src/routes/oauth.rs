use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::require_user_id;
use crate::error::{AppError, AppResult};
use crate::repository::configs;
use crate::schemas::{ExchangeCodeInput, OAuthCallbackQuery};
use crate::services::oauth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth/authorize-url", post(authorize_url))
        .route("/oauth/callback", get(callback))
        .route("/oauth/exchange-code", post(exchange_code))
}

async fn authorize_url(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let url = oauth::build_authorize_url(&state, user_id)?;
    Ok(Json(json!({ "url": url })))
}

fn redirect_page(target: &str, message: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"2;url={target}\"></head>\
         <body><p>{message}</p>\
         <p><a href=\"{target}\">Continuer</a></p></body></html>"
    ))
}

/// Landing page of the Google consent flow. The `state` parameter carries
/// the user id that initiated the flow; this route is necessarily public
/// because Google performs the redirect.
async fn callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Html<String> {
    let frontend = state.config.frontend_base_url();
    let failure = redirect_page(
        &format!("{frontend}?oauth=error"),
        "La connexion Google a \u{e9}chou\u{e9}. Vous pouvez fermer cette page.",
    );

    let (Some(code), Some(raw_state)) = (query.code.as_deref(), query.state.as_deref()) else {
        return failure;
    };
    let Ok(user_id) = raw_state.parse::<Uuid>() else {
        return failure;
    };

    match store_refresh_token(&state, user_id, code).await {
        Ok(()) => redirect_page(
            &format!("{frontend}?oauth=success"),
            "Compte Google connect\u{e9}. Vous pouvez fermer cette page.",
        ),
        Err(error) => {
            tracing::warn!(%user_id, %error, "OAuth callback failed");
            failure
        }
    }
}

async fn store_refresh_token(state: &AppState, user_id: Uuid, code: &str) -> AppResult<()> {
    let tokens = oauth::exchange_code(state, code).await?;
    let refresh_token = tokens
        .get("refresh_token")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AppError::MailAuth("Google did not return a refresh token.".to_string())
        })?;

    let pool = crate::state::db_pool(state)?;
    configs::set_refresh_token(pool, user_id, refresh_token).await?;
    tracing::info!(%user_id, "Stored Gmail refresh token");
    Ok(())
}

/// Desktop flow: the caller pastes the code and supplies their own OAuth
/// client credentials.
async fn exchange_code(
    State(state): State<AppState>,
    Json(input): Json<ExchangeCodeInput>,
) -> AppResult<Json<Value>> {
    let tokens = oauth::exchange_code_with_credentials(
        &state,
        &input.code,
        &input.client_id,
        &input.client_secret,
    )
    .await?;
    Ok(Json(tokens))
}
