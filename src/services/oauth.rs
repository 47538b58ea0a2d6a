//! Google OAuth plumbing for Gmail sending.
//!
//! The web flow carries the user id in `state`, lands on the callback
//! route and stores the refresh token in the user's config. Access tokens
//! are minted on demand from that refresh token and never persisted.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const MAIL_SCOPE: &str = "https://mail.google.com/";

/// Redirect target for the desktop / copy-paste code flow.
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

fn client_credentials(state: &AppState) -> AppResult<(&str, &str)> {
    match (
        state.config.google_oauth_client_id.as_deref(),
        state.config.google_oauth_client_secret.as_deref(),
    ) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        _ => Err(AppError::MailAuth(
            "Google OAuth is not configured. Set GOOGLE_OAUTH_CLIENT_ID and GOOGLE_OAUTH_CLIENT_SECRET.".to_string(),
        )),
    }
}

/// Consent URL for the web flow. Offline access plus a forced consent
/// prompt so Google returns a refresh token every time.
pub fn build_authorize_url(state: &AppState, user_id: Uuid) -> AppResult<String> {
    let (client_id, _) = client_credentials(state)?;
    let redirect_uri = state.config.oauth_redirect_uri();

    let url = reqwest::Url::parse_with_params(
        AUTHORIZE_ENDPOINT,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", MAIL_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", user_id.to_string().as_str()),
        ],
    )
    .map_err(|error| AppError::Internal(format!("Could not build consent URL: {error}")))?;
    Ok(url.to_string())
}

async fn token_request(state: &AppState, form: &[(&str, &str)]) -> AppResult<Value> {
    let response = state
        .http_client
        .post(TOKEN_ENDPOINT)
        .form(form)
        .send()
        .await
        .map_err(|error| {
            tracing::error!(%error, "Google token request failed");
            AppError::Dependency("Could not reach the Google OAuth endpoint.".to_string())
        })?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .unwrap_or(json!({"error": "failed to parse response"}));

    if status.is_success() {
        Ok(body)
    } else {
        let detail = body
            .get("error_description")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        Err(AppError::MailAuth(format!(
            "Google OAuth error ({status}): {detail}"
        )))
    }
}

/// Exchange an authorization code from the web flow for tokens.
pub async fn exchange_code(state: &AppState, code: &str) -> AppResult<Value> {
    let (client_id, client_secret) = client_credentials(state)?;
    let redirect_uri = state.config.oauth_redirect_uri();
    token_request(
        state,
        &[
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ],
    )
    .await
}

/// Exchange a copy-pasted code using caller-supplied client credentials.
pub async fn exchange_code_with_credentials(
    state: &AppState,
    code: &str,
    client_id: &str,
    client_secret: &str,
) -> AppResult<Value> {
    token_request(
        state,
        &[
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", OOB_REDIRECT_URI),
            ("grant_type", "authorization_code"),
        ],
    )
    .await
}

/// Mint a short-lived access token for the XOAUTH2 SMTP handshake.
pub async fn mint_access_token(state: &AppState, refresh_token: &str) -> AppResult<String> {
    let (client_id, client_secret) = client_credentials(state)?;
    let body = token_request(
        state,
        &[
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "refresh_token"),
        ],
    )
    .await?;

    body.get("access_token")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            AppError::MailAuth("Google did not return an access token.".to_string())
        })
}
