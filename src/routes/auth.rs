use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::auth::{
    generate_reset_token, generate_token, hash_password, hash_reset_token, verify_password,
};
use crate::error::{AppError, AppResult};
use crate::repository::{password_resets, users};
use crate::schemas::{
    validate_input, ForgotPasswordInput, LoginInput, ResetPasswordInput, SignupInput,
};
use crate::services::mailer;
use crate::state::AppState;

/// Reset links are valid for one hour.
const RESET_VALIDITY_HOURS: i64 = 1;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupInput>,
) -> AppResult<Json<Value>> {
    validate_input(&input)?;
    let pool = crate::state::db_pool(&state)?;
    let email = input.email.trim().to_lowercase();

    if users::find_by_email(pool, &email).await?.is_some() {
        return Err(AppError::Conflict(
            "An account with this email already exists.".to_string(),
        ));
    }

    let password_hash = hash_password(&input.password)?;
    let user_id = users::create(pool, &email, &password_hash).await?;
    let token = generate_token(&state.config.jwt_secret, user_id)?;

    mailer::send_system_email(
        &state,
        &email,
        &format!("Bienvenue sur {}", state.config.app_name),
        &format!(
            "Bonjour,\n\nVotre compte {} est pr\u{ea}t. Connectez-vous pour ajouter \
             vos biens et vos locataires.\n",
            state.config.app_name
        ),
    )
    .await;

    tracing::info!(%user_id, "New account created");
    Ok(Json(json!({
        "token": token,
        "user": { "id": user_id, "email": email },
    })))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<Value>> {
    let pool = crate::state::db_pool(&state)?;
    let email = input.email.trim().to_lowercase();

    // Unknown email and wrong password produce the same response.
    let invalid = || AppError::Unauthorized("Invalid email or password.".to_string());
    let user = users::find_by_email(pool, &email).await?.ok_or_else(invalid)?;
    if !verify_password(&input.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = generate_token(&state.config.jwt_secret, user.id)?;
    Ok(Json(json!({
        "token": token,
        "user": { "id": user.id, "email": user.email },
    })))
}

/// Always answers `{"success": true}` so the endpoint cannot be used to
/// probe which emails have an account.
async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordInput>,
) -> AppResult<Json<Value>> {
    let pool = crate::state::db_pool(&state)?;
    let email = input.email.trim().to_lowercase();

    if let Some(user) = users::find_by_email(pool, &email).await? {
        let raw_token = generate_reset_token();
        let expires_at = Utc::now() + Duration::hours(RESET_VALIDITY_HOURS);
        password_resets::create(pool, user.id, &hash_reset_token(&raw_token), expires_at).await?;

        let link = format!(
            "{}/reset-password?token={raw_token}",
            state.config.frontend_base_url()
        );
        mailer::send_system_email(
            &state,
            &email,
            "R\u{e9}initialisation de votre mot de passe",
            &format!(
                "Bonjour,\n\nPour choisir un nouveau mot de passe, ouvrez ce lien \
                 (valable une heure) :\n{link}\n\nSi vous n'\u{ea}tes pas \u{e0} \
                 l'origine de cette demande, ignorez cet email.\n"
            ),
        )
        .await;
    }

    Ok(Json(json!({ "success": true })))
}

async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordInput>,
) -> AppResult<Json<Value>> {
    validate_input(&input)?;
    let pool = crate::state::db_pool(&state)?;

    let invalid = || AppError::BadRequest("Invalid or expired reset link.".to_string());
    let reset = password_resets::find_by_token_hash(pool, &hash_reset_token(&input.token))
        .await?
        .ok_or_else(invalid)?;
    if !reset.is_valid(Utc::now()) {
        return Err(invalid());
    }

    let password_hash = hash_password(&input.password)?;
    users::update_password(pool, reset.user_id, &password_hash).await?;
    password_resets::mark_used(pool, reset.id).await?;

    tracing::info!(user_id = %reset.user_id, "Password reset completed");
    Ok(Json(json!({ "success": true })))
}
