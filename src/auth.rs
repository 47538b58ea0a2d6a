use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repository::users;
use crate::state::AppState;

/// Session tokens are valid for 30 days.
const TOKEN_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
}

pub fn generate_token(secret: &str, user_id: Uuid) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        exp: (now + Duration::days(TOKEN_VALIDITY_DAYS)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|error| AppError::Internal(format!("Could not sign session token: {error}")))
}

pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Resolve the caller's user id from the `Authorization` header.
///
/// Missing, malformed or expired tokens and tokens whose user no longer
/// exists all collapse into the same `Unauthorized` response.
pub async fn require_user_id(state: &AppState, headers: &HeaderMap) -> AppResult<Uuid> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();

    if token.is_empty() {
        return Err(AppError::Unauthorized(
            "Authentication required.".to_string(),
        ));
    }

    let claims = verify_token(&state.config.jwt_secret, token)
        .ok_or_else(|| AppError::Unauthorized("Invalid session token.".to_string()))?;

    let pool = crate::state::db_pool(state)?;
    let user = users::find_by_id(pool, claims.sub).await?;
    match user {
        Some(_) => Ok(claims.sub),
        None => Err(AppError::Unauthorized("Invalid session token.".to_string())),
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| AppError::Internal(format!("Could not hash password: {error}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// High-entropy reset token. Only the SHA-256 hash is ever persisted; the
/// raw value travels once, inside the reset email.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_reset_token(raw_token: &str) -> String {
    hex::encode(Sha256::digest(raw_token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::{
        generate_reset_token, generate_token, hash_password, hash_reset_token, verify_password,
        verify_token,
    };
    use uuid::Uuid;

    #[test]
    fn token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = generate_token("test-secret", user_id).expect("token should sign");
        let claims = verify_token("test-secret", &token).expect("token should verify");
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let token = generate_token("secret-a", Uuid::new_v4()).expect("token should sign");
        assert!(verify_token("secret-b", &token).is_none());
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret-pass").expect("hash should succeed");
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong-pass", &hash));
        assert!(!verify_password("s3cret-pass", "not-a-phc-string"));
    }

    #[test]
    fn reset_tokens_are_unique_and_hash_deterministically() {
        let first = generate_reset_token();
        let second = generate_reset_token();
        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
        assert_eq!(hash_reset_token(&first), hash_reset_token(&first));
        assert_ne!(hash_reset_token(&first), hash_reset_token(&second));
    }
}
