use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde_json::Value;

use crate::auth::require_user_id;
use crate::error::AppResult;
use crate::schemas::CheckoutSessionInput;
use crate::services::billing;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/billing/checkout-session", post(checkout_session))
}

async fn checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CheckoutSessionInput>,
) -> AppResult<Json<Value>> {
    require_user_id(&state, &headers).await?;
    let session = billing::create_checkout_session(&state, &input).await?;
    Ok(Json(session))
}
