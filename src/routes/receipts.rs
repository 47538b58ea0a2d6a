use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::auth::require_user_id;
use crate::error::AppResult;
use crate::schemas::{validate_input, ReceiptInput, ReceiptRangeInput};
use crate::services::receipts::{self, RangeSendResponse, SingleSendResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/receipts/generate", post(generate))
        .route("/receipts/send", post(send))
        .route("/receipts/send-range", post(send_range))
}

async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ReceiptInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user_id(&state, &headers).await?;
    validate_input(&input)?;

    let (bytes, filename) = receipts::generate_receipt(&state, user_id, &input).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ReceiptInput>,
) -> AppResult<Json<SingleSendResponse>> {
    let user_id = require_user_id(&state, &headers).await?;
    validate_input(&input)?;
    Ok(Json(receipts::send_receipt(&state, user_id, &input).await?))
}

async fn send_range(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ReceiptRangeInput>,
) -> AppResult<Json<RangeSendResponse>> {
    let user_id = require_user_id(&state, &headers).await?;
    Ok(Json(
        receipts::send_receipt_range(&state, user_id, &input).await?,
    ))
}
