use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::auth::require_user_id;
use crate::error::AppResult;
use crate::schemas::AccountingExportQuery;
use crate::services::export;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/exports/accounting", get(accounting))
}

async fn accounting(
    State(state): State<AppState>,
    Query(query): Query<AccountingExportQuery>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user_id(&state, &headers).await?;
    let (csv, filename) = export::run_export(&state, user_id, &query).await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    ))
}
