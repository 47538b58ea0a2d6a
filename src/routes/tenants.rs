use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::error::{AppError, AppResult};
use crate::models::Tenant;
use crate::repository::{properties, tenants};
use crate::schemas::{validate_input, TenantInput, TenantPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route("/tenants/{tenant_id}", put(update_tenant).delete(delete_tenant))
}

async fn list_tenants(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Tenant>>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = crate::state::db_pool(&state)?;
    Ok(Json(tenants::list_for_user(pool, user_id).await?))
}

async fn create_tenant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut input): Json<TenantInput>,
) -> AppResult<(StatusCode, Json<Tenant>)> {
    let user_id = require_user_id(&state, &headers).await?;
    validate_input(&input)?;
    let pool = crate::state::db_pool(&state)?;

    // Without an explicit property the tenant lands on the user's first one.
    if input.property_id.is_none() {
        input.property_id = properties::first_for_user(pool, user_id)
            .await?
            .map(|property| property.id);
    } else if let Some(property_id) = input.property_id {
        properties::find_by_id(pool, user_id, property_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Property not found.".to_string()))?;
    }

    let tenant = tenants::create(pool, user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

async fn update_tenant(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
    Json(input): Json<TenantInput>,
) -> AppResult<Json<Tenant>> {
    let user_id = require_user_id(&state, &headers).await?;
    validate_input(&input)?;
    let pool = crate::state::db_pool(&state)?;

    // A scoped update on someone else's row affects zero rows; the
    // re-read turns that silent miss into a 404.
    tenants::update(pool, user_id, path.tenant_id, &input).await?;
    tenants::find_by_id(pool, user_id, path.tenant_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

async fn delete_tenant(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = crate::state::db_pool(&state)?;

    let rows = tenants::delete(pool, user_id, path.tenant_id).await?;
    if rows == 0 {
        return Err(AppError::NotFound("Tenant not found.".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}
