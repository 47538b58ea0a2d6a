use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::error::{AppError, AppResult};
use crate::models::Property;
use crate::repository::{properties, tenants};
use crate::schemas::{validate_input, CreatePropertyInput, PropertyPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/properties", get(list_properties).post(create_property))
        .route(
            "/properties/{property_id}",
            put(update_property).delete(delete_property),
        )
}

async fn list_properties(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Property>>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = crate::state::db_pool(&state)?;
    Ok(Json(properties::list_for_user(pool, user_id).await?))
}

async fn create_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreatePropertyInput>,
) -> AppResult<(StatusCode, Json<Property>)> {
    let user_id = require_user_id(&state, &headers).await?;
    validate_input(&input)?;
    let pool = crate::state::db_pool(&state)?;

    let property = properties::create(pool, user_id, input.name.trim(), input.address.trim()).await?;
    Ok((StatusCode::CREATED, Json(property)))
}

async fn update_property(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
    headers: HeaderMap,
    Json(input): Json<CreatePropertyInput>,
) -> AppResult<Json<Property>> {
    let user_id = require_user_id(&state, &headers).await?;
    validate_input(&input)?;
    let pool = crate::state::db_pool(&state)?;

    properties::update(pool, user_id, path.property_id, input.name.trim(), input.address.trim())
        .await?;
    properties::find_by_id(pool, user_id, path.property_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Property not found.".to_string()))
}

/// Deletion is blocked while any tenant still references the property.
async fn delete_property(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = crate::state::db_pool(&state)?;

    let attached = tenants::count_for_property(pool, user_id, path.property_id).await?;
    if attached > 0 {
        return Err(AppError::Conflict(format!(
            "This property still has {attached} tenant(s) attached."
        )));
    }

    let rows = properties::delete(pool, user_id, path.property_id).await?;
    if rows == 0 {
        return Err(AppError::NotFound("Property not found.".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}
