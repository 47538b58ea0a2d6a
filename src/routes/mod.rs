use axum::{routing::get, Router};

use crate::state::AppState;

pub mod auth;
pub mod billing;
pub mod config;
pub mod exports;
pub mod health;
pub mod oauth;
pub mod properties;
pub mod receipts;
pub mod tenants;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(auth::router())
        .merge(oauth::router())
        .merge(tenants::router())
        .merge(properties::router())
        .merge(config::router())
        .merge(receipts::router())
        .merge(exports::router())
        .merge(billing::router())
}
