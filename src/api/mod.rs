//! API module
//!
//! HTTP handlers and the route table

pub mod chatkit;
pub mod frontend;
pub mod streaming;
pub mod workbook;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Health check body
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    message: String,
}

/// GET /api/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "Backend is healthy".to_string(),
    })
}

/// Build the application routes (middleware is added by the binary)
pub fn router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/chatkit", post(chatkit::chatkit))
        .route("/api/rent-workbook", post(workbook::export_rent_workbook))
        .route("/api/health", get(health_check));

    frontend::mount_assets(router, &state)
        .route("/", get(frontend::spa_root))
        .route("/*path", get(frontend::spa_fallback))
        .with_state(state)
}
