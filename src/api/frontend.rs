//! Built frontend (single-page app)
//!
//! `/assets` is served from disk; every other GET that is not an API route
//! gets `index.html` so client-side routing works.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::Html,
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::debug;

const RESERVED_PREFIXES: [&str; 5] = ["api/", "chatkit", "docs", "openapi", "redoc"];

/// Mount `/assets` when the build has produced it
pub fn mount_assets(router: Router<Arc<AppState>>, state: &AppState) -> Router<Arc<AppState>> {
    let assets_dir = state.config.server.static_dir.join("assets");
    if assets_dir.is_dir() {
        debug!(dir = %assets_dir.display(), "Serving frontend assets");
        router.nest_service("/assets", ServeDir::new(assets_dir))
    } else {
        router
    }
}

/// GET /
pub async fn spa_root(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    index(&state).await
}

/// GET /*path
pub async fn spa_fallback(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Html<String>, AppError> {
    if RESERVED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return Err(AppError::NotFound("Not found".to_string()));
    }
    index(&state).await
}

async fn index(state: &AppState) -> Result<Html<String>, AppError> {
    let index_file = state.config.server.static_dir.join("index.html");
    match tokio::fs::read_to_string(&index_file).await {
        Ok(html) => Ok(Html(html)),
        Err(_) => Err(AppError::NotFound("Frontend not built".to_string())),
    }
}
