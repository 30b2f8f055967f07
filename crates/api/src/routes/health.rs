//! Liveness endpoint for ArchPath, mounted at the root next to `/api` and `/media`.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Body of `GET /health`.
///
/// `status` is `"ok"` when Postgres answers and `"degraded"` otherwise; the
/// endpoint itself always returns 200 so load balancers can tell a slow
/// database from a dead process.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `archpath-api` crate version.
    pub version: &'static str,
    pub db_healthy: bool,
    /// Image storage backend in use (`local` or `s3`).
    pub storage: &'static str,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = archpath_db::health_check(&state.pool).await.is_ok();
    if !db_healthy {
        tracing::warn!("Health check: database unreachable");
    }

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        storage: state.storage.backend_name(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
