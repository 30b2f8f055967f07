//! Route definitions for the `/analysis-artifact-records` resource.

use axum::routing::put;
use axum::Router;

use crate::handlers::analysis_records;
use crate::state::AppState;

/// Routes mounted at `/analysis-artifact-records`.
///
/// ```text
/// PUT    /{request_id}/{artifact_id}  -> update
/// DELETE /{request_id}/{artifact_id}  -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{request_id}/{artifact_id}",
        put(analysis_records::update).delete(analysis_records::delete),
    )
}
