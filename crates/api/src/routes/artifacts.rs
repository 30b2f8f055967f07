//! Route definitions for the `/artifacts` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::artifacts;
use crate::state::AppState;

/// Largest accepted image upload.
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Routes mounted at `/artifacts`.
///
/// ```text
/// GET    /                       -> list
/// POST   /                       -> create (moderator)
/// GET    /{id}                   -> get_by_id
/// PUT    /{id}                   -> update (moderator)
/// DELETE /{id}                   -> delete (moderator)
/// POST   /{id}/image             -> upload_image (moderator, multipart)
/// POST   /{id}/add-to-analysis   -> add_to_analysis (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(artifacts::list).post(artifacts::create))
        .route(
            "/{id}",
            get(artifacts::get_by_id)
                .put(artifacts::update)
                .delete(artifacts::delete),
        )
        .route(
            "/{id}/image",
            post(artifacts::upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/{id}/add-to-analysis", post(artifacts::add_to_analysis))
}
