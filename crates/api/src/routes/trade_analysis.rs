//! Route definitions for the `/trade-analysis` resource.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::{calculation_callback, trade_analysis};
use crate::state::AppState;

/// Routes mounted at `/trade-analysis`.
///
/// ```text
/// GET    /                                    -> list
/// GET    /cart                                -> cart
/// GET    /{id}                                -> get_by_id
/// PUT    /{id}                                -> update (creator, draft)
/// DELETE /{id}                                -> delete (moderator)
/// PUT    /{id}/form                           -> form (creator)
/// PUT    /{id}/moderate                       -> moderate (moderator)
/// GET    /{id}/calculation                    -> calculation_status
/// PUT    /{id}/entries/{artifact_id}/result   -> store_result (X-API-Token)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(trade_analysis::list))
        .route("/cart", get(trade_analysis::cart))
        .route(
            "/{id}",
            get(trade_analysis::get_by_id)
                .put(trade_analysis::update)
                .delete(trade_analysis::delete),
        )
        .route("/{id}/form", put(trade_analysis::form))
        .route("/{id}/moderate", put(trade_analysis::moderate))
        .route("/{id}/calculation", get(trade_analysis::calculation_status))
        .route(
            "/{id}/entries/{artifact_id}/result",
            put(calculation_callback::store_result),
        )
}
