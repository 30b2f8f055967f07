pub mod analysis_records;
pub mod artifacts;
pub mod health;
pub mod trade_analysis;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /users/register                                   register (public)
/// /users/login                                      login (public)
/// /users/me                                         get, update (auth)
/// /users/logout                                     logout (auth)
///
/// /artifacts                                        list (public), create (moderator)
/// /artifacts/{id}                                   get (public), update, delete (moderator)
/// /artifacts/{id}/image                             upload image (moderator)
/// /artifacts/{id}/add-to-analysis                   add to draft (auth)
///
/// /trade-analysis                                   list (auth)
/// /trade-analysis/cart                              draft summary (auth)
/// /trade-analysis/{id}                              get, update (auth), delete (moderator)
/// /trade-analysis/{id}/form                         form (creator)
/// /trade-analysis/{id}/moderate                     complete / reject (moderator)
/// /trade-analysis/{id}/calculation                  calculation job status (auth)
/// /trade-analysis/{id}/entries/{artifact_id}/result calculator callback (X-API-Token)
///
/// /analysis-artifact-records/{request_id}/{artifact_id}  update, delete (auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/users", users::router())
        .nest("/artifacts", artifacts::router())
        .nest("/trade-analysis", trade_analysis::router())
        .nest("/analysis-artifact-records", analysis_records::router())
}
