//! Role-based access control (RBAC) extractors.
//!
//! Plain authentication is [`AuthUser`] itself; the extractors here wrap it
//! and reject requests whose role does not meet the requirement.

use archpath_core::error::CoreError;
use archpath_core::roles::is_moderator;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `moderator` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn moderators_only(RequireModerator(user): RequireModerator) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireModerator(pub AuthUser);

impl FromRequestParts<AppState> for RequireModerator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !is_moderator(&user.role) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Moderator role required".into(),
            )));
        }
        Ok(RequireModerator(user))
    }
}

