//! User entity model and DTOs.

use archpath_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub login: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub login: String,
    pub role: String,
    pub created_at: Timestamp,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            login: user.login.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
        }
    }
}

/// Insert DTO. The password must already be hashed.
#[derive(Debug)]
pub struct CreateUser {
    pub login: String,
    pub password_hash: String,
    pub role: String,
}

/// Patch DTO for the profile endpoint. `None` fields are left unchanged.
#[derive(Debug, Default)]
pub struct UpdateUser {
    pub login: Option<String>,
    pub password_hash: Option<String>,
}
