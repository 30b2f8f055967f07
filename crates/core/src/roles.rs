//! Well-known role name constants.
//!
//! These must match the `ck_users_role` check constraint in
//! `20260301000001_create_users_table.sql`.

pub const ROLE_USER: &str = "user";
pub const ROLE_MODERATOR: &str = "moderator";

/// Returns `true` if `role` grants moderator privileges.
pub fn is_moderator(role: &str) -> bool {
    role == ROLE_MODERATOR
}
