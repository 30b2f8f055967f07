//! Bearer-token authentication primitives.
//!
//! - [`jwt`] -- HS256 access tokens carrying user id, role and `jti`.
//! - [`password`] -- Argon2id password hashing and strength checks.

pub mod jwt;
pub mod password;
