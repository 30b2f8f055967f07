//! Domain types and pure rules for the ArchPath catalog.
//!
//! Nothing in this crate touches the database or the network. The request
//! lifecycle checks and the production-center aggregation live here so both
//! the repository layer and the HTTP handlers can share them.

pub mod aggregation;
pub mod artifact;
pub mod calculation;
pub mod error;
pub mod roles;
pub mod trade_analysis;
pub mod types;
