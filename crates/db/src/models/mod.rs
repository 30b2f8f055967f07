//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - `Deserialize` create / update DTOs where the entity is writable

pub mod analysis_record;
pub mod artifact;
pub mod calculation_job;
pub mod trade_analysis;
pub mod user;
