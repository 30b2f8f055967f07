//! Catalog artifact model and DTOs.

use archpath_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `artifacts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Artifact {
    pub id: DbId,
    pub name: String,
    pub description: String,
    pub production_center: String,
    pub example_location: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating an artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateArtifact {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `"Unknown"` when omitted.
    pub production_center: Option<String>,
    pub example_location: Option<String>,
    pub is_active: Option<bool>,
}

/// DTO for updating an artifact. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArtifact {
    pub name: Option<String>,
    pub description: Option<String>,
    pub production_center: Option<String>,
    pub example_location: Option<String>,
    pub is_active: Option<bool>,
}

/// Catalog listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactListQuery {
    pub is_active: Option<bool>,
    pub production_center: Option<String>,
    /// Case-insensitive substring match on the name.
    pub search: Option<String>,
}
