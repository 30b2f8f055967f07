//! Request/artifact join entries.

use archpath_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from `analysis_artifact_records`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnalysisRecord {
    pub request_id: DbId,
    pub artifact_id: DbId,
    pub quantity: i32,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub is_main_entry: bool,
    pub comment: String,
    pub calculated_value: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An entry joined with the artifact fields shown in the request detail.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnalysisRecordDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: AnalysisRecord,
    pub artifact_name: String,
    pub production_center: String,
    pub image_url: Option<String>,
}

/// Result of the cart upsert.
#[derive(Debug, Clone, FromRow)]
pub struct UpsertedRecord {
    #[sqlx(flatten)]
    pub record: AnalysisRecord,
    /// `true` when the row was inserted, `false` when an existing one was replaced.
    pub inserted: bool,
}

/// Minimal projection used for aggregation and the calculation payload.
#[derive(Debug, Clone, FromRow)]
pub struct RecordCenter {
    pub artifact_id: DbId,
    pub production_center: String,
    pub quantity: i32,
}

/// DTO for editing an entry. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAnalysisRecord {
    pub quantity: Option<i32>,
    #[serde(rename = "order")]
    pub sort_order: Option<i32>,
    pub is_main_entry: Option<bool>,
    pub comment: Option<String>,
}
