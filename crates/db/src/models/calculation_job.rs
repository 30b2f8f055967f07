//! Outbox rows for the external calculation service.

use archpath_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `calculation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CalculationJob {
    pub id: DbId,
    pub request_id: DbId,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: Timestamp,
    pub last_error: Option<String>,
    pub delivered_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CalculationJob {
    /// `true` once no further delivery attempt is allowed.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
