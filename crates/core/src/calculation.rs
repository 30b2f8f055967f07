//! Payloads and retry policy for the external calculation service.
//!
//! Completing a request enqueues one [`CalculationPayload`]; the dispatcher
//! delivers it with at-least-once semantics, and the calculator answers
//! per entry with a [`CalculationCallback`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Job statuses, matching the `ck_calculation_jobs_status` constraint.
pub const JOB_PENDING: &str = "pending";
pub const JOB_IN_FLIGHT: &str = "in_flight";
pub const JOB_DELIVERED: &str = "delivered";
pub const JOB_FAILED: &str = "failed";

/// Upper bound on the delay between two delivery attempts.
pub const MAX_BACKOFF_SECS: u64 = 300;

/// One entry handed to the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationEntry {
    pub artifact_id: DbId,
    pub production_center: String,
    pub quantity: i32,
}

/// Body POSTed to the calculation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationPayload {
    pub request_id: DbId,
    pub entries: Vec<CalculationEntry>,
    /// URL template with an `{artifact_id}` placeholder; the calculator
    /// substitutes each entry's id before calling back.
    pub callback_url: String,
}

impl CalculationPayload {
    pub fn new(public_base_url: &str, request_id: DbId, entries: Vec<CalculationEntry>) -> Self {
        Self {
            request_id,
            entries,
            callback_url: callback_url_template(public_base_url, request_id),
        }
    }
}

/// Body the calculator sends back for a single entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationCallback {
    pub request_id: DbId,
    pub artifact_id: DbId,
    pub calculated_value: f64,
}

impl CalculationCallback {
    /// The ids in the body must name the same record as the URL path.
    pub fn ensure_matches_path(&self, request_id: DbId, artifact_id: DbId) -> Result<(), CoreError> {
        if self.request_id != request_id || self.artifact_id != artifact_id {
            return Err(CoreError::Validation(format!(
                "Body ids ({}, {}) do not match path ids ({request_id}, {artifact_id})",
                self.request_id, self.artifact_id
            )));
        }
        if !self.calculated_value.is_finite() {
            return Err(CoreError::Validation(
                "calculated_value must be a finite number".into(),
            ));
        }
        Ok(())
    }
}

/// `{base}/api/trade-analysis/{request_id}/entries/{artifact_id}/result`
/// with the request id filled in and `{artifact_id}` left literal.
pub fn callback_url_template(public_base_url: &str, request_id: DbId) -> String {
    format!(
        "{}/api/trade-analysis/{request_id}/entries/{{artifact_id}}/result",
        public_base_url.trim_end_matches('/')
    )
}

/// Delay before the next attempt after `attempts` failed ones:
/// `2^attempts` seconds, capped at [`MAX_BACKOFF_SECS`].
pub fn retry_backoff(attempts: i32) -> Duration {
    let exp = attempts.clamp(0, 16) as u32;
    Duration::from_secs(2u64.saturating_pow(exp).min(MAX_BACKOFF_SECS))
}
