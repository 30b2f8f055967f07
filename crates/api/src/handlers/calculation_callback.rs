//! Callback endpoint for the external calculation service.
//!
//! The calculator authenticates with a shared secret in the `X-API-Token`
//! header instead of a user token.

use archpath_core::calculation::CalculationCallback;
use archpath_core::error::CoreError;
use archpath_core::types::DbId;
use archpath_db::repositories::AnalysisRecordRepo;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Header carrying the shared callback secret.
pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Acknowledgement sent back to the calculator.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    pub status: &'static str,
    pub message: &'static str,
}

/// PUT /api/trade-analysis/{request_id}/entries/{artifact_id}/result
///
/// The token is checked before the body is parsed, so an unauthenticated
/// caller always gets 401.
pub async fn store_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((request_id, artifact_id)): Path<(DbId, DbId)>,
    body: Bytes,
) -> AppResult<Json<CallbackAck>> {
    let presented = headers
        .get(API_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !tokens_match(presented, &state.config.calculation.callback_token) {
        tracing::warn!(request_id, artifact_id, "Calculation callback with invalid token");
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid API token".into(),
        )));
    }

    let callback: CalculationCallback = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?;
    callback.ensure_matches_path(request_id, artifact_id)?;

    AnalysisRecordRepo::set_calculated_value(
        &state.pool,
        request_id,
        artifact_id,
        callback.calculated_value,
    )
    .await?
    .ok_or(AppError::Core(CoreError::RecordNotFound {
        request_id,
        artifact_id,
    }))?;

    tracing::info!(
        request_id,
        artifact_id,
        calculated_value = callback.calculated_value,
        "Calculated value stored"
    );

    Ok(Json(CallbackAck {
        status: "success",
        message: "Calculated value updated",
    }))
}

/// Compare two tokens without exiting early on the first differing byte.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(tokens_match("async-calc-token-8bytes", "async-calc-token-8bytes"));
        assert!(!tokens_match("async-calc-token-8byteX", "async-calc-token-8bytes"));
        assert!(!tokens_match("", "async-calc-token-8bytes"));
        assert!(!tokens_match("async-calc-token-8bytes-longer", "async-calc-token-8bytes"));
    }
}
