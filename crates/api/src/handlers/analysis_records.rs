//! Handlers for `/analysis-artifact-records/{request_id}/{artifact_id}`.
//!
//! Entries can be edited by the request's creator while it is a draft, or
//! by a moderator at any point before the request is deleted. Each edit
//! runs in a transaction holding the request's row lock, so it cannot
//! interleave with a concurrent `form`.

use archpath_core::error::CoreError;
use archpath_core::roles::is_moderator;
use archpath_core::trade_analysis::{ensure_draft_editable, validate_quantity};
use archpath_core::types::DbId;
use archpath_db::models::analysis_record::{AnalysisRecord, UpdateAnalysisRecord};
use archpath_db::repositories::{AnalysisRecordRepo, TradeAnalysisRepo};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::PgConnection;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// PUT /api/analysis-artifact-records/{request_id}/{artifact_id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((request_id, artifact_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateAnalysisRecord>,
) -> AppResult<Json<DataResponse<AnalysisRecord>>> {
    if let Some(quantity) = input.quantity {
        validate_quantity(quantity)?;
    }

    let mut tx = state.pool.begin().await?;
    ensure_can_edit_entries(&mut *tx, &auth, request_id).await?;

    let record = AnalysisRecordRepo::update(&mut *tx, request_id, artifact_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::RecordNotFound {
            request_id,
            artifact_id,
        }))?;
    tx.commit().await?;

    tracing::info!(request_id, artifact_id, user_id = auth.user_id, "Analysis entry updated");
    Ok(Json(DataResponse { data: record }))
}

/// DELETE /api/analysis-artifact-records/{request_id}/{artifact_id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((request_id, artifact_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    let mut tx = state.pool.begin().await?;
    ensure_can_edit_entries(&mut *tx, &auth, request_id).await?;

    if !AnalysisRecordRepo::delete(&mut *tx, request_id, artifact_id).await? {
        return Err(AppError::Core(CoreError::RecordNotFound {
            request_id,
            artifact_id,
        }));
    }
    tx.commit().await?;

    tracing::info!(request_id, artifact_id, user_id = auth.user_id, "Analysis entry removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Lock the request and check that `auth` may change its entries.
async fn ensure_can_edit_entries(
    conn: &mut PgConnection,
    auth: &AuthUser,
    request_id: DbId,
) -> AppResult<()> {
    let request = TradeAnalysisRepo::lock_by_id(conn, request_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "TradeAnalysis",
            id: request_id,
        }))?;

    if is_moderator(&auth.role) {
        return Ok(());
    }
    ensure_draft_editable(&request.status, request.creator_id, auth.user_id)?;
    Ok(())
}
