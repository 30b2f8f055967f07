//! Handlers for the `/trade-analysis` resource.
//!
//! Each state transition fetches the request, runs the matching pure check
//! from [`archpath_core::trade_analysis`], then issues one guarded UPDATE.
//! If the guarded UPDATE matches nothing, another transition got there
//! first and the caller gets 409.

use archpath_core::error::CoreError;
use archpath_core::roles::is_moderator;
use archpath_core::trade_analysis::{
    ensure_can_delete, ensure_can_form, ensure_can_moderate, ensure_can_view,
    ensure_draft_editable, ModerationAction, RequestStatus,
};
use archpath_core::types::{DbId, Timestamp};
use archpath_db::models::calculation_job::CalculationJob;
use archpath_db::models::trade_analysis::{
    CartSummary, TradeAnalysis, TradeAnalysisDetail, TradeAnalysisFilter, TradeAnalysisListQuery,
    TradeAnalysisSummary, UpdateTradeAnalysis,
};
use archpath_db::repositories::{AnalysisRecordRepo, CalculationJobRepo, TradeAnalysisRepo};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireModerator;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /trade-analysis/{id}/moderate`.
#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub action: String,
}

/// Response for a moderation decision.
#[derive(Debug, Serialize)]
pub struct ModerateResponse {
    #[serde(flatten)]
    pub request: TradeAnalysisDetail,
    pub action: ModerationAction,
}

/// GET /api/trade-analysis/cart
///
/// Never creates a draft.
pub async fn cart(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<CartSummary>>> {
    let summary = TradeAnalysisRepo::cart_summary(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/trade-analysis
///
/// Drafts and deleted requests are never listed. Non-moderators only see
/// their own requests.
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<TradeAnalysisListQuery>,
) -> AppResult<Json<DataResponse<Vec<TradeAnalysisSummary>>>> {
    let creator_scope = (!is_moderator(&auth.role)).then_some(auth.user_id);
    let filter = build_filter(&params, creator_scope)?;
    let requests = TradeAnalysisRepo::list(&state.pool, &filter).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/trade-analysis/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<TradeAnalysisDetail>>> {
    let request = fetch_request(&state.pool, id).await?;
    ensure_can_view(request.creator_id, auth.user_id, &auth.role)?;

    let detail = load_detail(&state.pool, request).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// PUT /api/trade-analysis/{id}
///
/// Edit a draft's site name. Creator only.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateTradeAnalysis>,
) -> AppResult<Json<DataResponse<TradeAnalysisDetail>>> {
    let request = fetch_request(&state.pool, id).await?;
    ensure_draft_editable(&request.status, request.creator_id, auth.user_id)?;

    let updated = TradeAnalysisRepo::update_draft(&state.pool, id, &input)
        .await?
        .ok_or_else(|| lost_race(id, RequestStatus::Draft))?;

    let detail = load_detail(&state.pool, updated).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// PUT /api/trade-analysis/{id}/form
///
/// Submit a draft. Requires a site name and at least one entry.
pub async fn form(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<TradeAnalysisDetail>>> {
    let request = fetch_request(&state.pool, id).await?;
    let entry_count = AnalysisRecordRepo::count_for_request(&state.pool, id).await?;
    ensure_can_form(
        &request.status,
        request.creator_id,
        auth.user_id,
        &request.site_name,
        entry_count,
    )?;

    let formed = TradeAnalysisRepo::form(&state.pool, id)
        .await?
        .ok_or_else(|| lost_race(id, RequestStatus::Draft))?;

    tracing::info!(
        request_id = id,
        user_id = auth.user_id,
        entry_count,
        "Trade analysis formed"
    );

    let detail = load_detail(&state.pool, formed).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// PUT /api/trade-analysis/{id}/moderate
///
/// Complete or reject a formed request. Completing stores the production
/// center aggregation and queues the calculation job in one transaction.
pub async fn moderate(
    State(state): State<AppState>,
    RequireModerator(user): RequireModerator,
    Path(id): Path<DbId>,
    Json(input): Json<ModerateRequest>,
) -> AppResult<Json<DataResponse<ModerateResponse>>> {
    let action = ModerationAction::parse(input.action.trim())?;

    let request = fetch_request(&state.pool, id).await?;
    ensure_can_moderate(&request.status, &user.role)?;

    let moderated = match action {
        ModerationAction::Completed => {
            TradeAnalysisRepo::complete(
                &state.pool,
                id,
                user.user_id,
                &state.config.public_base_url,
                state.config.calculation.max_attempts,
            )
            .await?
        }
        ModerationAction::Rejected => {
            TradeAnalysisRepo::reject(&state.pool, id, user.user_id).await?
        }
    }
    .ok_or_else(|| lost_race(id, RequestStatus::Formed))?;

    tracing::info!(
        request_id = id,
        moderator_id = user.user_id,
        status = %action.target_status(),
        total_finds_quantity = moderated.total_finds_quantity,
        "Trade analysis moderated"
    );

    let detail = load_detail(&state.pool, moderated).await?;
    Ok(Json(DataResponse {
        data: ModerateResponse {
            request: detail,
            action,
        },
    }))
}

/// DELETE /api/trade-analysis/{id}
///
/// Soft-delete a request that has been formed at some point.
pub async fn delete(
    State(state): State<AppState>,
    RequireModerator(user): RequireModerator,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let request = fetch_request(&state.pool, id).await?;
    ensure_can_delete(request.formation_date)?;

    TradeAnalysisRepo::soft_delete(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(format!(
                "Trade analysis {id} was modified concurrently"
            )))
        })?;

    tracing::info!(request_id = id, moderator_id = user.user_id, "Trade analysis deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/trade-analysis/{id}/calculation
///
/// Delivery status of the request's calculation job.
pub async fn calculation_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<CalculationJob>>> {
    let request = fetch_request(&state.pool, id).await?;
    ensure_can_view(request.creator_id, auth.user_id, &auth.role)?;

    let job = CalculationJobRepo::find_by_request(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "CalculationJob",
            id,
        }))?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn fetch_request(pool: &PgPool, id: DbId) -> AppResult<TradeAnalysis> {
    TradeAnalysisRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "TradeAnalysis",
            id,
        }))
}

async fn load_detail(pool: &PgPool, request: TradeAnalysis) -> AppResult<TradeAnalysisDetail> {
    let entries = AnalysisRecordRepo::list_for_request(pool, request.id).await?;
    Ok(TradeAnalysisDetail::new(request, entries))
}

fn lost_race(id: DbId, expected: RequestStatus) -> AppError {
    AppError::Core(CoreError::Conflict(format!(
        "Trade analysis {id} is no longer {expected}"
    )))
}

/// Turn raw query parameters into repository filters.
///
/// Dates are whole UTC days, both ends inclusive.
fn build_filter(
    params: &TradeAnalysisListQuery,
    creator_scope: Option<DbId>,
) -> AppResult<TradeAnalysisFilter> {
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<RequestStatus>())
        .transpose()?
        .map(|s| s.as_str().to_string());

    let start = params
        .start_date
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| parse_day(s, "start_date"))
        .transpose()?;
    let end = params
        .end_date
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| parse_day(s, "end_date"))
        .transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(AppError::Core(CoreError::Validation(
                "start_date must not be after end_date".into(),
            )));
        }
    }

    let formed_before = end
        .map(|day| {
            day.checked_add_days(Days::new(1)).ok_or_else(|| {
                AppError::Core(CoreError::Validation("end_date is out of range".into()))
            })
        })
        .transpose()?;

    Ok(TradeAnalysisFilter {
        status,
        formed_from: start.map(start_of_day),
        formed_before: formed_before.map(start_of_day),
        creator_id: creator_scope,
    })
}

fn parse_day(value: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::Core(CoreError::Validation(format!(
            "{field} must be a date in YYYY-MM-DD format"
        )))
    })
}

fn start_of_day(day: NaiveDate) -> Timestamp {
    day.and_time(NaiveTime::MIN).and_utc()
}
