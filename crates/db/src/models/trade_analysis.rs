//! Trade-analysis request model and DTOs.

use archpath_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::analysis_record::AnalysisRecordDetail;

/// A row from the `trade_analyses` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TradeAnalysis {
    pub id: DbId,
    pub status: String,
    pub creator_id: DbId,
    pub site_name: String,
    pub formation_date: Option<Timestamp>,
    pub completion_date: Option<Timestamp>,
    pub moderator_id: Option<DbId>,
    pub total_finds_quantity: i64,
    /// Production center -> percentage, set on completion.
    pub analysis_result: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// List row: the request plus participant logins and entry counters.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TradeAnalysisSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub request: TradeAnalysis,
    pub creator_login: String,
    pub moderator_login: Option<String>,
    pub entries_count: i64,
    pub calculated_entries_count: i64,
}

/// Detail view: the request with its joined entries.
#[derive(Debug, Clone, Serialize)]
pub struct TradeAnalysisDetail {
    #[serde(flatten)]
    pub request: TradeAnalysis,
    pub entries: Vec<AnalysisRecordDetail>,
    pub calculated_entries_count: i64,
}

impl TradeAnalysisDetail {
    pub fn new(request: TradeAnalysis, entries: Vec<AnalysisRecordDetail>) -> Self {
        let calculated_entries_count = entries
            .iter()
            .filter(|e| e.record.calculated_value.is_some())
            .count() as i64;
        Self {
            request,
            entries,
            calculated_entries_count,
        }
    }
}

/// Summary of the caller's current draft.
#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub request_id: Option<DbId>,
    pub entries_count: i64,
}

/// DTO for editing a draft.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTradeAnalysis {
    pub site_name: Option<String>,
}

/// Raw query-string filters for the request list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradeAnalysisListQuery {
    pub status: Option<String>,
    /// `YYYY-MM-DD`, inclusive, compared against the formation date.
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`, inclusive, compared against the formation date.
    pub end_date: Option<String>,
}

/// Parsed list filters handed to the repository.
#[derive(Debug, Clone, Default)]
pub struct TradeAnalysisFilter {
    pub status: Option<String>,
    pub formed_from: Option<Timestamp>,
    pub formed_before: Option<Timestamp>,
    /// Restrict to one creator; `None` lists every creator's requests.
    pub creator_id: Option<DbId>,
}
