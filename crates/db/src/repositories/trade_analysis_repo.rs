//! Repository for the `trade_analyses` table.
//!
//! Every status transition is a single guarded UPDATE (`WHERE status = ...`),
//! so a caller that lost a race gets `None` back instead of double-applying.
//! Soft-deleted rows are invisible to all reads.

use archpath_core::aggregation::{percentage_by_center, total_quantity};
use archpath_core::calculation::{CalculationEntry, CalculationPayload};
use archpath_core::trade_analysis::RequestStatus;
use archpath_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::models::trade_analysis::{
    CartSummary, TradeAnalysis, TradeAnalysisFilter, TradeAnalysisSummary, UpdateTradeAnalysis,
};
use crate::repositories::{AnalysisRecordRepo, CalculationJobRepo};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, status, creator_id, site_name, formation_date, completion_date, \
                       moderator_id, total_finds_quantity, analysis_result, created_at, updated_at";

/// Same columns qualified with the `t.` alias for joined queries.
const T_COLUMNS: &str = "t.id, t.status, t.creator_id, t.site_name, t.formation_date, \
                         t.completion_date, t.moderator_id, t.total_finds_quantity, \
                         t.analysis_result, t.created_at, t.updated_at";

/// Provides lifecycle operations for trade-analysis requests.
pub struct TradeAnalysisRepo;

impl TradeAnalysisRepo {
    /// Find a non-deleted request by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TradeAnalysis>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM trade_analyses WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, TradeAnalysis>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The creator's current draft, if any. Never creates one.
    pub async fn find_draft(
        pool: &PgPool,
        creator_id: DbId,
    ) -> Result<Option<TradeAnalysis>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM trade_analyses WHERE creator_id = $1 AND status = $2"
        );
        sqlx::query_as::<_, TradeAnalysis>(&query)
            .bind(creator_id)
            .bind(RequestStatus::Draft.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Return the creator's draft, creating an empty one if none exists.
    ///
    /// The insert uses `uq_trade_analyses_draft_per_creator` as its conflict
    /// arbiter, so concurrent callers converge on a single draft. The draft
    /// row stays locked until `conn`'s transaction ends, which holds off a
    /// concurrent [`form`](Self::form) while entries are written.
    ///
    /// Returns `None` if the existing draft was formed while we waited for
    /// its lock.
    pub async fn get_or_create_draft(
        conn: &mut PgConnection,
        creator_id: DbId,
    ) -> Result<Option<TradeAnalysis>, sqlx::Error> {
        let insert = format!(
            "INSERT INTO trade_analyses (status, creator_id, site_name)
             VALUES ($1, $2, '')
             ON CONFLICT (creator_id) WHERE status = 'draft' DO NOTHING
             RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, TradeAnalysis>(&insert)
            .bind(RequestStatus::Draft.as_str())
            .bind(creator_id)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(draft) = created {
            return Ok(Some(draft));
        }

        let select = format!(
            "SELECT {COLUMNS} FROM trade_analyses
             WHERE creator_id = $1 AND status = $2
             FOR UPDATE"
        );
        sqlx::query_as::<_, TradeAnalysis>(&select)
            .bind(creator_id)
            .bind(RequestStatus::Draft.as_str())
            .fetch_optional(&mut *conn)
            .await
    }

    /// Lock a non-deleted request until `conn`'s transaction ends.
    ///
    /// Entry edits take this lock before checking the status, so they are
    /// ordered strictly before or after any concurrent transition.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<TradeAnalysis>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM trade_analyses
             WHERE id = $1 AND deleted_at IS NULL
             FOR UPDATE"
        );
        sqlx::query_as::<_, TradeAnalysis>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Draft id and entry count for the cart badge.
    pub async fn cart_summary(pool: &PgPool, creator_id: DbId) -> Result<CartSummary, sqlx::Error> {
        let row: Option<(DbId, i64)> = sqlx::query_as(
            "SELECT t.id, (SELECT COUNT(*) FROM analysis_artifact_records r WHERE r.request_id = t.id)
             FROM trade_analyses t
             WHERE t.creator_id = $1 AND t.status = $2",
        )
        .bind(creator_id)
        .bind(RequestStatus::Draft.as_str())
        .fetch_optional(pool)
        .await?;

        Ok(match row {
            Some((request_id, entries_count)) => CartSummary {
                request_id: Some(request_id),
                entries_count,
            },
            None => CartSummary {
                request_id: None,
                entries_count: 0,
            },
        })
    }

    /// List submitted requests (drafts and deleted excluded), newest
    /// formation first.
    pub async fn list(
        pool: &PgPool,
        filter: &TradeAnalysisFilter,
    ) -> Result<Vec<TradeAnalysisSummary>, sqlx::Error> {
        let query = format!(
            "SELECT {T_COLUMNS},
                    u.login AS creator_login,
                    m.login AS moderator_login,
                    (SELECT COUNT(*) FROM analysis_artifact_records r
                      WHERE r.request_id = t.id) AS entries_count,
                    (SELECT COUNT(*) FROM analysis_artifact_records r
                      WHERE r.request_id = t.id AND r.calculated_value IS NOT NULL)
                      AS calculated_entries_count
             FROM trade_analyses t
             JOIN users u ON u.id = t.creator_id
             LEFT JOIN users m ON m.id = t.moderator_id
             WHERE t.deleted_at IS NULL
               AND t.status NOT IN ($1, $2)
               AND ($3::TEXT IS NULL OR t.status = $3)
               AND ($4::TIMESTAMPTZ IS NULL OR t.formation_date >= $4)
               AND ($5::TIMESTAMPTZ IS NULL OR t.formation_date < $5)
               AND ($6::BIGINT IS NULL OR t.creator_id = $6)
             ORDER BY t.formation_date DESC NULLS LAST, t.id DESC"
        );
        sqlx::query_as::<_, TradeAnalysisSummary>(&query)
            .bind(RequestStatus::Draft.as_str())
            .bind(RequestStatus::Deleted.as_str())
            .bind(&filter.status)
            .bind(filter.formed_from)
            .bind(filter.formed_before)
            .bind(filter.creator_id)
            .fetch_all(pool)
            .await
    }

    /// Edit a draft's fields. Returns `None` if the request is no longer a draft.
    pub async fn update_draft(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTradeAnalysis,
    ) -> Result<Option<TradeAnalysis>, sqlx::Error> {
        let query = format!(
            "UPDATE trade_analyses SET site_name = COALESCE($3, site_name)
             WHERE id = $1 AND status = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TradeAnalysis>(&query)
            .bind(id)
            .bind(RequestStatus::Draft.as_str())
            .bind(input.site_name.as_deref().map(str::trim))
            .fetch_optional(pool)
            .await
    }

    /// `draft → formed`. The guard re-checks the site name and that at
    /// least one entry exists.
    ///
    /// The row is locked first and the entries are counted in a separate
    /// statement, so an entry edit that committed while we waited for the
    /// lock is visible to the guard.
    pub async fn form(pool: &PgPool, id: DbId) -> Result<Option<TradeAnalysis>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<DbId> = sqlx::query_scalar(
            "SELECT id FROM trade_analyses
             WHERE id = $1 AND status = $2
             FOR UPDATE",
        )
        .bind(id)
        .bind(RequestStatus::Draft.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Ok(None);
        }

        let query = format!(
            "UPDATE trade_analyses SET status = $3, formation_date = NOW()
             WHERE id = $1 AND status = $2
               AND btrim(site_name) <> ''
               AND EXISTS (SELECT 1 FROM analysis_artifact_records r WHERE r.request_id = $1)
             RETURNING {COLUMNS}"
        );
        let formed = sqlx::query_as::<_, TradeAnalysis>(&query)
            .bind(id)
            .bind(RequestStatus::Draft.as_str())
            .bind(RequestStatus::Formed.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(formed)
    }

    /// `formed → rejected`.
    pub async fn reject(
        pool: &PgPool,
        id: DbId,
        moderator_id: DbId,
    ) -> Result<Option<TradeAnalysis>, sqlx::Error> {
        let query = format!(
            "UPDATE trade_analyses
             SET status = $3, completion_date = NOW(), moderator_id = $4
             WHERE id = $1 AND status = $2 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TradeAnalysis>(&query)
            .bind(id)
            .bind(RequestStatus::Formed.as_str())
            .bind(RequestStatus::Rejected.as_str())
            .bind(moderator_id)
            .fetch_optional(pool)
            .await
    }

    /// `formed → completed`, in one transaction:
    ///
    /// 1. lock the formed row,
    /// 2. aggregate its entries by production center,
    /// 3. store the result and total quantity,
    /// 4. enqueue the calculation job.
    ///
    /// Returns `None` (and changes nothing) if the request is not `formed`.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        moderator_id: DbId,
        public_base_url: &str,
        max_attempts: i32,
    ) -> Result<Option<TradeAnalysis>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<DbId> = sqlx::query_scalar(
            "SELECT id FROM trade_analyses
             WHERE id = $1 AND status = $2 AND deleted_at IS NULL
             FOR UPDATE",
        )
        .bind(id)
        .bind(RequestStatus::Formed.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Ok(None);
        }

        let centers = AnalysisRecordRepo::centers_for_request(&mut *tx, id).await?;
        let pairs = || centers.iter().map(|c| (c.production_center.as_str(), c.quantity));
        let result = percentage_by_center(pairs());
        let total = total_quantity(pairs());

        let query = format!(
            "UPDATE trade_analyses
             SET status = $2, completion_date = NOW(), moderator_id = $3,
                 analysis_result = $4, total_finds_quantity = $5
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let completed = sqlx::query_as::<_, TradeAnalysis>(&query)
            .bind(id)
            .bind(RequestStatus::Completed.as_str())
            .bind(moderator_id)
            .bind(Json(&result))
            .bind(total)
            .fetch_one(&mut *tx)
            .await?;

        let payload = CalculationPayload::new(
            public_base_url,
            id,
            centers
                .iter()
                .map(|c| CalculationEntry {
                    artifact_id: c.artifact_id,
                    production_center: c.production_center.clone(),
                    quantity: c.quantity,
                })
                .collect(),
        );
        CalculationJobRepo::enqueue(&mut *tx, id, &payload, max_attempts).await?;

        tx.commit().await?;
        Ok(Some(completed))
    }

    /// Soft-delete a request that has been formed at some point.
    ///
    /// Returns `None` if the request is missing, already deleted, or was
    /// never formed.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<Option<TradeAnalysis>, sqlx::Error> {
        let query = format!(
            "UPDATE trade_analyses SET status = $2, deleted_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL AND formation_date IS NOT NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TradeAnalysis>(&query)
            .bind(id)
            .bind(RequestStatus::Deleted.as_str())
            .fetch_optional(pool)
            .await
    }
}
