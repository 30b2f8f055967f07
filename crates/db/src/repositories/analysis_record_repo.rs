//! Repository for the `analysis_artifact_records` join table.

use archpath_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::analysis_record::{
    AnalysisRecord, AnalysisRecordDetail, RecordCenter, UpdateAnalysisRecord, UpsertedRecord,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "request_id, artifact_id, quantity, sort_order, is_main_entry, \
                       comment, calculated_value, created_at, updated_at";

/// Same columns qualified with the `r.` alias for joined queries.
const R_COLUMNS: &str = "r.request_id, r.artifact_id, r.quantity, r.sort_order, \
                         r.is_main_entry, r.comment, r.calculated_value, \
                         r.created_at, r.updated_at";

/// Provides operations on request entries.
pub struct AnalysisRecordRepo;

impl AnalysisRecordRepo {
    /// Insert the entry or replace quantity and comment on an existing one.
    ///
    /// A single statement, so two concurrent adds of the same artifact end
    /// with exactly one row.
    pub async fn upsert(
        conn: &mut PgConnection,
        request_id: DbId,
        artifact_id: DbId,
        quantity: i32,
        comment: &str,
    ) -> Result<UpsertedRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO analysis_artifact_records (request_id, artifact_id, quantity, comment)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (request_id, artifact_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                comment = EXCLUDED.comment
             RETURNING {COLUMNS}, (xmax = 0) AS inserted"
        );
        sqlx::query_as::<_, UpsertedRecord>(&query)
            .bind(request_id)
            .bind(artifact_id)
            .bind(quantity)
            .bind(comment)
            .fetch_one(conn)
            .await
    }

    /// Find a single entry.
    pub async fn find(
        pool: &PgPool,
        request_id: DbId,
        artifact_id: DbId,
    ) -> Result<Option<AnalysisRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM analysis_artifact_records
             WHERE request_id = $1 AND artifact_id = $2"
        );
        sqlx::query_as::<_, AnalysisRecord>(&query)
            .bind(request_id)
            .bind(artifact_id)
            .fetch_optional(pool)
            .await
    }

    /// Entries of a request joined with artifact name, center and image.
    pub async fn list_for_request(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Vec<AnalysisRecordDetail>, sqlx::Error> {
        let query = format!(
            "SELECT {R_COLUMNS}, a.name AS artifact_name, a.production_center, a.image_url
             FROM analysis_artifact_records r
             JOIN artifacts a ON a.id = r.artifact_id
             WHERE r.request_id = $1
             ORDER BY r.sort_order ASC, r.artifact_id ASC"
        );
        sqlx::query_as::<_, AnalysisRecordDetail>(&query)
            .bind(request_id)
            .fetch_all(pool)
            .await
    }

    /// `(artifact_id, production_center, quantity)` for every entry of a request.
    pub async fn centers_for_request(
        conn: &mut PgConnection,
        request_id: DbId,
    ) -> Result<Vec<RecordCenter>, sqlx::Error> {
        sqlx::query_as::<_, RecordCenter>(
            "SELECT r.artifact_id, a.production_center, r.quantity
             FROM analysis_artifact_records r
             JOIN artifacts a ON a.id = r.artifact_id
             WHERE r.request_id = $1
             ORDER BY r.artifact_id ASC",
        )
        .bind(request_id)
        .fetch_all(conn)
        .await
    }

    /// Number of entries in a request.
    pub async fn count_for_request(pool: &PgPool, request_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM analysis_artifact_records WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_one(pool)
        .await
    }

    /// Update an entry. Only non-`None` fields in `input` are applied.
    ///
    /// Callers hold the request's row lock (see `TradeAnalysisRepo::lock_by_id`).
    pub async fn update(
        conn: &mut PgConnection,
        request_id: DbId,
        artifact_id: DbId,
        input: &UpdateAnalysisRecord,
    ) -> Result<Option<AnalysisRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE analysis_artifact_records SET
                quantity = COALESCE($3, quantity),
                sort_order = COALESCE($4, sort_order),
                is_main_entry = COALESCE($5, is_main_entry),
                comment = COALESCE($6, comment)
             WHERE request_id = $1 AND artifact_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisRecord>(&query)
            .bind(request_id)
            .bind(artifact_id)
            .bind(input.quantity)
            .bind(input.sort_order)
            .bind(input.is_main_entry)
            .bind(&input.comment)
            .fetch_optional(conn)
            .await
    }

    /// Remove an entry. Returns `true` if a row was deleted.
    ///
    /// Callers hold the request's row lock (see `TradeAnalysisRepo::lock_by_id`).
    pub async fn delete(
        conn: &mut PgConnection,
        request_id: DbId,
        artifact_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM analysis_artifact_records WHERE request_id = $1 AND artifact_id = $2",
        )
        .bind(request_id)
        .bind(artifact_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist the value returned by the calculation service.
    ///
    /// Returns `None` when the entry does not exist.
    pub async fn set_calculated_value(
        pool: &PgPool,
        request_id: DbId,
        artifact_id: DbId,
        value: f64,
    ) -> Result<Option<AnalysisRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE analysis_artifact_records SET calculated_value = $3
             WHERE request_id = $1 AND artifact_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisRecord>(&query)
            .bind(request_id)
            .bind(artifact_id)
            .bind(value)
            .fetch_optional(pool)
            .await
    }
}
