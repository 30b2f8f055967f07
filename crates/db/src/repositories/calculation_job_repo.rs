//! Repository for the `calculation_jobs` outbox.
//!
//! Lifecycle: `pending` → `in_flight` (claimed, lease running) → `delivered`,
//! or back to `pending` with a later `next_attempt_at`, or `failed` once
//! `max_attempts` is reached. For an `in_flight` job `next_attempt_at` is
//! the lease deadline.

use std::time::Duration;

use archpath_core::calculation::{
    CalculationPayload, JOB_DELIVERED, JOB_FAILED, JOB_IN_FLIGHT, JOB_PENDING,
};
use archpath_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::models::calculation_job::CalculationJob;

/// Column list for `calculation_jobs` queries.
const COLUMNS: &str = "id, request_id, payload, status, attempts, max_attempts, \
                       next_attempt_at, last_error, delivered_at, created_at, updated_at";

/// Provides outbox operations for the calculation dispatcher.
pub struct CalculationJobRepo;

impl CalculationJobRepo {
    /// Enqueue the job for a request. The unique `request_id` makes this
    /// idempotent: returns `false` if a job already existed.
    pub async fn enqueue(
        conn: &mut PgConnection,
        request_id: DbId,
        payload: &CalculationPayload,
        max_attempts: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO calculation_jobs (request_id, payload, status, max_attempts)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (request_id) DO NOTHING",
        )
        .bind(request_id)
        .bind(Json(payload))
        .bind(JOB_PENDING)
        .bind(max_attempts)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find the job for a request.
    pub async fn find_by_request(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Option<CalculationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM calculation_jobs WHERE request_id = $1");
        sqlx::query_as::<_, CalculationJob>(&query)
            .bind(request_id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim up to `limit` due pending jobs.
    ///
    /// Claiming counts as an attempt and starts a lease of `lease` length.
    /// `FOR UPDATE SKIP LOCKED` keeps concurrent dispatchers from claiming
    /// the same row.
    pub async fn claim_due(
        pool: &PgPool,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<CalculationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE calculation_jobs
             SET status = $1,
                 attempts = attempts + 1,
                 next_attempt_at = NOW() + make_interval(secs => $2)
             WHERE id IN (
                 SELECT id FROM calculation_jobs
                 WHERE status = $3 AND next_attempt_at <= NOW()
                 ORDER BY next_attempt_at ASC, id ASC
                 LIMIT $4
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CalculationJob>(&query)
            .bind(JOB_IN_FLIGHT)
            .bind(lease.as_secs_f64())
            .bind(JOB_PENDING)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Return `in_flight` jobs whose lease expired to `pending`, or mark
    /// them `failed` if they have no attempts left.
    ///
    /// Returns the number of jobs touched.
    pub async fn requeue_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE calculation_jobs
             SET status = CASE WHEN attempts >= max_attempts THEN $2 ELSE $3 END,
                 last_error = COALESCE(last_error, 'lease expired')
             WHERE status = $1 AND next_attempt_at <= NOW()",
        )
        .bind(JOB_IN_FLIGHT)
        .bind(JOB_FAILED)
        .bind(JOB_PENDING)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark a claimed job delivered.
    pub async fn mark_delivered(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE calculation_jobs
             SET status = $2, delivered_at = NOW(), last_error = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(JOB_DELIVERED)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt and schedule the next one after `delay`.
    pub async fn schedule_retry(
        pool: &PgPool,
        id: DbId,
        error: &str,
        delay: Duration,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE calculation_jobs
             SET status = $2, last_error = $3,
                 next_attempt_at = NOW() + make_interval(secs => $4)
             WHERE id = $1",
        )
        .bind(id)
        .bind(JOB_PENDING)
        .bind(error)
        .bind(delay.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Give up on a job after its last attempt failed.
    pub async fn mark_failed(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE calculation_jobs SET status = $2, last_error = $3 WHERE id = $1")
            .bind(id)
            .bind(JOB_FAILED)
            .bind(error)
            .execute(pool)
            .await?;
        Ok(())
    }
}
