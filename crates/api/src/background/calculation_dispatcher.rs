//! Delivery of completed requests to the external calculation service.
//!
//! Completing a request writes a row to `calculation_jobs` in the same
//! transaction (an outbox). This dispatcher polls that table, POSTs each due
//! payload to the calculator, and records the outcome:
//!
//! - 2xx: the job is marked `delivered`.
//! - any other status or a transport error: the job is rescheduled with
//!   exponential backoff, or marked `failed` once its attempts are used up.
//!
//! Claiming a job starts a lease. If the process dies mid-delivery the lease
//! expires and the next tick puts the job back in the queue, so delivery is
//! at-least-once. Every POST carries an `Idempotency-Key` derived from the
//! request id so the calculator can drop duplicates.

use std::time::Duration;

use archpath_core::calculation::retry_backoff;
use archpath_core::types::DbId;
use archpath_db::models::calculation_job::CalculationJob;
use archpath_db::repositories::CalculationJobRepo;
use reqwest::StatusCode;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::CalculationConfig;

/// Upper bound on a single delivery attempt.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Jobs claimed per tick.
const CLAIM_BATCH_SIZE: i64 = 10;

/// Why a single delivery attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("request to calculation service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("calculation service responded with {0}")]
    Status(StatusCode),
}

/// Counters for one dispatcher tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    /// Expired leases returned to the queue (or failed).
    pub requeued: u64,
    pub claimed: usize,
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Polls `calculation_jobs` and delivers due payloads.
pub struct CalculationDispatcher {
    pool: PgPool,
    client: reqwest::Client,
    config: CalculationConfig,
}

impl CalculationDispatcher {
    pub fn new(pool: PgPool, config: CalculationConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()?;
        Ok(Self {
            pool,
            client,
            config,
        })
    }

    /// Run the dispatch loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            service_url = %self.config.service_url,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            max_attempts = self.config.max_attempts,
            "Calculation dispatcher started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Calculation dispatcher stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(stats) if stats.claimed > 0 || stats.requeued > 0 => {
                            tracing::info!(
                                requeued = stats.requeued,
                                claimed = stats.claimed,
                                delivered = stats.delivered,
                                retried = stats.retried,
                                failed = stats.failed,
                                "Calculation dispatcher tick"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "Calculation dispatcher tick failed");
                        }
                    }
                }
            }
        }
    }

    /// Requeue expired leases, then claim and deliver one batch of due jobs.
    pub async fn tick(&self) -> Result<TickStats, sqlx::Error> {
        let mut stats = TickStats {
            requeued: CalculationJobRepo::requeue_expired(&self.pool).await?,
            ..TickStats::default()
        };

        let jobs =
            CalculationJobRepo::claim_due(&self.pool, CLAIM_BATCH_SIZE, self.config.lease).await?;
        stats.claimed = jobs.len();

        for job in &jobs {
            match self.deliver(job).await {
                Ok(()) => {
                    CalculationJobRepo::mark_delivered(&self.pool, job.id).await?;
                    stats.delivered += 1;
                    tracing::info!(
                        job_id = job.id,
                        request_id = job.request_id,
                        attempts = job.attempts,
                        "Calculation payload delivered"
                    );
                }
                Err(e) if job.attempts_exhausted() => {
                    CalculationJobRepo::mark_failed(&self.pool, job.id, &e.to_string()).await?;
                    stats.failed += 1;
                    tracing::error!(
                        job_id = job.id,
                        request_id = job.request_id,
                        attempts = job.attempts,
                        error = %e,
                        "Calculation payload delivery failed permanently"
                    );
                }
                Err(e) => {
                    let delay = retry_backoff(job.attempts);
                    CalculationJobRepo::schedule_retry(&self.pool, job.id, &e.to_string(), delay)
                        .await?;
                    stats.retried += 1;
                    tracing::warn!(
                        job_id = job.id,
                        request_id = job.request_id,
                        attempts = job.attempts,
                        retry_in_secs = delay.as_secs(),
                        error = %e,
                        "Calculation payload delivery failed, will retry"
                    );
                }
            }
        }

        Ok(stats)
    }

    async fn deliver(&self, job: &CalculationJob) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.config.service_url)
            .header("Idempotency-Key", idempotency_key(job.request_id))
            .json(&job.payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status))
        }
    }
}

/// Stable key for every delivery of one request's payload.
fn idempotency_key(request_id: DbId) -> String {
    format!("calc-{request_id}")
}
