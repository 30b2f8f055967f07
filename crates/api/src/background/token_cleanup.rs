//! Periodic cleanup of revoked-token entries.
//!
//! A revoked token only needs to be remembered until it would have expired
//! on its own. This task deletes older `revoked_tokens` rows once an hour.

use std::time::Duration;

use archpath_db::repositories::RevokedTokenRepo;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the revoked-token cleanup loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Revoked token cleanup job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Revoked token cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match RevokedTokenRepo::purge_expired(&pool).await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Revoked token cleanup: purged expired rows");
                        } else {
                            tracing::debug!("Revoked token cleanup: no rows to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Revoked token cleanup: purge failed");
                    }
                }
            }
        }
    }
}
