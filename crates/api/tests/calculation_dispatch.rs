//! End-to-end tests for the calculation outbox dispatcher against a local
//! stand-in for the calculation service.

mod common;

use std::sync::{Arc, Mutex};

use archpath_api::background::calculation_dispatcher::{CalculationDispatcher, TickStats};
use archpath_api::config::CalculationConfig;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use sqlx::PgPool;

/// What the fake calculator saw: `(Idempotency-Key, payload)` per call.
type Received = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

#[derive(Clone)]
struct Calculator {
    received: Received,
    status: StatusCode,
}

async fn accept(
    State(calc): State<Calculator>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    calc.received.lock().unwrap().push((key, payload));
    calc.status
}

/// Start a calculator that answers every POST with `status`.
async fn spawn_calculator(status: StatusCode) -> (String, Received) {
    let received = Received::default();
    let app = Router::new().route("/calculate", post(accept)).with_state(Calculator {
        received: received.clone(),
        status,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/calculate"), received)
}

fn dispatcher(t: &common::TestApp, service_url: String) -> CalculationDispatcher {
    let config = CalculationConfig {
        service_url,
        ..t.config.calculation.clone()
    };
    CalculationDispatcher::new(t.pool.clone(), config).unwrap()
}

/// Form and complete a request, which queues its calculation job, then cap
/// the job at `max_attempts`.
async fn completed_request(t: &common::TestApp, max_attempts: i32) -> i64 {
    let (_user, token) = common::regular_user(t, "digger").await;
    let (_mod, mod_token) = common::moderator(t, "curator").await;
    let request_id = common::formed_request(t, &token).await;

    let response = common::put_json_auth(
        t.app(),
        &format!("/api/trade-analysis/{request_id}/moderate"),
        serde_json::json!({ "action": "completed" }),
        &mod_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    sqlx::query("UPDATE calculation_jobs SET max_attempts = $2 WHERE request_id = $1")
        .bind(request_id)
        .bind(max_attempts)
        .execute(&t.pool)
        .await
        .unwrap();
    request_id
}

async fn job_status(pool: &PgPool, request_id: i64) -> (String, i32, Option<String>) {
    sqlx::query_as(
        "SELECT status, attempts, last_error FROM calculation_jobs WHERE request_id = $1",
    )
    .bind(request_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delivers_payload_once(pool: PgPool) {
    let t = common::build_test_app(pool);
    let (url, received) = spawn_calculator(StatusCode::OK).await;
    let request_id = completed_request(&t, 3).await;
    let dispatcher = dispatcher(&t, url);

    let stats = dispatcher.tick().await.unwrap();
    assert_eq!(
        stats,
        TickStats {
            requeued: 0,
            claimed: 1,
            delivered: 1,
            retried: 0,
            failed: 0,
        }
    );

    let (status, attempts, last_error) = job_status(&t.pool, request_id).await;
    assert_eq!(status, "delivered");
    assert_eq!(attempts, 1);
    assert!(last_error.is_none());

    {
        let calls = received.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (key, payload) = &calls[0];
        assert_eq!(key.as_deref(), Some(format!("calc-{request_id}").as_str()));
        assert_eq!(payload["request_id"], request_id);
        assert_eq!(payload["entries"].as_array().unwrap().len(), 2);
    }

    // Nothing left to deliver.
    let stats = dispatcher.tick().await.unwrap();
    assert_eq!(stats.claimed, 0);
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn retries_then_gives_up(pool: PgPool) {
    let t = common::build_test_app(pool);
    let (url, received) = spawn_calculator(StatusCode::INTERNAL_SERVER_ERROR).await;
    let request_id = completed_request(&t, 2).await;
    let dispatcher = dispatcher(&t, url);

    let stats = dispatcher.tick().await.unwrap();
    assert_eq!(stats.claimed, 1);
    assert_eq!(stats.retried, 1);

    let (status, attempts, last_error) = job_status(&t.pool, request_id).await;
    assert_eq!(status, "pending");
    assert_eq!(attempts, 1);
    assert!(last_error.unwrap().contains("500"));

    // Backoff pushed the next attempt into the future.
    let stats = dispatcher.tick().await.unwrap();
    assert_eq!(stats.claimed, 0);

    sqlx::query("UPDATE calculation_jobs SET next_attempt_at = NOW() WHERE request_id = $1")
        .bind(request_id)
        .execute(&t.pool)
        .await
        .unwrap();

    let stats = dispatcher.tick().await.unwrap();
    assert_eq!(stats.claimed, 1);
    assert_eq!(stats.failed, 1);

    let (status, attempts, _) = job_status(&t.pool, request_id).await;
    assert_eq!(status, "failed");
    assert_eq!(attempts, 2);
    assert_eq!(received.lock().unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unreachable_service_is_retried(pool: PgPool) {
    let t = common::build_test_app(pool);
    let request_id = completed_request(&t, 3).await;
    // Port 9 (discard) is not listening in the test environment.
    let dispatcher = dispatcher(&t, t.config.calculation.service_url.clone());

    let stats = dispatcher.tick().await.unwrap();
    assert_eq!(stats.retried, 1);

    let (status, _, last_error) = job_status(&t.pool, request_id).await;
    assert_eq!(status, "pending");
    assert!(last_error.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_lease_is_requeued(pool: PgPool) {
    let t = common::build_test_app(pool);
    let (url, received) = spawn_calculator(StatusCode::OK).await;
    let request_id = completed_request(&t, 3).await;

    // Simulate a dispatcher that claimed the job and died.
    sqlx::query(
        "UPDATE calculation_jobs
         SET status = 'in_flight', attempts = 1, next_attempt_at = NOW() - INTERVAL '1 second'
         WHERE request_id = $1",
    )
    .bind(request_id)
    .execute(&t.pool)
    .await
    .unwrap();

    let stats = dispatcher(&t, url).tick().await.unwrap();
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.delivered, 1);

    let (status, attempts, _) = job_status(&t.pool, request_id).await;
    assert_eq!(status, "delivered");
    assert_eq!(attempts, 2);
    assert_eq!(received.lock().unwrap().len(), 1);
}
