#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

use archpath_api::auth::jwt::{generate_access_token, JwtConfig};
use archpath_api::auth::password::hash_password;
use archpath_api::config::{CalculationConfig, ServerConfig};
use archpath_api::router::build_app_router;
use archpath_api::state::AppState;
use archpath_api::storage::{LocalStorage, StorageConfig};
use archpath_core::roles::{ROLE_MODERATOR, ROLE_USER};
use archpath_core::types::DbId;
use archpath_db::models::artifact::{Artifact, CreateArtifact};
use archpath_db::models::user::{CreateUser, User};
use archpath_db::repositories::{ArtifactRepo, UserRepo};

/// Shared secret the tests use for calculator callbacks.
pub const CALLBACK_TOKEN: &str = "test-callback-token";

/// Plaintext password of every user created by [`create_user`].
pub const TEST_PASSWORD: &str = "amphora-123";

/// A running test application backed by a temporary media directory.
///
/// The directory is removed when this value is dropped.
pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub config: ServerConfig,
    pub media_dir: TempDir,
}

impl TestApp {
    /// A fresh handle to the router for one `oneshot` request.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Bearer token for `user`, signed with the test JWT secret.
    pub fn token_for(&self, user: &User) -> String {
        generate_access_token(user.id, &user.role, &self.config.jwt)
            .expect("token generation should succeed")
    }
}

/// Build a test `ServerConfig` with safe defaults and local storage at `media_dir`.
pub fn test_config(media_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        public_base_url: "http://localhost:8000".to_string(),
        seed_catalog: false,
        seed_image_base_url: None,
        moderator_bootstrap: None,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            expiry_mins: 60,
        },
        storage: StorageConfig::Local {
            path: media_dir.to_path_buf(),
            public_url: "http://localhost:8000/media".to_string(),
        },
        calculation: CalculationConfig {
            service_url: "http://127.0.0.1:9/calculate".to_string(),
            callback_token: CALLBACK_TOKEN.to_string(),
            poll_interval: Duration::from_secs(1),
            max_attempts: 3,
            lease: Duration::from_secs(60),
        },
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
///
/// Goes through [`build_app_router`] so integration tests exercise the same
/// middleware stack production uses.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let media_dir = tempfile::tempdir().expect("temp dir should be created");
    let config = test_config(media_dir.path());

    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        storage: Arc::new(LocalStorage::new(
            media_dir.path().to_path_buf(),
            "http://localhost:8000/media".to_string(),
        )),
    };

    TestApp {
        router: build_app_router(state, &config),
        pool,
        config,
        media_dir,
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a user directly with [`TEST_PASSWORD`].
pub async fn create_user(pool: &PgPool, login: &str, role: &str) -> User {
    let password_hash = hash_password(TEST_PASSWORD).expect("hashing should succeed");
    UserRepo::create(
        pool,
        &CreateUser {
            login: login.to_string(),
            password_hash,
            role: role.to_string(),
        },
    )
    .await
    .expect("user creation should succeed")
}

/// Create a regular user and return it with a bearer token.
pub async fn regular_user(t: &TestApp, login: &str) -> (User, String) {
    let user = create_user(&t.pool, login, ROLE_USER).await;
    let token = t.token_for(&user);
    (user, token)
}

/// Create a moderator and return it with a bearer token.
pub async fn moderator(t: &TestApp, login: &str) -> (User, String) {
    let user = create_user(&t.pool, login, ROLE_MODERATOR).await;
    let token = t.token_for(&user);
    (user, token)
}

/// Insert an active artifact.
pub async fn create_artifact(pool: &PgPool, name: &str, center: &str) -> Artifact {
    ArtifactRepo::create(
        pool,
        &CreateArtifact {
            name: name.to_string(),
            description: Some(format!("{name} from {center}")),
            production_center: Some(center.to_string()),
            example_location: None,
            is_active: None,
        },
    )
    .await
    .expect("artifact creation should succeed")
}

/// Add `artifact_id` to the caller's draft through the API and return the draft id.
pub async fn add_to_draft(t: &TestApp, token: &str, artifact_id: DbId, quantity: i32) -> DbId {
    let response = post_json_auth(
        t.app(),
        &format!("/api/artifacts/{artifact_id}/add-to-analysis"),
        serde_json::json!({ "quantity": quantity }),
        token,
    )
    .await;
    assert!(
        response.status() == StatusCode::CREATED || response.status() == StatusCode::OK,
        "add-to-analysis failed with {}",
        response.status()
    );
    body_json(response).await["data"]["request_id"]
        .as_i64()
        .expect("request_id should be a number")
}

/// Build a formed request for `token`'s user: Attica x3, Corinth x1, site "Olbia".
pub async fn formed_request(t: &TestApp, token: &str) -> DbId {
    let attic = create_artifact(&t.pool, "Attic black-figure amphora", "Attica").await;
    let corinth = create_artifact(&t.pool, "Corinthian aryballos", "Corinth").await;

    let request_id = add_to_draft(t, token, attic.id, 3).await;
    add_to_draft(t, token, corinth.id, 1).await;

    let response = put_json_auth(
        t.app(),
        &format!("/api/trade-analysis/{request_id}"),
        serde_json::json!({ "site_name": "Olbia" }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = put_json_auth(
        t.app(),
        &format!("/api/trade-analysis/{request_id}/form"),
        serde_json::json!({}),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    request_id
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be valid JSON")
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("request should complete")
}

fn json_request(method: &str, uri: &str, body: serde_json::Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request should build")
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, empty_request("GET", uri, None)).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, empty_request("GET", uri, Some(token))).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, json_request("POST", uri, body, None)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: serde_json::Value, token: &str) -> Response {
    send(app, json_request("POST", uri, body, Some(token))).await
}

pub async fn post_empty_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, empty_request("POST", uri, Some(token))).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, json_request("PUT", uri, body, None)).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: serde_json::Value, token: &str) -> Response {
    send(app, json_request("PUT", uri, body, Some(token))).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, empty_request("DELETE", uri, Some(token))).await
}

/// Send a raw request, for cases the helpers above don't cover.
pub async fn send_request(app: Router, request: Request<Body>) -> Response {
    send(app, request).await
}
