use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archpath_api::auth::password::hash_password;
use archpath_api::background::{calculation_dispatcher::CalculationDispatcher, token_cleanup};
use archpath_api::config::ServerConfig;
use archpath_api::router::build_app_router;
use archpath_api::state::AppState;
use archpath_api::storage::build_storage;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "archpath_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = archpath_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    archpath_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    archpath_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Seeding ---
    if config.seed_catalog {
        let inserted =
            archpath_db::seed::seed_catalog(&pool, config.seed_image_base_url.as_deref())
                .await
                .expect("Failed to seed artifact catalog");
        tracing::info!(inserted, "Artifact catalog seeded");
    }

    if let Some((login, password)) = &config.moderator_bootstrap {
        let password_hash = hash_password(password).expect("Failed to hash moderator password");
        let created = archpath_db::seed::ensure_moderator(&pool, login, &password_hash)
            .await
            .expect("Failed to bootstrap moderator account");
        tracing::info!(login = %login, created, "Moderator account ensured");
    }

    // --- Object storage ---
    let storage = build_storage(&config.storage)
        .await
        .expect("Failed to initialize object storage");
    tracing::info!(backend = storage.backend_name(), "Object storage ready");

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let dispatcher = CalculationDispatcher::new(pool.clone(), config.calculation.clone())
        .expect("Failed to build calculation HTTP client");
    let dispatcher_handle = tokio::spawn(dispatcher.run(cancel.clone()));

    let cleanup_handle = tokio::spawn(token_cleanup::run(pool.clone(), cancel.clone()));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        storage,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), dispatcher_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), cleanup_handle).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
