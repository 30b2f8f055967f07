use std::time::Duration;

use crate::auth::jwt::JwtConfig;
use crate::storage::StorageConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Externally reachable base URL of this server, used to build
    /// calculation callback URLs.
    pub public_base_url: String,
    /// Insert the demo catalog at startup.
    pub seed_catalog: bool,
    /// Base URL prefixed to the demo catalog's image file names.
    pub seed_image_base_url: Option<String>,
    /// Login and password of a moderator account created at startup.
    pub moderator_bootstrap: Option<(String, String)>,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Image storage backend.
    pub storage: StorageConfig,
    /// External calculation service.
    pub calculation: CalculationConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `PUBLIC_BASE_URL`      | `http://localhost:{PORT}`  |
    /// | `SEED_CATALOG`         | `false`                    |
    /// | `SEED_IMAGE_BASE_URL`  | --                         |
    /// | `MODERATOR_LOGIN`      | --                         |
    /// | `MODERATOR_PASSWORD`   | --                         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let seed_catalog = env_flag("SEED_CATALOG");
        let seed_image_base_url = std::env::var("SEED_IMAGE_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty());

        let moderator_bootstrap = match (
            std::env::var("MODERATOR_LOGIN"),
            std::env::var("MODERATOR_PASSWORD"),
        ) {
            (Ok(login), Ok(password)) if !login.is_empty() && !password.is_empty() => {
                Some((login, password))
            }
            _ => None,
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            public_base_url,
            seed_catalog,
            seed_image_base_url,
            moderator_bootstrap,
            jwt: JwtConfig::from_env(),
            storage: StorageConfig::from_env(),
            calculation: CalculationConfig::from_env(),
        }
    }
}

/// Settings for the external calculation service and its dispatcher.
#[derive(Debug, Clone)]
pub struct CalculationConfig {
    /// Endpoint the dispatcher POSTs calculation payloads to.
    pub service_url: String,
    /// Shared secret expected in the `X-API-Token` header of callbacks.
    pub callback_token: String,
    /// Delay between dispatcher ticks.
    pub poll_interval: Duration,
    /// Delivery attempts before a job is marked failed.
    pub max_attempts: i32,
    /// How long a claimed job may stay in flight before it is re-queued.
    pub lease: Duration,
}

/// Default shared secret for calculation callbacks.
const DEFAULT_CALLBACK_TOKEN: &str = "async-calc-token-8bytes";

impl CalculationConfig {
    /// Load calculation settings from environment variables.
    ///
    /// | Env Var                   | Default                           |
    /// |---------------------------|-----------------------------------|
    /// | `CALC_SERVICE_URL`        | `http://localhost:8080/calculate` |
    /// | `CALC_CALLBACK_TOKEN`     | `async-calc-token-8bytes`         |
    /// | `CALC_POLL_INTERVAL_SECS` | `5`                               |
    /// | `CALC_MAX_ATTEMPTS`       | `5`                               |
    /// | `CALC_LEASE_SECS`         | `60`                              |
    pub fn from_env() -> Self {
        let service_url = std::env::var("CALC_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8080/calculate".into());

        let callback_token = std::env::var("CALC_CALLBACK_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CALLBACK_TOKEN.into());

        let poll_interval_secs: u64 = std::env::var("CALC_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("CALC_POLL_INTERVAL_SECS must be a valid u64");

        let max_attempts: i32 = std::env::var("CALC_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("CALC_MAX_ATTEMPTS must be a valid i32");
        assert!(max_attempts > 0, "CALC_MAX_ATTEMPTS must be positive");

        let lease_secs: u64 = std::env::var("CALC_LEASE_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("CALC_LEASE_SECS must be a valid u64");

        Self {
            service_url,
            callback_token,
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            max_attempts,
            lease: Duration::from_secs(lease_secs),
        }
    }
}

/// `true` for `1`, `true`, `yes` (case-insensitive).
fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
