//! Object storage for artifact images.
//!
//! Two backends implement [`ObjectStorage`]:
//!
//! - [`s3::S3Storage`] -- any S3-compatible service (MinIO in development).
//! - [`local::LocalStorage`] -- a directory on disk, served under `/media`.

pub mod local;
pub mod s3;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use local::LocalStorage;
pub use s3::S3Storage;

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

/// A blob store that returns a public URL for each stored object.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key`, replacing any previous object, and return
    /// the URL clients can fetch it from.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Connection settings for an S3-compatible backend.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Prefix for returned object URLs (default: `{endpoint}/{bucket}`).
    pub public_url: String,
}

/// Which storage backend to use and how to reach it.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3(S3Config),
    Local {
        /// Directory objects are written to.
        path: PathBuf,
        /// Prefix for returned object URLs.
        public_url: String,
    },
}

impl StorageConfig {
    /// Load storage settings from environment variables.
    ///
    /// | Env Var                    | Default                       |
    /// |----------------------------|-------------------------------|
    /// | `STORAGE_BACKEND`          | `local` (`s3` or `local`)     |
    /// | `S3_ENDPOINT`              | `http://localhost:9000`       |
    /// | `S3_REGION`                | `us-east-1`                   |
    /// | `S3_ACCESS_KEY`            | **required** for `s3`         |
    /// | `S3_SECRET_KEY`            | **required** for `s3`         |
    /// | `S3_BUCKET`                | `archpath`                    |
    /// | `S3_PUBLIC_URL`            | `{S3_ENDPOINT}/{S3_BUCKET}`   |
    /// | `LOCAL_STORAGE_PATH`       | `./media`                     |
    /// | `LOCAL_STORAGE_PUBLIC_URL` | `http://localhost:8000/media` |
    ///
    /// # Panics
    ///
    /// Panics on an unknown backend, or when the `s3` backend is selected
    /// without credentials.
    pub fn from_env() -> Self {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".into());

        match backend.trim().to_ascii_lowercase().as_str() {
            "s3" => {
                let endpoint = std::env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:9000".into())
                    .trim_end_matches('/')
                    .to_string();
                let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "archpath".into());
                let public_url = std::env::var("S3_PUBLIC_URL")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| format!("{endpoint}/{bucket}"));

                StorageConfig::S3(S3Config {
                    region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
                    access_key: std::env::var("S3_ACCESS_KEY")
                        .expect("S3_ACCESS_KEY must be set when STORAGE_BACKEND=s3"),
                    secret_key: std::env::var("S3_SECRET_KEY")
                        .expect("S3_SECRET_KEY must be set when STORAGE_BACKEND=s3"),
                    endpoint,
                    bucket,
                    public_url,
                })
            }
            "local" => StorageConfig::Local {
                path: std::env::var("LOCAL_STORAGE_PATH")
                    .unwrap_or_else(|_| "./media".into())
                    .into(),
                public_url: std::env::var("LOCAL_STORAGE_PUBLIC_URL")
                    .unwrap_or_else(|_| "http://localhost:8000/media".into()),
            },
            other => panic!("STORAGE_BACKEND must be 's3' or 'local', got '{other}'"),
        }
    }

    /// Directory to serve under `/media`, for the local backend only.
    pub fn local_media_dir(&self) -> Option<&PathBuf> {
        match self {
            StorageConfig::Local { path, .. } => Some(path),
            StorageConfig::S3(_) => None,
        }
    }
}

/// Construct the configured backend.
///
/// The S3 backend creates its bucket when it does not exist yet.
pub async fn build_storage(config: &StorageConfig) -> Result<Arc<dyn ObjectStorage>, StorageError> {
    match config {
        StorageConfig::S3(s3_config) => {
            let storage = S3Storage::new(s3_config);
            storage.ensure_bucket().await?;
            Ok(Arc::new(storage))
        }
        StorageConfig::Local { path, public_url } => {
            let storage = LocalStorage::new(path.clone(), public_url.clone());
            storage.ensure_root().await?;
            Ok(Arc::new(storage))
        }
    }
}

/// Join a URL prefix and an object key with exactly one slash.
pub(crate) fn object_url(prefix: &str, key: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), key)
}

/// Keys are flat names: no path separators and no parent references.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
