//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` (or an open transaction) as the first argument.

pub mod analysis_record_repo;
pub mod artifact_repo;
pub mod calculation_job_repo;
pub mod revoked_token_repo;
pub mod trade_analysis_repo;
pub mod user_repo;

pub use analysis_record_repo::AnalysisRecordRepo;
pub use artifact_repo::ArtifactRepo;
pub use calculation_job_repo::CalculationJobRepo;
pub use revoked_token_repo::RevokedTokenRepo;
pub use trade_analysis_repo::TradeAnalysisRepo;
pub use user_repo::UserRepo;
