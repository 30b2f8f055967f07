pub mod analysis_records;
pub mod artifacts;
pub mod calculation_callback;
pub mod trade_analysis;
pub mod users;
