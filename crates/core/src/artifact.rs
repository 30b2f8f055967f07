//! Catalog artifact field rules.

use crate::error::CoreError;
use crate::types::DbId;

/// Production center stored when none is supplied.
pub const DEFAULT_PRODUCTION_CENTER: &str = "Unknown";

/// Maximum length of an artifact name.
pub const MAX_NAME_LEN: usize = 255;

/// Validate an artifact name: non-blank and at most [`MAX_NAME_LEN`] characters.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("name is required".into()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Normalize an optional production center, falling back to
/// [`DEFAULT_PRODUCTION_CENTER`] for missing or blank input.
pub fn normalize_production_center(center: Option<&str>) -> String {
    match center.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => DEFAULT_PRODUCTION_CENTER.to_string(),
    }
}

/// Object key under which an artifact's image is stored.
pub fn image_object_key(artifact_id: DbId) -> String {
    format!("artifact_{artifact_id}")
}
