//! Trade-analysis request lifecycle rules.
//!
//! ```text
//! draft ──form──▶ formed ──moderate──▶ completed | rejected
//!   │               │
//!   └───delete──────┴──▶ deleted   (only once a formation date exists)
//! ```
//!
//! Every check here is pure: handlers fetch the current row, call the
//! matching `ensure_*` function, and only then issue the guarded UPDATE.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::is_moderator;
use crate::types::{DbId, Timestamp};

/// Quantity used when an artifact is added to a draft without one.
pub const DEFAULT_QUANTITY: i32 = 1;

/// Request status as stored in `trade_analyses.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Draft,
    Formed,
    Completed,
    Rejected,
    Deleted,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Draft,
        RequestStatus::Formed,
        RequestStatus::Completed,
        RequestStatus::Rejected,
        RequestStatus::Deleted,
    ];

    /// The database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Formed => "formed",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid status '{s}'. Must be one of: draft, formed, completed, rejected, deleted"
                ))
            })
    }
}

/// Outcome a moderator can choose for a formed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Completed,
    Rejected,
}

impl ModerationAction {
    /// Parse the `action` field of a moderation request body.
    pub fn parse(action: &str) -> Result<Self, CoreError> {
        match action {
            "completed" => Ok(ModerationAction::Completed),
            "rejected" => Ok(ModerationAction::Rejected),
            other => Err(CoreError::Validation(format!(
                "Invalid action '{other}'. Must be 'completed' or 'rejected'"
            ))),
        }
    }

    /// Status the request ends up in after this action.
    pub fn target_status(self) -> RequestStatus {
        match self {
            ModerationAction::Completed => RequestStatus::Completed,
            ModerationAction::Rejected => RequestStatus::Rejected,
        }
    }
}

fn parse_status(status: &str) -> Result<RequestStatus, CoreError> {
    status
        .parse::<RequestStatus>()
        .map_err(|_| CoreError::Internal(format!("Unknown stored request status '{status}'")))
}

/// Check that `actor_id` may submit the draft.
///
/// Fails with `Forbidden` for anyone but the creator, and with `Validation`
/// when the request is not a draft, the site name is blank, or there are no
/// entries.
pub fn ensure_can_form(
    status: &str,
    creator_id: DbId,
    actor_id: DbId,
    site_name: &str,
    entry_count: i64,
) -> Result<(), CoreError> {
    if creator_id != actor_id {
        return Err(CoreError::Forbidden(
            "Only the creator can form the request".into(),
        ));
    }
    if parse_status(status)? != RequestStatus::Draft {
        return Err(CoreError::Validation(format!(
            "Only draft requests can be formed (current status: {status})"
        )));
    }
    if site_name.trim().is_empty() {
        return Err(CoreError::Validation("site_name is required".into()));
    }
    if entry_count == 0 {
        return Err(CoreError::Validation(
            "Cannot form a request without entries".into(),
        ));
    }
    Ok(())
}

/// Check that an actor with `actor_role` may complete or reject the request.
pub fn ensure_can_moderate(status: &str, actor_role: &str) -> Result<(), CoreError> {
    if !is_moderator(actor_role) {
        return Err(CoreError::Forbidden("Moderator role required".into()));
    }
    if parse_status(status)? != RequestStatus::Formed {
        return Err(CoreError::Validation(format!(
            "Only formed requests can be completed or rejected (current status: {status})"
        )));
    }
    Ok(())
}

/// Check that a request may be soft-deleted: it must have been formed at
/// some point.
pub fn ensure_can_delete(formation_date: Option<Timestamp>) -> Result<(), CoreError> {
    if formation_date.is_none() {
        return Err(CoreError::Validation(
            "Only formed requests can be deleted".into(),
        ));
    }
    Ok(())
}

/// Check that the draft's own fields or entries may be edited by `actor_id`.
pub fn ensure_draft_editable(
    status: &str,
    creator_id: DbId,
    actor_id: DbId,
) -> Result<(), CoreError> {
    if creator_id != actor_id {
        return Err(CoreError::Forbidden(
            "Only the creator can edit the request".into(),
        ));
    }
    if parse_status(status)? != RequestStatus::Draft {
        return Err(CoreError::Validation(format!(
            "Only draft requests can be edited (current status: {status})"
        )));
    }
    Ok(())
}

/// Check that an actor may read a request: its creator or any moderator.
pub fn ensure_can_view(creator_id: DbId, actor_id: DbId, actor_role: &str) -> Result<(), CoreError> {
    if creator_id == actor_id || is_moderator(actor_role) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Only the creator or a moderator can access this request".into(),
        ))
    }
}

/// Validate an entry quantity.
pub fn validate_quantity(quantity: i32) -> Result<(), CoreError> {
    if quantity <= 0 {
        return Err(CoreError::Validation(
            "quantity must be greater than 0".into(),
        ));
    }
    Ok(())
}
