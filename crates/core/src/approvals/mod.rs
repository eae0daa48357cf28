//! Resolution policy for approval requests.
//!
//! A request starts `pending` and is resolved exactly once, to `approved`
//! (with a captured signature) or `rejected` (with a reason). The checks
//! here are pure: they take the record and an explicit caller identity and
//! either return the `Resolution` to persist or a typed [`ApprovalError`].
//! Persistence applies the resolution with a conditional update keyed on
//! the pending status, so a concurrent loser surfaces as
//! `AlreadyProcessed` rather than a second write.

use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalError, ApprovalRequest, ApprovalStatus};
use crate::domain::user::UserId;

/// What the approver asked to do, with the payload that action requires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionCommand {
    Approve { signature_image: String },
    Reject { reason: String },
}

/// The single terminal write to apply to a pending record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub status: ApprovalStatus,
    pub signature_image: Option<String>,
    pub rejection_reason: Option<String>,
}

/// Only the designated approver may read an approval request.
pub fn authorize_view(record: &ApprovalRequest, caller: &UserId) -> Result<(), ApprovalError> {
    if &record.approver_id != caller {
        return Err(ApprovalError::Forbidden);
    }
    Ok(())
}

/// Validate a resolution attempt against the record's current state.
///
/// Check order matters: identity before state before payload, so a caller
/// who is not the approver learns nothing about the record's progress.
pub fn authorize_resolution(
    record: &ApprovalRequest,
    caller: &UserId,
    command: ResolutionCommand,
) -> Result<Resolution, ApprovalError> {
    if &record.approver_id != caller {
        return Err(ApprovalError::Forbidden);
    }

    if record.status.is_terminal() {
        return Err(ApprovalError::AlreadyProcessed { status: record.status });
    }

    match command {
        ResolutionCommand::Approve { signature_image } => {
            let signature = signature_image.trim();
            if signature.is_empty() {
                return Err(ApprovalError::Validation(
                    "a signature image is required to approve".to_string(),
                ));
            }
            Ok(Resolution {
                status: ApprovalStatus::Approved,
                signature_image: Some(signature.to_string()),
                rejection_reason: None,
            })
        }
        ResolutionCommand::Reject { reason } => {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(ApprovalError::Validation(
                    "a rejection reason is required to reject".to_string(),
                ));
            }
            Ok(Resolution {
                status: ApprovalStatus::Rejected,
                signature_image: None,
                rejection_reason: Some(reason.to_string()),
            })
        }
    }
}
