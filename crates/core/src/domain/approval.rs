use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::report::MonthlyReportId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    /// Approved and rejected are terminal; no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

/// One approval request raised against a monthly report.
///
/// The record is written twice in its lifetime: once at creation (pending)
/// and once at resolution, when exactly one of the terminal statuses is
/// applied together with its payload and `resolved_at`. Resolved records
/// are retained as an audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub monthly_report_id: MonthlyReportId,
    pub requester_id: UserId,
    pub approver_id: UserId,
    pub status: ApprovalStatus,
    pub signature_image: Option<String>,
    pub rejection_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Failure taxonomy for approval operations. The categories stay distinct
/// all the way to the HTTP layer so clients can branch their messaging on
/// them ("log in" vs "not your approval" vs "already handled").
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("approval request not found")]
    NotFound,
    #[error("caller is not authenticated")]
    Unauthorized,
    #[error("caller is not the designated approver")]
    Forbidden,
    #[error("approval request was already {}", status.as_str())]
    AlreadyProcessed { status: ApprovalStatus },
    #[error("{0}")]
    Validation(String),
}
