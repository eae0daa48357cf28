use serde::{Deserialize, Serialize};

use crate::mailer::MailMessage;

/// Approval-workflow transition to announce. Carries the already-resolved
/// recipient addresses so rendering needs no further lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    ApprovalRequested {
        approval_id: String,
        report_id: String,
        period: String,
        approver_email: String,
        requester_name: String,
    },
    ApprovalGranted {
        approval_id: String,
        report_id: String,
        period: String,
        requester_email: String,
        approver_name: String,
    },
    ApprovalRejected {
        approval_id: String,
        report_id: String,
        period: String,
        requester_email: String,
        approver_name: String,
        reason: String,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApprovalRequested { .. } => "approval.requested",
            Self::ApprovalGranted { .. } => "approval.granted",
            Self::ApprovalRejected { .. } => "approval.rejected",
        }
    }

    pub fn approval_id(&self) -> &str {
        match self {
            Self::ApprovalRequested { approval_id, .. }
            | Self::ApprovalGranted { approval_id, .. }
            | Self::ApprovalRejected { approval_id, .. } => approval_id,
        }
    }

    pub fn render(&self, from_address: &str) -> MailMessage {
        match self {
            Self::ApprovalRequested { report_id, period, approver_email, requester_name, .. } => {
                MailMessage {
                    from: from_address.to_string(),
                    to: vec![approver_email.clone()],
                    subject: format!("Monthly safety report {period} awaits your approval"),
                    body: format!(
                        "{requester_name} has submitted monthly report {report_id} \
                         for {period} and named you as approver.\n\n\
                         Please review and sign, or reject with a reason."
                    ),
                }
            }
            Self::ApprovalGranted { report_id, period, requester_email, approver_name, .. } => {
                MailMessage {
                    from: from_address.to_string(),
                    to: vec![requester_email.clone()],
                    subject: format!("Monthly safety report {period} approved"),
                    body: format!(
                        "{approver_name} has signed and approved monthly report \
                         {report_id} for {period}."
                    ),
                }
            }
            Self::ApprovalRejected {
                report_id,
                period,
                requester_email,
                approver_name,
                reason,
                ..
            } => MailMessage {
                from: from_address.to_string(),
                to: vec![requester_email.clone()],
                subject: format!("Monthly safety report {period} rejected"),
                body: format!(
                    "{approver_name} has rejected monthly report {report_id} \
                     for {period}.\n\nReason: {reason}"
                ),
            },
        }
    }
}
