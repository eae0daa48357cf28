use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use safework_core::approvals::Resolution;
use safework_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalStatus};
use safework_core::domain::report::MonthlyReportId;
use safework_core::domain::user::UserId;

use super::{ApprovalRepository, RepositoryError, ResolveOutcome};

/// Map-backed approval store for tests and wiring without a database.
/// The write lock held across check-and-update mirrors the conditional
/// update the SQL repository performs.
#[derive(Default)]
pub struct InMemoryApprovalRepository {
    approvals: RwLock<HashMap<String, ApprovalRequest>>,
}

#[async_trait::async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn find_by_id(
        &self,
        id: &ApprovalId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let approvals = self.approvals.read().await;
        Ok(approvals.get(&id.0).cloned())
    }

    async fn create(&self, approval: ApprovalRequest) -> Result<(), RepositoryError> {
        let mut approvals = self.approvals.write().await;
        approvals.insert(approval.id.0.clone(), approval);
        Ok(())
    }

    async fn find_pending_for_report(
        &self,
        report_id: &MonthlyReportId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let approvals = self.approvals.read().await;
        Ok(approvals
            .values()
            .filter(|a| a.monthly_report_id == *report_id)
            .find(|a| a.status == ApprovalStatus::Pending)
            .cloned())
    }

    async fn list_for_approver(
        &self,
        approver_id: &UserId,
        status: Option<ApprovalStatus>,
        limit: u32,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let approvals = self.approvals.read().await;
        let mut matched: Vec<ApprovalRequest> = approvals
            .values()
            .filter(|a| &a.approver_id == approver_id)
            .filter(|a| status.map(|wanted| a.status == wanted).unwrap_or(true))
            .cloned()
            .collect();
        matched.sort_by(|left, right| left.requested_at.cmp(&right.requested_at));
        matched.truncate(limit as usize);
        Ok(matched)
    }

    async fn resolve_if_pending(
        &self,
        id: &ApprovalId,
        resolution: &Resolution,
        resolved_at: DateTime<Utc>,
    ) -> Result<ResolveOutcome, RepositoryError> {
        let mut approvals = self.approvals.write().await;

        let Some(record) = approvals.get_mut(&id.0) else {
            return Ok(ResolveOutcome::NotFound);
        };

        if record.status != ApprovalStatus::Pending {
            return Ok(ResolveOutcome::AlreadyProcessed(record.clone()));
        }

        record.status = resolution.status;
        record.signature_image = resolution.signature_image.clone();
        record.rejection_reason = resolution.rejection_reason.clone();
        record.resolved_at = Some(resolved_at);
        record.updated_at = resolved_at;

        Ok(ResolveOutcome::Applied(record.clone()))
    }
}
