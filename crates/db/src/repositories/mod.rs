use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use safework_core::approvals::Resolution;
use safework_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalStatus};
use safework_core::domain::education::{EducationRecord, EducationSession, EducationSessionId};
use safework_core::domain::notice::{Notice, NoticeId};
use safework_core::domain::report::{
    DailyReport, DailyReportId, MonthlyReport, MonthlyReportId, MonthlySummary, ReportPeriod,
};
use safework_core::domain::user::{TeamId, UserId};

pub mod approval;
pub mod education;
pub mod memory;
pub mod notice;
pub mod report;

pub use approval::SqlApprovalRepository;
pub use education::SqlEducationRepository;
pub use memory::InMemoryApprovalRepository;
pub use notice::SqlNoticeRepository;
pub use report::SqlReportRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result of the conditional terminal update on an approval request.
///
/// The update is guarded on `status = 'pending'`, so of two racing
/// resolutions exactly one observes `Applied`; the other reads the row
/// back and gets `AlreadyProcessed` with the winner's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    Applied(ApprovalRequest),
    AlreadyProcessed(ApprovalRequest),
    NotFound,
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn find_by_id(&self, id: &ApprovalId)
        -> Result<Option<ApprovalRequest>, RepositoryError>;

    async fn create(&self, approval: ApprovalRequest) -> Result<(), RepositoryError>;

    /// The at-most-one active request per report rule is enforced by
    /// checking this before creation.
    async fn find_pending_for_report(
        &self,
        report_id: &MonthlyReportId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError>;

    async fn list_for_approver(
        &self,
        approver_id: &UserId,
        status: Option<ApprovalStatus>,
        limit: u32,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError>;

    async fn resolve_if_pending(
        &self,
        id: &ApprovalId,
        resolution: &Resolution,
        resolved_at: DateTime<Utc>,
    ) -> Result<ResolveOutcome, RepositoryError>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create_daily(&self, report: DailyReport) -> Result<(), RepositoryError>;

    async fn find_daily_by_id(
        &self,
        id: &DailyReportId,
    ) -> Result<Option<DailyReport>, RepositoryError>;

    async fn list_daily_for_period(
        &self,
        team_id: &TeamId,
        period: &ReportPeriod,
    ) -> Result<Vec<DailyReport>, RepositoryError>;

    async fn create_monthly(&self, report: MonthlyReport) -> Result<(), RepositoryError>;

    async fn find_monthly_by_id(
        &self,
        id: &MonthlyReportId,
    ) -> Result<Option<MonthlyReport>, RepositoryError>;

    async fn find_monthly_by_period(
        &self,
        team_id: &TeamId,
        period: &ReportPeriod,
    ) -> Result<Option<MonthlyReport>, RepositoryError>;

    /// Aggregates the team's daily reports for the report's period.
    async fn monthly_summary(
        &self,
        report: &MonthlyReport,
    ) -> Result<MonthlySummary, RepositoryError>;
}

#[async_trait]
pub trait NoticeRepository: Send + Sync {
    async fn create(&self, notice: Notice) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &NoticeId) -> Result<Option<Notice>, RepositoryError>;
    async fn list(&self, limit: u32) -> Result<Vec<Notice>, RepositoryError>;
    async fn delete(&self, id: &NoticeId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait EducationRepository: Send + Sync {
    async fn create_session(&self, session: EducationSession) -> Result<(), RepositoryError>;

    async fn find_session(
        &self,
        id: &EducationSessionId,
    ) -> Result<Option<EducationSession>, RepositoryError>;

    async fn list_sessions(&self, limit: u32) -> Result<Vec<EducationSession>, RepositoryError>;

    /// Idempotent per (session, user): recording twice keeps the first
    /// completion timestamp.
    async fn record_completion(
        &self,
        record: EducationRecord,
    ) -> Result<EducationRecord, RepositoryError>;

    async fn list_completions(
        &self,
        session_id: &EducationSessionId,
    ) -> Result<Vec<EducationRecord>, RepositoryError>;
}

pub(crate) fn parse_timestamp(
    column: &str,
    raw: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Decode(format!("bad timestamp in `{column}`: {err}")))
}
