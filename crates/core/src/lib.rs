pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;

pub use approvals::{authorize_resolution, authorize_view, Resolution, ResolutionCommand};
pub use domain::approval::{ApprovalError, ApprovalId, ApprovalRequest, ApprovalStatus};
pub use domain::education::{EducationRecord, EducationSession, EducationSessionId};
pub use domain::notice::{Notice, NoticeId};
pub use domain::report::{
    DailyReport, DailyReportId, DailyReportItem, MonthlyReport, MonthlyReportId, ReportPeriod,
};
pub use domain::user::{TeamId, UserId, UserRole};
pub use errors::{ApplicationError, InterfaceError};
