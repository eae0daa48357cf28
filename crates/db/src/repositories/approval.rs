use chrono::{DateTime, Utc};
use sqlx::Row;

use safework_core::approvals::Resolution;
use safework_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalStatus};
use safework_core::domain::report::MonthlyReportId;
use safework_core::domain::user::UserId;

use super::{parse_timestamp, ApprovalRepository, RepositoryError, ResolveOutcome};
use crate::DbPool;

pub struct SqlApprovalRepository {
    pool: DbPool,
}

impl SqlApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const APPROVAL_COLUMNS: &str = "id, monthly_report_id, requester_id, approver_id, status,
            signature_image, rejection_reason, requested_at, resolved_at, updated_at";

fn row_to_approval(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRequest, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let monthly_report_id: String = row.try_get("monthly_report_id").map_err(decode)?;
    let requester_id: String = row.try_get("requester_id").map_err(decode)?;
    let approver_id: String = row.try_get("approver_id").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;
    let signature_image: Option<String> = row.try_get("signature_image").map_err(decode)?;
    let rejection_reason: Option<String> = row.try_get("rejection_reason").map_err(decode)?;
    let requested_at_str: String = row.try_get("requested_at").map_err(decode)?;
    let resolved_at_str: Option<String> = row.try_get("resolved_at").map_err(decode)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode)?;

    let resolved_at = match resolved_at_str {
        Some(raw) => Some(parse_timestamp("resolved_at", &raw)?),
        None => None,
    };

    Ok(ApprovalRequest {
        id: ApprovalId(id),
        monthly_report_id: MonthlyReportId(monthly_report_id),
        requester_id: UserId(requester_id),
        approver_id: UserId(approver_id),
        status: ApprovalStatus::parse(&status_str),
        signature_image,
        rejection_reason,
        requested_at: parse_timestamp("requested_at", &requested_at_str)?,
        resolved_at,
        updated_at: parse_timestamp("updated_at", &updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl ApprovalRepository for SqlApprovalRepository {
    async fn find_by_id(
        &self,
        id: &ApprovalId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approval_request WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_approval(r)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, approval: ApprovalRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO approval_request
                (id, monthly_report_id, requester_id, approver_id, status,
                 signature_image, rejection_reason, requested_at, resolved_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&approval.id.0)
        .bind(&approval.monthly_report_id.0)
        .bind(&approval.requester_id.0)
        .bind(&approval.approver_id.0)
        .bind(approval.status.as_str())
        .bind(&approval.signature_image)
        .bind(&approval.rejection_reason)
        .bind(approval.requested_at.to_rfc3339())
        .bind(approval.resolved_at.map(|dt| dt.to_rfc3339()))
        .bind(approval.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_pending_for_report(
        &self,
        report_id: &MonthlyReportId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approval_request
             WHERE monthly_report_id = ? AND status = 'pending'
             ORDER BY requested_at DESC LIMIT 1"
        ))
        .bind(&report_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_approval(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_approver(
        &self,
        approver_id: &UserId,
        status: Option<ApprovalStatus>,
        limit: u32,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {APPROVAL_COLUMNS} FROM approval_request
                 WHERE approver_id = ? AND status = ?
                 ORDER BY requested_at ASC
                 LIMIT ?"
            ))
            .bind(&approver_id.0)
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {APPROVAL_COLUMNS} FROM approval_request
                 WHERE approver_id = ?
                 ORDER BY requested_at ASC
                 LIMIT ?"
            ))
            .bind(&approver_id.0)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_approval).collect::<Result<Vec<_>, _>>()
    }

    async fn resolve_if_pending(
        &self,
        id: &ApprovalId,
        resolution: &Resolution,
        resolved_at: DateTime<Utc>,
    ) -> Result<ResolveOutcome, RepositoryError> {
        // Conditional update keyed on the pending status: the storage-level
        // guard that makes the terminal transition first-writer-wins.
        let result = sqlx::query(
            "UPDATE approval_request
             SET status = ?, signature_image = ?, rejection_reason = ?,
                 resolved_at = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(resolution.status.as_str())
        .bind(&resolution.signature_image)
        .bind(&resolution.rejection_reason)
        .bind(resolved_at.to_rfc3339())
        .bind(resolved_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return match self.find_by_id(id).await? {
                Some(record) => Ok(ResolveOutcome::Applied(record)),
                None => Ok(ResolveOutcome::NotFound),
            };
        }

        // Zero rows: either no such record, or someone else resolved it
        // first. A follow-up read tells the two apart.
        match self.find_by_id(id).await? {
            Some(record) => Ok(ResolveOutcome::AlreadyProcessed(record)),
            None => Ok(ResolveOutcome::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use safework_core::approvals::Resolution;
    use safework_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalStatus};
    use safework_core::domain::report::MonthlyReportId;
    use safework_core::domain::user::UserId;

    use super::SqlApprovalRepository;
    use crate::repositories::{ApprovalRepository, ResolveOutcome};
    use crate::{connect_with_settings, migrations};

    /// Named shared-memory database so concurrent connections in one test
    /// see the same data without colliding with other tests.
    async fn setup(db_name: &str) -> sqlx::SqlitePool {
        let url = format!("sqlite:file:{db_name}?mode=memory&cache=shared");
        let pool = connect_with_settings(&url, 4, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO team (id, name, site, created_at) VALUES ('t-1', 'Alpha Crew', 'North Yard', ?)")
            .bind(&now)
            .execute(&pool)
            .await
            .expect("seed team");
        for (id, email) in [("u-foreman", "foreman@example.com"), ("u-manager", "manager@example.com")] {
            sqlx::query(
                "INSERT INTO app_user (id, name, email, role, team_id, created_at)
                 VALUES (?, ?, ?, 'manager', 't-1', ?)",
            )
            .bind(id)
            .bind(id)
            .bind(email)
            .bind(&now)
            .execute(&pool)
            .await
            .expect("seed user");
        }
        sqlx::query(
            "INSERT INTO monthly_report (id, team_id, period, submitted_by, created_at, updated_at)
             VALUES ('MR-1', 't-1', '2026-07', 'u-foreman', ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .expect("seed monthly report");

        pool
    }

    fn pending_approval(id: &str) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: ApprovalId(id.to_string()),
            monthly_report_id: MonthlyReportId("MR-1".to_string()),
            requester_id: UserId("u-foreman".to_string()),
            approver_id: UserId("u-manager".to_string()),
            status: ApprovalStatus::Pending,
            signature_image: None,
            rejection_reason: None,
            requested_at: now,
            resolved_at: None,
            updated_at: now,
        }
    }

    fn approve_resolution() -> Resolution {
        Resolution {
            status: ApprovalStatus::Approved,
            signature_image: Some("data:image/png;base64,AAAA".to_string()),
            rejection_reason: None,
        }
    }

    fn reject_resolution(reason: &str) -> Resolution {
        Resolution {
            status: ApprovalStatus::Rejected,
            signature_image: None,
            rejection_reason: Some(reason.to_string()),
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let pool = setup("apr_round_trip").await;
        let repo = SqlApprovalRepository::new(pool);

        repo.create(pending_approval("APR-001")).await.expect("create");
        let found = repo
            .find_by_id(&ApprovalId("APR-001".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.monthly_report_id.0, "MR-1");
        assert_eq!(found.approver_id.0, "u-manager");
        assert_eq!(found.status, ApprovalStatus::Pending);
        assert!(found.resolved_at.is_none());
    }

    #[tokio::test]
    async fn resolve_applies_once_and_sets_resolved_at() {
        let pool = setup("apr_resolve_once").await;
        let repo = SqlApprovalRepository::new(pool);
        repo.create(pending_approval("APR-001")).await.expect("create");

        let id = ApprovalId("APR-001".to_string());
        let outcome = repo
            .resolve_if_pending(&id, &approve_resolution(), Utc::now())
            .await
            .expect("resolve");

        let ResolveOutcome::Applied(record) = outcome else {
            panic!("first resolution should apply");
        };
        assert_eq!(record.status, ApprovalStatus::Approved);
        assert!(record.resolved_at.is_some());
        assert_eq!(record.signature_image.as_deref(), Some("data:image/png;base64,AAAA"));

        // A later attempt sees the terminal record, not a second apply.
        let second = repo
            .resolve_if_pending(&id, &reject_resolution("too late"), Utc::now())
            .await
            .expect("second resolve");
        let ResolveOutcome::AlreadyProcessed(current) = second else {
            panic!("second resolution should observe AlreadyProcessed");
        };
        assert_eq!(current.status, ApprovalStatus::Approved);
        assert_eq!(current.resolved_at, record.resolved_at, "resolved_at must not move");
        assert!(current.rejection_reason.is_none(), "loser's payload must not leak in");
    }

    #[tokio::test]
    async fn racing_resolutions_have_exactly_one_winner() {
        let pool = setup("apr_race").await;
        let repo = Arc::new(SqlApprovalRepository::new(pool));
        repo.create(pending_approval("APR-RACE")).await.expect("create");

        let id = ApprovalId("APR-RACE".to_string());
        let approve = {
            let repo = Arc::clone(&repo);
            let id = id.clone();
            tokio::spawn(async move {
                repo.resolve_if_pending(&id, &approve_resolution(), Utc::now()).await
            })
        };
        let reject = {
            let repo = Arc::clone(&repo);
            let id = id.clone();
            tokio::spawn(async move {
                repo.resolve_if_pending(&id, &reject_resolution("concurrent"), Utc::now()).await
            })
        };

        let outcomes = [
            approve.await.expect("join").expect("approve path"),
            reject.await.expect("join").expect("reject path"),
        ];

        let applied = outcomes
            .iter()
            .filter(|o| matches!(o, ResolveOutcome::Applied(_)))
            .count();
        let conflicted = outcomes
            .iter()
            .filter(|o| matches!(o, ResolveOutcome::AlreadyProcessed(_)))
            .count();
        assert_eq!((applied, conflicted), (1, 1), "exactly one resolution may win");

        let record = repo
            .find_by_id(&id)
            .await
            .expect("find")
            .expect("record exists");
        assert!(record.status.is_terminal());
    }

    #[tokio::test]
    async fn resolve_missing_record_reports_not_found() {
        let pool = setup("apr_missing").await;
        let repo = SqlApprovalRepository::new(pool);

        let outcome = repo
            .resolve_if_pending(
                &ApprovalId("APR-MISSING".to_string()),
                &approve_resolution(),
                Utc::now(),
            )
            .await
            .expect("resolve");

        assert_eq!(outcome, ResolveOutcome::NotFound);
    }

    #[tokio::test]
    async fn pending_lookup_ignores_resolved_requests() {
        let pool = setup("apr_pending_lookup").await;
        let repo = SqlApprovalRepository::new(pool);
        let report_id = MonthlyReportId("MR-1".to_string());

        repo.create(pending_approval("APR-001")).await.expect("create");
        assert!(repo
            .find_pending_for_report(&report_id)
            .await
            .expect("lookup")
            .is_some());

        repo.resolve_if_pending(
            &ApprovalId("APR-001".to_string()),
            &reject_resolution("missing daily reports"),
            Utc::now(),
        )
        .await
        .expect("resolve");

        assert!(repo
            .find_pending_for_report(&report_id)
            .await
            .expect("lookup after resolve")
            .is_none());
    }

    #[tokio::test]
    async fn list_for_approver_filters_by_status() {
        let pool = setup("apr_list_filter").await;
        let repo = SqlApprovalRepository::new(pool);

        repo.create(pending_approval("APR-001")).await.expect("create 1");
        repo.create(pending_approval("APR-002")).await.expect("create 2");
        repo.resolve_if_pending(
            &ApprovalId("APR-002".to_string()),
            &approve_resolution(),
            Utc::now(),
        )
        .await
        .expect("resolve");

        let approver = UserId("u-manager".to_string());
        let pending = repo
            .list_for_approver(&approver, Some(ApprovalStatus::Pending), 50)
            .await
            .expect("list pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.0, "APR-001");

        let all = repo.list_for_approver(&approver, None, 50).await.expect("list all");
        assert_eq!(all.len(), 2);
    }
}
