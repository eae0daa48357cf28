use chrono::NaiveDate;
use sqlx::Row;
use uuid::Uuid;

use safework_core::domain::report::{
    DailyReport, DailyReportId, DailyReportItem, MonthlyReport, MonthlyReportId, MonthlySummary,
    ReportPeriod,
};
use safework_core::domain::user::{TeamId, UserId};

use super::{parse_timestamp, ReportRepository, RepositoryError};
use crate::DbPool;

pub struct SqlReportRepository {
    pool: DbPool,
}

impl SqlReportRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, report_id: &str) -> Result<Vec<DailyReportItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT label, checked, note FROM daily_report_item
             WHERE report_id = ? ORDER BY position ASC",
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
                Ok(DailyReportItem {
                    label: row.try_get("label").map_err(decode)?,
                    checked: row.try_get::<i64, _>("checked").map_err(decode)? != 0,
                    note: row.try_get("note").map_err(decode)?,
                })
            })
            .collect()
    }
}

fn parse_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| RepositoryError::Decode(format!("bad date in `{column}`: {err}")))
}

fn row_to_daily_header(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<DailyReport, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let team_id: String = row.try_get("team_id").map_err(decode)?;
    let report_date: String = row.try_get("report_date").map_err(decode)?;
    let attendee_count: i64 = row.try_get("attendee_count").map_err(decode)?;
    let risk_notes: Option<String> = row.try_get("risk_notes").map_err(decode)?;
    let created_by: String = row.try_get("created_by").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode)?;

    Ok(DailyReport {
        id: DailyReportId(id),
        team_id: TeamId(team_id),
        report_date: parse_date("report_date", &report_date)?,
        attendee_count: u32::try_from(attendee_count.max(0)).unwrap_or(0),
        risk_notes,
        items: Vec::new(),
        created_by: UserId(created_by),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_monthly(row: &sqlx::sqlite::SqliteRow) -> Result<MonthlyReport, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let team_id: String = row.try_get("team_id").map_err(decode)?;
    let period: String = row.try_get("period").map_err(decode)?;
    let submitted_by: String = row.try_get("submitted_by").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode)?;

    Ok(MonthlyReport {
        id: MonthlyReportId(id),
        team_id: TeamId(team_id),
        period: ReportPeriod(period),
        submitted_by: UserId(submitted_by),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl ReportRepository for SqlReportRepository {
    async fn create_daily(&self, report: DailyReport) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO daily_report
                (id, team_id, report_date, attendee_count, risk_notes,
                 created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&report.id.0)
        .bind(&report.team_id.0)
        .bind(report.report_date.format("%Y-%m-%d").to_string())
        .bind(i64::from(report.attendee_count))
        .bind(&report.risk_notes)
        .bind(&report.created_by.0)
        .bind(report.created_at.to_rfc3339())
        .bind(report.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, item) in report.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO daily_report_item (id, report_id, position, label, checked, note)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().simple().to_string())
            .bind(&report.id.0)
            .bind(position as i64)
            .bind(&item.label)
            .bind(i64::from(item.checked))
            .bind(&item.note)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_daily_by_id(
        &self,
        id: &DailyReportId,
    ) -> Result<Option<DailyReport>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, team_id, report_date, attendee_count, risk_notes,
                    created_by, created_at, updated_at
             FROM daily_report WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut report = row_to_daily_header(&row)?;
        report.items = self.load_items(&report.id.0).await?;
        Ok(Some(report))
    }

    async fn list_daily_for_period(
        &self,
        team_id: &TeamId,
        period: &ReportPeriod,
    ) -> Result<Vec<DailyReport>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, team_id, report_date, attendee_count, risk_notes,
                    created_by, created_at, updated_at
             FROM daily_report
             WHERE team_id = ? AND report_date LIKE ?
             ORDER BY report_date ASC",
        )
        .bind(&team_id.0)
        .bind(format!("{}-%", period.0))
        .fetch_all(&self.pool)
        .await?;

        let mut reports = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut report = row_to_daily_header(row)?;
            report.items = self.load_items(&report.id.0).await?;
            reports.push(report);
        }
        Ok(reports)
    }

    async fn create_monthly(&self, report: MonthlyReport) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO monthly_report (id, team_id, period, submitted_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&report.id.0)
        .bind(&report.team_id.0)
        .bind(&report.period.0)
        .bind(&report.submitted_by.0)
        .bind(report.created_at.to_rfc3339())
        .bind(report.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_monthly_by_id(
        &self,
        id: &MonthlyReportId,
    ) -> Result<Option<MonthlyReport>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, team_id, period, submitted_by, created_at, updated_at
             FROM monthly_report WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_monthly(r)?)),
            None => Ok(None),
        }
    }

    async fn find_monthly_by_period(
        &self,
        team_id: &TeamId,
        period: &ReportPeriod,
    ) -> Result<Option<MonthlyReport>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, team_id, period, submitted_by, created_at, updated_at
             FROM monthly_report WHERE team_id = ? AND period = ?",
        )
        .bind(&team_id.0)
        .bind(&period.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_monthly(r)?)),
            None => Ok(None),
        }
    }

    async fn monthly_summary(
        &self,
        report: &MonthlyReport,
    ) -> Result<MonthlySummary, RepositoryError> {
        let date_pattern = format!("{}-%", report.period.0);
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM daily_report
                  WHERE team_id = ?1 AND report_date LIKE ?2) AS daily_count,
                (SELECT COALESCE(SUM(attendee_count), 0) FROM daily_report
                  WHERE team_id = ?1 AND report_date LIKE ?2) AS attendee_total,
                (SELECT COUNT(*) FROM daily_report_item i
                  JOIN daily_report d ON i.report_id = d.id
                  WHERE d.team_id = ?1 AND d.report_date LIKE ?2) AS item_count,
                (SELECT COALESCE(SUM(i.checked), 0) FROM daily_report_item i
                  JOIN daily_report d ON i.report_id = d.id
                  WHERE d.team_id = ?1 AND d.report_date LIKE ?2) AS checked_count",
        )
        .bind(&report.team_id.0)
        .bind(&date_pattern)
        .fetch_one(&self.pool)
        .await?;

        let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
        let daily_count: i64 = row.try_get("daily_count").map_err(decode)?;
        let attendee_total: i64 = row.try_get("attendee_total").map_err(decode)?;
        let item_count: i64 = row.try_get("item_count").map_err(decode)?;
        let checked_count: i64 = row.try_get("checked_count").map_err(decode)?;

        Ok(MonthlySummary {
            daily_report_count: u32::try_from(daily_count.max(0)).unwrap_or(0),
            attendee_total: u32::try_from(attendee_total.max(0)).unwrap_or(0),
            item_count: u32::try_from(item_count.max(0)).unwrap_or(0),
            checked_item_count: u32::try_from(checked_count.max(0)).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use safework_core::domain::report::{
        DailyReport, DailyReportId, DailyReportItem, MonthlyReport, MonthlyReportId, ReportPeriod,
    };
    use safework_core::domain::user::{TeamId, UserId};

    use super::SqlReportRepository;
    use crate::repositories::ReportRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO team (id, name, site, created_at) VALUES ('t-1', 'Alpha Crew', 'North Yard', ?)")
            .bind(&now)
            .execute(&pool)
            .await
            .expect("seed team");
        sqlx::query(
            "INSERT INTO app_user (id, name, email, role, team_id, created_at)
             VALUES ('u-foreman', 'Foreman', 'foreman@example.com', 'worker', 't-1', ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .expect("seed user");

        pool
    }

    fn daily(id: &str, day: u32, checked: bool) -> DailyReport {
        let now = Utc::now();
        DailyReport {
            id: DailyReportId(id.to_string()),
            team_id: TeamId("t-1".to_string()),
            report_date: NaiveDate::from_ymd_opt(2026, 7, day).expect("valid date"),
            attendee_count: 7,
            risk_notes: Some("crane lift near the east wall".to_string()),
            items: vec![
                DailyReportItem {
                    label: "PPE check complete".to_string(),
                    checked: true,
                    note: None,
                },
                DailyReportItem {
                    label: "Work area barricaded".to_string(),
                    checked,
                    note: checked.then(|| "tape refreshed".to_string()),
                },
            ],
            created_by: UserId("u-foreman".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn monthly(id: &str) -> MonthlyReport {
        let now = Utc::now();
        MonthlyReport {
            id: MonthlyReportId(id.to_string()),
            team_id: TeamId("t-1".to_string()),
            period: ReportPeriod("2026-07".to_string()),
            submitted_by: UserId("u-foreman".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn daily_round_trip_preserves_items_in_order() {
        let pool = setup().await;
        let repo = SqlReportRepository::new(pool);

        repo.create_daily(daily("DR-001", 6, true)).await.expect("create");
        let found = repo
            .find_daily_by_id(&DailyReportId("DR-001".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.items.len(), 2);
        assert_eq!(found.items[0].label, "PPE check complete");
        assert_eq!(found.items[1].note.as_deref(), Some("tape refreshed"));
        assert_eq!(found.attendee_count, 7);
    }

    #[tokio::test]
    async fn duplicate_team_date_is_rejected() {
        let pool = setup().await;
        let repo = SqlReportRepository::new(pool);

        repo.create_daily(daily("DR-001", 6, true)).await.expect("first create");
        let error = repo.create_daily(daily("DR-002", 6, false)).await;
        assert!(error.is_err(), "same team and date must violate uniqueness");
    }

    #[tokio::test]
    async fn period_listing_excludes_other_months() {
        let pool = setup().await;
        let repo = SqlReportRepository::new(pool);

        repo.create_daily(daily("DR-001", 6, true)).await.expect("create 1");
        repo.create_daily(daily("DR-002", 7, false)).await.expect("create 2");

        let mut outside = daily("DR-003", 7, true);
        outside.report_date = NaiveDate::from_ymd_opt(2026, 8, 7).expect("valid date");
        repo.create_daily(outside).await.expect("create outside");

        let period = ReportPeriod("2026-07".to_string());
        let listed = repo
            .list_daily_for_period(&TeamId("t-1".to_string()), &period)
            .await
            .expect("list");

        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.report_date.format("%Y-%m").to_string() == "2026-07"));
    }

    #[tokio::test]
    async fn monthly_round_trip_and_duplicate_period() {
        let pool = setup().await;
        let repo = SqlReportRepository::new(pool);

        repo.create_monthly(monthly("MR-001")).await.expect("create");
        let found = repo
            .find_monthly_by_period(
                &TeamId("t-1".to_string()),
                &ReportPeriod("2026-07".to_string()),
            )
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.id.0, "MR-001");

        let duplicate = repo.create_monthly(monthly("MR-002")).await;
        assert!(duplicate.is_err(), "same team and period must violate uniqueness");
    }

    #[tokio::test]
    async fn summary_aggregates_the_period() {
        let pool = setup().await;
        let repo = SqlReportRepository::new(pool);

        repo.create_daily(daily("DR-001", 6, true)).await.expect("create 1");
        repo.create_daily(daily("DR-002", 7, false)).await.expect("create 2");
        repo.create_monthly(monthly("MR-001")).await.expect("create monthly");

        let report = repo
            .find_monthly_by_id(&MonthlyReportId("MR-001".to_string()))
            .await
            .expect("find")
            .expect("exists");
        let summary = repo.monthly_summary(&report).await.expect("summary");

        assert_eq!(summary.daily_report_count, 2);
        assert_eq!(summary.attendee_total, 14);
        assert_eq!(summary.item_count, 4);
        assert_eq!(summary.checked_item_count, 3);
    }
}
