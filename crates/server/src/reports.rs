//! Daily toolbox-meeting reports and monthly report submission.
//!
//! JSON API Endpoints:
//! - `POST /api/v1/reports/daily`                — file a checklist for a team/day
//! - `GET  /api/v1/reports/daily/{id}`           — single report with items
//! - `GET  /api/v1/reports/daily?team=&month=`   — a team's reports for one month
//! - `POST /api/v1/reports/monthly`              — submit a monthly report
//! - `GET  /api/v1/reports/monthly/{id}`         — report with computed summary

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use safework_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use safework_core::domain::report::{
    DailyReport, DailyReportId, DailyReportItem, MonthlyReport, MonthlyReportId, ReportPeriod,
};
use safework_core::domain::user::TeamId;
use safework_db::repositories::{
    ReportRepository, RepositoryError, SqlReportRepository,
};
use safework_db::DbPool;

use crate::api::{db_failure, failure, new_entity_id, record_audit_event, ApiFailure};
use crate::auth::authenticate;

#[derive(Clone)]
pub struct ReportsState {
    db_pool: DbPool,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DailyItemBody {
    pub label: String,
    #[serde(default)]
    pub checked: bool,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDailyBody {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub report_date: String,
    #[serde(default)]
    pub attendee_count: u32,
    pub risk_notes: Option<String>,
    #[serde(default)]
    pub items: Vec<DailyItemBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMonthlyBody {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub period: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct DailyListQuery {
    pub team: Option<String>,
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyItemResponse {
    pub label: String,
    pub checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportResponse {
    pub id: String,
    pub team_id: String,
    pub report_date: String,
    pub attendee_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_notes: Option<String>,
    pub items: Vec<DailyItemResponse>,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReportResponse {
    pub id: String,
    pub team_id: String,
    pub period: String,
    pub submitted_by: String,
    pub created_at: String,
    pub daily_report_count: u32,
    pub attendee_total: u32,
    pub item_count: u32,
    pub checked_item_count: u32,
}

#[derive(Debug, Serialize)]
pub struct DailyListResponse {
    pub reports: Vec<DailyReportResponse>,
}

fn daily_response(report: &DailyReport) -> DailyReportResponse {
    DailyReportResponse {
        id: report.id.0.clone(),
        team_id: report.team_id.0.clone(),
        report_date: report.report_date.format("%Y-%m-%d").to_string(),
        attendee_count: report.attendee_count,
        risk_notes: report.risk_notes.clone(),
        items: report
            .items
            .iter()
            .map(|item| DailyItemResponse {
                label: item.label.clone(),
                checked: item.checked,
                note: item.note.clone(),
            })
            .collect(),
        created_by: report.created_by.0.clone(),
        created_at: report.created_at.to_rfc3339(),
    }
}

/// 409 when the unique (team, date) / (team, period) constraint trips,
/// 503 for any other storage failure.
fn create_failure(error: RepositoryError, conflict_message: &str) -> ApiFailure {
    if let RepositoryError::Database(sqlx::Error::Database(ref db_error)) = error {
        if db_error.is_unique_violation() {
            return failure(StatusCode::CONFLICT, "duplicate", conflict_message);
        }
    }
    db_failure(error)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/v1/reports/daily", post(create_daily).get(list_daily))
        .route("/api/v1/reports/daily/{id}", get(get_daily))
        .route("/api/v1/reports/monthly", post(create_monthly))
        .route("/api/v1/reports/monthly/{id}", get(get_monthly))
        .with_state(ReportsState { db_pool })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_daily(
    headers: HeaderMap,
    State(state): State<ReportsState>,
    Json(body): Json<CreateDailyBody>,
) -> Result<(StatusCode, Json<DailyReportResponse>), ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;

    let team_id = body.team_id.trim();
    if team_id.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "validation", "teamId is required"));
    }

    let report_date = NaiveDate::parse_from_str(body.report_date.trim(), "%Y-%m-%d")
        .map_err(|_| {
            failure(
                StatusCode::BAD_REQUEST,
                "validation",
                "reportDate must be a YYYY-MM-DD date",
            )
        })?;

    let items: Vec<DailyReportItem> = body
        .items
        .into_iter()
        .map(|item| DailyReportItem {
            label: item.label.trim().to_string(),
            checked: item.checked,
            note: item.note,
        })
        .collect();
    if items.iter().any(|item| item.label.is_empty()) {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "validation",
            "checklist item labels must not be blank",
        ));
    }

    let now = Utc::now();
    let report = DailyReport {
        id: DailyReportId(new_entity_id("DR")),
        team_id: TeamId(team_id.to_string()),
        report_date,
        attendee_count: body.attendee_count,
        risk_notes: body.risk_notes.filter(|notes| !notes.trim().is_empty()),
        items,
        created_by: user.id.clone(),
        created_at: now,
        updated_at: now,
    };

    let repo = SqlReportRepository::new(state.db_pool.clone());
    repo.create_daily(report.clone()).await.map_err(|error| {
        create_failure(error, "a report for this team and date already exists")
    })?;

    info!(
        event_name = "report.daily_filed",
        correlation_id = %report.id.0,
        team_id = %report.team_id.0,
        report_date = %report.report_date,
        actor = %user.id.0,
        "daily report filed"
    );

    Ok((StatusCode::CREATED, Json(daily_response(&report))))
}

async fn get_daily(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<ReportsState>,
) -> Result<Json<DailyReportResponse>, ApiFailure> {
    authenticate(&state.db_pool, &headers).await?;

    let repo = SqlReportRepository::new(state.db_pool.clone());
    let report = repo
        .find_daily_by_id(&DailyReportId(id))
        .await
        .map_err(db_failure)?
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "not_found", "daily report not found"))?;

    Ok(Json(daily_response(&report)))
}

async fn list_daily(
    Query(query): Query<DailyListQuery>,
    headers: HeaderMap,
    State(state): State<ReportsState>,
) -> Result<Json<DailyListResponse>, ApiFailure> {
    authenticate(&state.db_pool, &headers).await?;

    let Some(team) = query.team.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        return Err(failure(StatusCode::BAD_REQUEST, "validation", "team query is required"));
    };
    let Some(month) = query.month.as_deref() else {
        return Err(failure(StatusCode::BAD_REQUEST, "validation", "month query is required"));
    };
    let period = ReportPeriod::parse(month)
        .map_err(|err| failure(StatusCode::BAD_REQUEST, "validation", err.to_string()))?;

    let repo = SqlReportRepository::new(state.db_pool.clone());
    let reports = repo
        .list_daily_for_period(&TeamId(team.to_string()), &period)
        .await
        .map_err(db_failure)?;

    Ok(Json(DailyListResponse { reports: reports.iter().map(daily_response).collect() }))
}

async fn create_monthly(
    headers: HeaderMap,
    State(state): State<ReportsState>,
    Json(body): Json<CreateMonthlyBody>,
) -> Result<(StatusCode, Json<MonthlyReportResponse>), ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;

    let team_id = body.team_id.trim();
    if team_id.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "validation", "teamId is required"));
    }
    let period = ReportPeriod::parse(&body.period)
        .map_err(|err| failure(StatusCode::BAD_REQUEST, "validation", err.to_string()))?;

    let now = Utc::now();
    let report = MonthlyReport {
        id: MonthlyReportId(new_entity_id("MR")),
        team_id: TeamId(team_id.to_string()),
        period,
        submitted_by: user.id.clone(),
        created_at: now,
        updated_at: now,
    };

    let repo = SqlReportRepository::new(state.db_pool.clone());
    repo.create_monthly(report.clone()).await.map_err(|error| {
        create_failure(error, "a monthly report for this team and period already exists")
    })?;
    let summary = repo.monthly_summary(&report).await.map_err(db_failure)?;

    record_audit_event(
        &state.db_pool,
        AuditEvent::new(
            Some(report.id.clone()),
            report.id.0.clone(),
            "report.monthly_submitted",
            AuditCategory::Report,
            user.id.0.clone(),
            AuditOutcome::Success,
        )
        .with_metadata("team_id", report.team_id.0.clone())
        .with_metadata("period", report.period.0.clone()),
    )
    .await;

    info!(
        event_name = "report.monthly_submitted",
        correlation_id = %report.id.0,
        team_id = %report.team_id.0,
        period = %report.period.0,
        actor = %user.id.0,
        "monthly report submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(MonthlyReportResponse {
            id: report.id.0,
            team_id: report.team_id.0,
            period: report.period.0,
            submitted_by: report.submitted_by.0,
            created_at: report.created_at.to_rfc3339(),
            daily_report_count: summary.daily_report_count,
            attendee_total: summary.attendee_total,
            item_count: summary.item_count,
            checked_item_count: summary.checked_item_count,
        }),
    ))
}

async fn get_monthly(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<ReportsState>,
) -> Result<Json<MonthlyReportResponse>, ApiFailure> {
    authenticate(&state.db_pool, &headers).await?;

    let repo = SqlReportRepository::new(state.db_pool.clone());
    let report = repo
        .find_monthly_by_id(&MonthlyReportId(id))
        .await
        .map_err(db_failure)?
        .ok_or_else(|| {
            failure(StatusCode::NOT_FOUND, "not_found", "monthly report not found")
        })?;
    let summary = repo.monthly_summary(&report).await.map_err(db_failure)?;

    Ok(Json(MonthlyReportResponse {
        id: report.id.0,
        team_id: report.team_id.0,
        period: report.period.0,
        submitted_by: report.submitted_by.0,
        created_at: report.created_at.to_rfc3339(),
        daily_report_count: summary.daily_report_count,
        attendee_total: summary.attendee_total,
        item_count: summary.item_count,
        checked_item_count: summary.checked_item_count,
    }))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query, State};
    use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
    use axum::Json;
    use chrono::Utc;

    use safework_db::{connect_with_settings, migrations};

    use super::*;

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
             VALUES ('u-foreman', 'Ha-eun Choi', 'haeun.choi@example.com', 'worker', 't-1', ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .expect("seed user");
        sqlx::query(
            "INSERT INTO user_session (token, user_id, expires_at, created_at)
             VALUES ('tok-foreman', 'u-foreman', '2027-01-01T00:00:00+00:00', ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .expect("seed session");

        pool
    }

    fn state(pool: sqlx::SqlitePool) -> State<ReportsState> {
        State(ReportsState { db_pool: pool })
    }

    fn auth_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-foreman"));
        headers
    }

    fn daily_body(date: &str) -> CreateDailyBody {
        CreateDailyBody {
            team_id: "t-1".to_string(),
            report_date: date.to_string(),
            attendee_count: 6,
            risk_notes: Some("overhead crane active".to_string()),
            items: vec![
                DailyItemBody {
                    label: "PPE check complete".to_string(),
                    checked: true,
                    note: None,
                },
                DailyItemBody {
                    label: "Exits clear".to_string(),
                    checked: false,
                    note: Some("pallets blocking door B".to_string()),
                },
            ],
        }
    }

    #[tokio::test]
    async fn create_daily_then_fetch_round_trip() {
        let pool = setup().await;

        let (status, Json(created)) =
            create_daily(auth_headers(), state(pool.clone()), Json(daily_body("2026-07-06")))
                .await
                .expect("create");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.items.len(), 2);

        let Json(fetched) =
            get_daily(Path(created.id.clone()), auth_headers(), state(pool))
                .await
                .expect("fetch");
        assert_eq!(fetched.report_date, "2026-07-06");
        assert_eq!(fetched.items[1].note.as_deref(), Some("pallets blocking door B"));
    }

    #[tokio::test]
    async fn duplicate_daily_for_same_day_conflicts() {
        let pool = setup().await;

        create_daily(auth_headers(), state(pool.clone()), Json(daily_body("2026-07-06")))
            .await
            .expect("first create");

        let (status, Json(body)) =
            create_daily(auth_headers(), state(pool), Json(daily_body("2026-07-06")))
                .await
                .expect_err("second create must conflict");
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "duplicate");
    }

    #[tokio::test]
    async fn create_daily_rejects_bad_dates_and_blank_labels() {
        let pool = setup().await;

        let (status, _) = create_daily(auth_headers(), state(pool.clone()), Json(daily_body("06/07/2026")))
            .await
            .expect_err("bad date must fail");
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut blank_label = daily_body("2026-07-06");
        blank_label.items[0].label = "  ".to_string();
        let (status, _) = create_daily(auth_headers(), state(pool), Json(blank_label))
            .await
            .expect_err("blank label must fail");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn monthly_report_carries_the_period_summary() {
        let pool = setup().await;

        create_daily(auth_headers(), state(pool.clone()), Json(daily_body("2026-07-06")))
            .await
            .expect("daily 1");
        create_daily(auth_headers(), state(pool.clone()), Json(daily_body("2026-07-07")))
            .await
            .expect("daily 2");

        let (status, Json(monthly)) = create_monthly(
            auth_headers(),
            state(pool.clone()),
            Json(CreateMonthlyBody { team_id: "t-1".to_string(), period: "2026-07".to_string() }),
        )
        .await
        .expect("create monthly");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(monthly.daily_report_count, 2);
        assert_eq!(monthly.attendee_total, 12);
        assert_eq!(monthly.checked_item_count, 2);

        let Json(fetched) =
            get_monthly(Path(monthly.id.clone()), auth_headers(), state(pool.clone()))
                .await
                .expect("fetch monthly");
        assert_eq!(fetched.period, "2026-07");

        let (status, _) = create_monthly(
            auth_headers(),
            state(pool),
            Json(CreateMonthlyBody { team_id: "t-1".to_string(), period: "2026-07".to_string() }),
        )
        .await
        .expect_err("duplicate period must conflict");
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn daily_listing_requires_team_and_valid_month() {
        let pool = setup().await;

        create_daily(auth_headers(), state(pool.clone()), Json(daily_body("2026-07-06")))
            .await
            .expect("create");

        let Json(listed) = list_daily(
            Query(DailyListQuery {
                team: Some("t-1".to_string()),
                month: Some("2026-07".to_string()),
            }),
            auth_headers(),
            state(pool.clone()),
        )
        .await
        .expect("list");
        assert_eq!(listed.reports.len(), 1);

        let (status, _) = list_daily(
            Query(DailyListQuery { team: Some("t-1".to_string()), month: Some("July".to_string()) }),
            auth_headers(),
            state(pool.clone()),
        )
        .await
        .expect_err("bad month must fail");
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = list_daily(
            Query(DailyListQuery::default()),
            auth_headers(),
            state(pool),
        )
        .await
        .expect_err("missing team must fail");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unauthenticated_requests_are_refused() {
        let pool = setup().await;

        let (status, _) = create_daily(
            HeaderMap::new(),
            state(pool),
            Json(daily_body("2026-07-06")),
        )
        .await
        .expect_err("no session must fail");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
