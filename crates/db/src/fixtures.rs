use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic demo dataset: one crew, a month of toolbox-meeting
/// reports, and one monthly report in each approval state (pending,
/// approved, rejected). Loading is idempotent; every row has a fixed id.
struct SeedUser {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    role: &'static str,
    session_token: &'static str,
}

const SEED_TEAM_ID: &str = "team-alpha";

const SEED_USERS: &[SeedUser] = &[
    SeedUser {
        id: "user-admin",
        name: "Dana Park",
        email: "dana.park@example.com",
        role: "admin",
        session_token: "seed-token-admin",
    },
    SeedUser {
        id: "user-manager",
        name: "Miguel Santos",
        email: "miguel.santos@example.com",
        role: "manager",
        session_token: "seed-token-manager",
    },
    SeedUser {
        id: "user-foreman",
        name: "Ha-eun Choi",
        email: "haeun.choi@example.com",
        role: "worker",
        session_token: "seed-token-foreman",
    },
    SeedUser {
        id: "user-worker",
        name: "Lena Novak",
        email: "lena.novak@example.com",
        role: "worker",
        session_token: "seed-token-worker",
    },
];

/// (monthly report id, period, approval id, status, signature / reason)
const SEED_APPROVAL_FLOWS: &[(&str, &str, &str, &str)] = &[
    ("report-2026-05", "2026-05", "approval-approved", "approved"),
    ("report-2026-06", "2026-06", "approval-rejected", "rejected"),
    ("report-2026-07", "2026-07", "approval-pending", "pending"),
];

const SEED_DAILY_DAYS: &[&str] = &["2026-07-01", "2026-07-02", "2026-07-03"];

const SEED_NOTICE_IDS: &[&str] = &["notice-drill", "notice-parking"];

const SEED_EDUCATION_SESSION_ID: &str = "edu-confined-space";

const SEED_TIMESTAMP: &str = "2026-07-04T08:00:00+00:00";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub users: u32,
    pub daily_reports: u32,
    pub monthly_reports: u32,
    pub approvals: u32,
    pub notices: u32,
    pub education_sessions: u32,
}

#[derive(Clone, Debug, Default)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct SeedDataset;

impl SeedDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let now = SEED_TIMESTAMP;

        sqlx::query(
            "INSERT OR IGNORE INTO team (id, name, site, created_at)
             VALUES (?, 'Alpha Crew', 'North Yard', ?)",
        )
        .bind(SEED_TEAM_ID)
        .bind(now)
        .execute(pool)
        .await?;

        for user in SEED_USERS {
            sqlx::query(
                "INSERT OR IGNORE INTO app_user (id, name, email, role, team_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(user.id)
            .bind(user.name)
            .bind(user.email)
            .bind(user.role)
            .bind(SEED_TEAM_ID)
            .bind(now)
            .execute(pool)
            .await?;

            // Long-lived local sessions so seeded identities work from curl.
            sqlx::query(
                "INSERT OR IGNORE INTO user_session (token, user_id, expires_at, created_at)
                 VALUES (?, ?, '2027-01-01T00:00:00+00:00', ?)",
            )
            .bind(user.session_token)
            .bind(user.id)
            .bind(now)
            .execute(pool)
            .await?;
        }

        for (index, day) in SEED_DAILY_DAYS.iter().enumerate() {
            let report_id = format!("daily-{day}");
            sqlx::query(
                "INSERT OR IGNORE INTO daily_report
                    (id, team_id, report_date, attendee_count, risk_notes,
                     created_by, created_at, updated_at)
                 VALUES (?, ?, ?, ?, 'Scaffold work on the east face', 'user-foreman', ?, ?)",
            )
            .bind(&report_id)
            .bind(SEED_TEAM_ID)
            .bind(day)
            .bind(6 + index as i64)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;

            let items: [(&str, i64); 3] = [
                ("PPE check complete", 1),
                ("Work permits posted", 1),
                ("Emergency exits clear", i64::from(index != 1)),
            ];
            for (position, (label, checked)) in items.into_iter().enumerate() {
                sqlx::query(
                    "INSERT OR IGNORE INTO daily_report_item
                        (id, report_id, position, label, checked, note)
                     VALUES (?, ?, ?, ?, ?, NULL)",
                )
                .bind(format!("{report_id}-item-{position}"))
                .bind(&report_id)
                .bind(position as i64)
                .bind(label)
                .bind(checked)
                .execute(pool)
                .await?;
            }
        }

        for &(report_id, period, approval_id, status) in SEED_APPROVAL_FLOWS {
            sqlx::query(
                "INSERT OR IGNORE INTO monthly_report
                    (id, team_id, period, submitted_by, created_at, updated_at)
                 VALUES (?, ?, ?, 'user-foreman', ?, ?)",
            )
            .bind(report_id)
            .bind(SEED_TEAM_ID)
            .bind(period)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;

            let (signature, reason, resolved_at) = match status {
                "approved" => (Some("data:image/png;base64,c2VlZA=="), None, Some(now)),
                "rejected" => (None, Some("Two daily reports are missing"), Some(now)),
                _ => (None, None, None),
            };

            sqlx::query(
                "INSERT OR IGNORE INTO approval_request
                    (id, monthly_report_id, requester_id, approver_id, status,
                     signature_image, rejection_reason, requested_at, resolved_at, updated_at)
                 VALUES (?, ?, 'user-foreman', 'user-manager', ?, ?, ?, ?, ?, ?)",
            )
            .bind(approval_id)
            .bind(report_id)
            .bind(status)
            .bind(signature)
            .bind(reason)
            .bind(now)
            .bind(resolved_at)
            .bind(now)
            .execute(pool)
            .await?;
        }

        let notices: &[(&str, &str, &str, i64)] = &[
            ("notice-drill", "Evacuation drill Friday 10:00", "Assemble at muster point B.", 1),
            ("notice-parking", "North lot closed next week", "Use the overflow lot on Hill St.", 0),
        ];
        for &(id, title, body, pinned) in notices {
            sqlx::query(
                "INSERT OR IGNORE INTO notice
                    (id, title, body, pinned, author_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?, 'user-admin', ?, ?)",
            )
            .bind(id)
            .bind(title)
            .bind(body)
            .bind(pinned)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;
        }

        sqlx::query(
            "INSERT OR IGNORE INTO education_session
                (id, topic, description, held_on, instructor, created_at)
             VALUES (?, 'Confined space entry', 'Annual refresher', '2026-07-10', 'K. Reyes', ?)",
        )
        .bind(SEED_EDUCATION_SESSION_ID)
        .bind(now)
        .execute(pool)
        .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO education_record (session_id, user_id, completed_at)
             VALUES (?, 'user-foreman', ?)",
        )
        .bind(SEED_EDUCATION_SESSION_ID)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(SeedResult {
            users: SEED_USERS.len() as u32,
            daily_reports: SEED_DAILY_DAYS.len() as u32,
            monthly_reports: SEED_APPROVAL_FLOWS.len() as u32,
            approvals: SEED_APPROVAL_FLOWS.len() as u32,
            notices: SEED_NOTICE_IDS.len() as u32,
            education_sessions: 1,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks: Vec<(&'static str, bool)> = Vec::new();

        let user_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM app_user WHERE id IN
             ('user-admin', 'user-manager', 'user-foreman', 'user-worker')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("seed_users", user_count == SEED_USERS.len() as i64));

        let daily_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM daily_report WHERE team_id = ?")
                .bind(SEED_TEAM_ID)
                .fetch_one(pool)
                .await?;
        checks.push(("seed_daily_reports", daily_count >= SEED_DAILY_DAYS.len() as i64));

        for &(_, _, approval_id, status) in SEED_APPROVAL_FLOWS {
            let found: Option<String> =
                sqlx::query_scalar("SELECT status FROM approval_request WHERE id = ?")
                    .bind(approval_id)
                    .fetch_optional(pool)
                    .await?;
            let check_name: &'static str = match status {
                "approved" => "seed_approved_flow",
                "rejected" => "seed_rejected_flow",
                _ => "seed_pending_flow",
            };
            checks.push((check_name, found.as_deref() == Some(status)));
        }

        let notice_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notice WHERE id IN ('notice-drill', 'notice-parking')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("seed_notices", notice_count == SEED_NOTICE_IDS.len() as i64));

        let education_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM education_record WHERE session_id = ?")
                .bind(SEED_EDUCATION_SESSION_ID)
                .fetch_one(pool)
                .await?;
        checks.push(("seed_education", education_count >= 1));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}
