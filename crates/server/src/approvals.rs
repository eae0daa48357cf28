//! Approval workflow routes.
//!
//! JSON API Endpoints:
//! - `GET  /api/v1/approvals/{id}`                         — record + report summary
//! - `GET  /api/v1/approvals?status=pending`               — caller's approval queue
//! - `POST /api/v1/approvals/{id}/approve`                 — sign and approve
//! - `POST /api/v1/approvals/{id}/reject`                  — reject with reason
//! - `POST /api/v1/reports/monthly/{id}/request-approval`  — open a new request
//!
//! The terminal transition is validated by the pure policy in
//! `safework_core::approvals` and applied with the repository's
//! conditional update, so of two racing resolutions exactly one wins and
//! the loser sees a `409` carrying the record's actual state. Notification
//! dispatch happens after the commit on a detached task and never fails
//! the request.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{info, warn};

use safework_core::approvals::{authorize_resolution, authorize_view, ResolutionCommand};
use safework_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use safework_core::domain::approval::{
    ApprovalError, ApprovalId, ApprovalRequest, ApprovalStatus,
};
use safework_core::domain::report::MonthlyReportId;
use safework_core::domain::user::UserId;
use safework_db::repositories::{
    ApprovalRepository, ReportRepository, ResolveOutcome, SqlApprovalRepository,
    SqlReportRepository,
};
use safework_db::DbPool;
use safework_notify::{NotificationDispatcher, NotificationEvent};

use crate::api::{
    approval_failure, db_failure, failure, new_entity_id, record_audit_event, ApiFailure,
};
use crate::auth::{authenticate, AuthenticatedUser};

#[derive(Clone)]
pub struct ApprovalState {
    db_pool: DbPool,
    dispatcher: NotificationDispatcher,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    #[serde(rename = "signature", alias = "signatureImage", default)]
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    #[serde(rename = "rejectionReason", alias = "reason", default)]
    pub rejection_reason: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestApprovalBody {
    #[serde(rename = "approverId", default)]
    pub approver_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub id: String,
    pub status: &'static str,
    pub monthly_report_id: String,
    pub requester_id: String,
    pub approver_id: String,
    pub requested_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyResponse {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummaryResponse {
    pub id: String,
    pub period: String,
    pub daily_report_count: u32,
    pub attendee_total: u32,
    pub item_count: u32,
    pub checked_item_count: u32,
}

#[derive(Debug, Serialize)]
pub struct ApprovalDetailResponse {
    #[serde(flatten)]
    pub approval: ApprovalResponse,
    #[serde(rename = "monthlyReport")]
    pub monthly_report: ReportSummaryResponse,
    pub requester: PartyResponse,
    pub approver: PartyResponse,
}

#[derive(Debug, Serialize)]
pub struct ApprovalListResponse {
    pub approvals: Vec<ApprovalResponse>,
}

fn approval_response(record: &ApprovalRequest) -> ApprovalResponse {
    ApprovalResponse {
        id: record.id.0.clone(),
        status: record.status.as_str(),
        monthly_report_id: record.monthly_report_id.0.clone(),
        requester_id: record.requester_id.0.clone(),
        approver_id: record.approver_id.0.clone(),
        requested_at: record.requested_at.to_rfc3339(),
        resolved_at: record.resolved_at.map(|dt| dt.to_rfc3339()),
        rejection_reason: record.rejection_reason.clone(),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(db_pool: DbPool, dispatcher: NotificationDispatcher) -> Router {
    Router::new()
        .route("/api/v1/approvals", get(list_approvals))
        .route("/api/v1/approvals/{id}", get(get_approval))
        .route("/api/v1/approvals/{id}/approve", post(approve))
        .route("/api/v1/approvals/{id}/reject", post(reject))
        .route("/api/v1/reports/monthly/{id}/request-approval", post(request_approval))
        .with_state(ApprovalState { db_pool, dispatcher })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_approval(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<ApprovalState>,
) -> Result<Json<ApprovalDetailResponse>, ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;

    let repo = SqlApprovalRepository::new(state.db_pool.clone());
    let record = repo
        .find_by_id(&ApprovalId(id))
        .await
        .map_err(db_failure)?
        .ok_or_else(|| approval_failure(ApprovalError::NotFound))?;

    authorize_view(&record, &user.id).map_err(approval_failure)?;

    let reports = SqlReportRepository::new(state.db_pool.clone());
    let report = reports
        .find_monthly_by_id(&record.monthly_report_id)
        .await
        .map_err(db_failure)?
        .ok_or_else(|| approval_failure(ApprovalError::NotFound))?;
    let summary = reports.monthly_summary(&report).await.map_err(db_failure)?;

    let requester = load_party(&state.db_pool, &record.requester_id.0).await?;
    let approver = load_party(&state.db_pool, &record.approver_id.0).await?;

    Ok(Json(ApprovalDetailResponse {
        approval: approval_response(&record),
        monthly_report: ReportSummaryResponse {
            id: report.id.0,
            period: report.period.0,
            daily_report_count: summary.daily_report_count,
            attendee_total: summary.attendee_total,
            item_count: summary.item_count,
            checked_item_count: summary.checked_item_count,
        },
        requester,
        approver,
    }))
}

async fn list_approvals(
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
    State(state): State<ApprovalState>,
) -> Result<Json<ApprovalListResponse>, ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some("pending") => Some(ApprovalStatus::Pending),
        Some("approved") => Some(ApprovalStatus::Approved),
        Some("rejected") => Some(ApprovalStatus::Rejected),
        Some(other) => {
            return Err(failure(
                StatusCode::BAD_REQUEST,
                "validation",
                format!("unknown status filter `{other}`"),
            ));
        }
    };

    let repo = SqlApprovalRepository::new(state.db_pool.clone());
    let records = repo.list_for_approver(&user.id, status, 100).await.map_err(db_failure)?;

    Ok(Json(ApprovalListResponse {
        approvals: records.iter().map(approval_response).collect(),
    }))
}

async fn approve(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<ApprovalState>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<ApprovalResponse>, ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;
    let command = ResolutionCommand::Approve { signature_image: body.signature };
    resolve(&state, &user, &id, command).await
}

async fn reject(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<ApprovalState>,
    Json(body): Json<RejectBody>,
) -> Result<Json<ApprovalResponse>, ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;
    let command = ResolutionCommand::Reject { reason: body.rejection_reason };
    resolve(&state, &user, &id, command).await
}

/// Shared resolution path: policy check, conditional update, audit write,
/// spawned notification.
async fn resolve(
    state: &ApprovalState,
    user: &AuthenticatedUser,
    id: &str,
    command: ResolutionCommand,
) -> Result<Json<ApprovalResponse>, ApiFailure> {
    let repo = SqlApprovalRepository::new(state.db_pool.clone());
    let record = repo
        .find_by_id(&ApprovalId(id.to_string()))
        .await
        .map_err(db_failure)?
        .ok_or_else(|| approval_failure(ApprovalError::NotFound))?;

    let resolution =
        authorize_resolution(&record, &user.id, command).map_err(approval_failure)?;

    let outcome = repo
        .resolve_if_pending(&record.id, &resolution, Utc::now())
        .await
        .map_err(db_failure)?;

    let updated = match outcome {
        ResolveOutcome::Applied(updated) => updated,
        // Lost the race after our pre-check: report the actual state.
        ResolveOutcome::AlreadyProcessed(current) => {
            return Err(approval_failure(ApprovalError::AlreadyProcessed {
                status: current.status,
            }));
        }
        ResolveOutcome::NotFound => return Err(approval_failure(ApprovalError::NotFound)),
    };

    let mut audit = AuditEvent::new(
        Some(updated.monthly_report_id.clone()),
        updated.id.0.clone(),
        "approval.resolved",
        AuditCategory::Approval,
        user.id.0.clone(),
        AuditOutcome::Success,
    )
    .with_metadata("status", updated.status.as_str());
    if let Some(reason) = &updated.rejection_reason {
        audit = audit.with_metadata("rejection_reason", reason.clone());
    }
    record_audit_event(&state.db_pool, audit).await;

    info!(
        event_name = "approval.resolved",
        correlation_id = %updated.id.0,
        report_id = %updated.monthly_report_id.0,
        status = updated.status.as_str(),
        actor = %user.id.0,
        "approval request resolved"
    );

    if let Some(event) = resolution_event(&state.db_pool, &updated, user).await {
        state.dispatcher.spawn(event);
    }

    Ok(Json(approval_response(&updated)))
}

async fn request_approval(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<ApprovalState>,
    Json(body): Json<RequestApprovalBody>,
) -> Result<(StatusCode, Json<ApprovalResponse>), ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;

    let reports = SqlReportRepository::new(state.db_pool.clone());
    let report = reports
        .find_monthly_by_id(&MonthlyReportId(id))
        .await
        .map_err(db_failure)?
        .ok_or_else(|| {
            failure(StatusCode::NOT_FOUND, "not_found", "monthly report not found")
        })?;

    let approver_id = body.approver_id.trim();
    if approver_id.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "validation", "approverId is required"));
    }

    let approver_row =
        sqlx::query("SELECT id, name, email FROM app_user WHERE id = ?")
            .bind(approver_id)
            .fetch_optional(&state.db_pool)
            .await
            .map_err(db_failure)?;
    let Some(approver_row) = approver_row else {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "validation",
            format!("unknown approver `{approver_id}`"),
        ));
    };

    let repo = SqlApprovalRepository::new(state.db_pool.clone());
    if let Some(pending) =
        repo.find_pending_for_report(&report.id).await.map_err(db_failure)?
    {
        let mut conflict = crate::api::ApiError::new(
            "already_requested",
            format!("approval request `{}` is already pending for this report", pending.id.0),
        );
        conflict.current_status = Some(pending.status.as_str());
        return Err((StatusCode::CONFLICT, Json(conflict)));
    }

    let now = Utc::now();
    let record = ApprovalRequest {
        id: ApprovalId(new_entity_id("APR")),
        monthly_report_id: report.id.clone(),
        requester_id: user.id.clone(),
        approver_id: UserId(approver_id.to_string()),
        status: ApprovalStatus::Pending,
        signature_image: None,
        rejection_reason: None,
        requested_at: now,
        resolved_at: None,
        updated_at: now,
    };
    repo.create(record.clone()).await.map_err(db_failure)?;

    record_audit_event(
        &state.db_pool,
        AuditEvent::new(
            Some(report.id.clone()),
            record.id.0.clone(),
            "approval.requested",
            AuditCategory::Approval,
            user.id.0.clone(),
            AuditOutcome::Success,
        )
        .with_metadata("approver", approver_id),
    )
    .await;

    info!(
        event_name = "approval.requested",
        correlation_id = %record.id.0,
        report_id = %report.id.0,
        actor = %user.id.0,
        approver = %approver_id,
        "approval request opened"
    );

    let approver_email: String = approver_row.try_get("email").unwrap_or_default();
    state.dispatcher.spawn(NotificationEvent::ApprovalRequested {
        approval_id: record.id.0.clone(),
        report_id: report.id.0.clone(),
        period: report.period.0.clone(),
        approver_email,
        requester_name: user.name.clone(),
    });

    Ok((StatusCode::CREATED, Json(approval_response(&record))))
}

// ---------------------------------------------------------------------------
// Lookups feeding responses and notifications
// ---------------------------------------------------------------------------

async fn load_party(pool: &DbPool, user_id: &str) -> Result<PartyResponse, ApiFailure> {
    let name: Option<String> = sqlx::query_scalar("SELECT name FROM app_user WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(db_failure)?;

    Ok(PartyResponse {
        id: user_id.to_string(),
        name: name.unwrap_or_else(|| user_id.to_string()),
    })
}

/// Build the post-commit notification. Any lookup failure only costs the
/// notification, never the transition, so errors degrade to `None`.
async fn resolution_event(
    pool: &DbPool,
    record: &ApprovalRequest,
    approver: &AuthenticatedUser,
) -> Option<NotificationEvent> {
    let context = async {
        let period: String =
            sqlx::query_scalar("SELECT period FROM monthly_report WHERE id = ?")
                .bind(&record.monthly_report_id.0)
                .fetch_one(pool)
                .await?;
        let requester_email: String =
            sqlx::query_scalar("SELECT email FROM app_user WHERE id = ?")
                .bind(&record.requester_id.0)
                .fetch_one(pool)
                .await?;
        Ok::<(String, String), sqlx::Error>((period, requester_email))
    };

    let (period, requester_email) = match context.await {
        Ok(context) => context,
        Err(error) => {
            warn!(
                event_name = "notify.context_unavailable",
                correlation_id = %record.id.0,
                error = %error,
                "skipping notification; recipient lookup failed"
            );
            return None;
        }
    };

    match record.status {
        ApprovalStatus::Approved => Some(NotificationEvent::ApprovalGranted {
            approval_id: record.id.0.clone(),
            report_id: record.monthly_report_id.0.clone(),
            period,
            requester_email,
            approver_name: approver.name.clone(),
        }),
        ApprovalStatus::Rejected => Some(NotificationEvent::ApprovalRejected {
            approval_id: record.id.0.clone(),
            report_id: record.monthly_report_id.0.clone(),
            period,
            requester_email,
            approver_name: approver.name.clone(),
            reason: record.rejection_reason.clone().unwrap_or_default(),
        }),
        ApprovalStatus::Pending => None,
    }
}
