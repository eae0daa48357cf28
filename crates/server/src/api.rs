//! Shared response plumbing for the JSON API: the error body every route
//! returns, the mapping from the error taxonomies to HTTP, and the
//! audit-trail writer.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use safework_core::audit::AuditEvent;
use safework_core::domain::approval::ApprovalError;
use safework_core::errors::{ApplicationError, InterfaceError};
use safework_db::DbPool;

/// Error body with a machine-readable `code` the UI branches on. A
/// terminal-state conflict also carries the record's actual status so the
/// client can render the resolved state instead of an error banner.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: &'static str,
    #[serde(rename = "currentStatus", skip_serializing_if = "Option::is_none")]
    pub current_status: Option<&'static str>,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { error: message.into(), code, current_status: None }
    }
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

pub fn failure(status: StatusCode, code: &'static str, message: impl Into<String>) -> ApiFailure {
    (status, Json(ApiError::new(code, message)))
}

/// Each `ApprovalError` category maps to its own status code; nothing is
/// collapsed into a generic failure.
pub fn approval_failure(error: ApprovalError) -> ApiFailure {
    match &error {
        ApprovalError::NotFound => failure(StatusCode::NOT_FOUND, "not_found", error.to_string()),
        ApprovalError::Unauthorized => {
            failure(StatusCode::UNAUTHORIZED, "unauthorized", error.to_string())
        }
        ApprovalError::Forbidden => failure(StatusCode::FORBIDDEN, "forbidden", error.to_string()),
        ApprovalError::AlreadyProcessed { status } => {
            let mut body = ApiError::new("already_processed", error.to_string());
            body.current_status = Some(status.as_str());
            (StatusCode::CONFLICT, Json(body))
        }
        ApprovalError::Validation(message) => {
            failure(StatusCode::BAD_REQUEST, "validation", message.clone())
        }
    }
}

pub fn interface_failure(error: InterfaceError) -> ApiFailure {
    let (status, code) = match &error {
        InterfaceError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "unauthorized"),
        InterfaceError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
        InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        InterfaceError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
        InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "validation"),
        InterfaceError::ServiceUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "persistence")
        }
        InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    failure(status, code, error.to_string())
}

/// Storage failures carry a correlation id so the response can be matched
/// to the server-side log line.
pub fn db_failure(error: impl std::fmt::Display) -> ApiFailure {
    let correlation_id = Uuid::new_v4().simple().to_string();
    warn!(
        event_name = "persistence.failure",
        correlation_id = %correlation_id,
        error = %error,
        "database operation failed"
    );
    interface_failure(
        ApplicationError::Persistence(error.to_string()).into_interface(correlation_id),
    )
}

/// Append-only operational audit trail. Writes are best-effort: a failure
/// is logged and the request continues, matching the side-effect policy of
/// the transitions that call this.
pub async fn record_audit_event(pool: &DbPool, event: AuditEvent) {
    let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());

    let result = sqlx::query(
        "INSERT INTO audit_event (id, monthly_report_id, event_type, payload_json, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&event.event_id)
    .bind(event.report_id.as_ref().map(|id| id.0.as_str()))
    .bind(&event.event_type)
    .bind(payload)
    .bind(event.occurred_at.to_rfc3339())
    .execute(pool)
    .await;

    if let Err(error) = result {
        warn!(
            event_name = "audit.write_failed",
            audit_event_type = %event.event_type,
            error = %error,
            "failed to record audit event"
        );
    }
}

pub fn new_entity_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &uuid[..12])
}
