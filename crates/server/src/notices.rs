//! Site notices: admin-posted announcements, pinned ones first.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use safework_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use safework_core::domain::notice::{Notice, NoticeId};
use safework_db::repositories::{NoticeRepository, SqlNoticeRepository};
use safework_db::DbPool;

use crate::api::{db_failure, failure, new_entity_id, record_audit_event, ApiFailure};
use crate::auth::{authenticate, require_admin};

#[derive(Clone)]
pub struct NoticeState {
    db_pool: DbPool,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoticeBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub pinned: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeResponse {
    pub id: String,
    pub title: String,
    pub body: String,
    pub pinned: bool,
    pub author_id: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct NoticeListResponse {
    pub notices: Vec<NoticeResponse>,
}

fn notice_response(notice: &Notice) -> NoticeResponse {
    NoticeResponse {
        id: notice.id.0.clone(),
        title: notice.title.clone(),
        body: notice.body.clone(),
        pinned: notice.pinned,
        author_id: notice.author_id.0.clone(),
        created_at: notice.created_at.to_rfc3339(),
    }
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/v1/notices", post(create_notice).get(list_notices))
        .route("/api/v1/notices/{id}", get(get_notice).delete(delete_notice))
        .with_state(NoticeState { db_pool })
}

async fn create_notice(
    headers: HeaderMap,
    State(state): State<NoticeState>,
    Json(body): Json<CreateNoticeBody>,
) -> Result<(StatusCode, Json<NoticeResponse>), ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;
    require_admin(&user)?;

    let title = body.title.trim();
    let text = body.body.trim();
    if title.is_empty() || text.is_empty() {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "validation",
            "title and body are required",
        ));
    }

    let now = Utc::now();
    let notice = Notice {
        id: NoticeId(new_entity_id("NTC")),
        title: title.to_string(),
        body: text.to_string(),
        pinned: body.pinned,
        author_id: user.id.clone(),
        created_at: now,
        updated_at: now,
    };

    let repo = SqlNoticeRepository::new(state.db_pool.clone());
    repo.create(notice.clone()).await.map_err(db_failure)?;

    record_audit_event(
        &state.db_pool,
        AuditEvent::new(
            None,
            notice.id.0.clone(),
            "notice.published",
            AuditCategory::Notice,
            user.id.0.clone(),
            AuditOutcome::Success,
        )
        .with_metadata("pinned", notice.pinned.to_string()),
    )
    .await;

    info!(
        event_name = "notice.published",
        correlation_id = %notice.id.0,
        actor = %user.id.0,
        pinned = notice.pinned,
        "notice published"
    );

    Ok((StatusCode::CREATED, Json(notice_response(&notice))))
}

async fn list_notices(
    headers: HeaderMap,
    State(state): State<NoticeState>,
) -> Result<Json<NoticeListResponse>, ApiFailure> {
    authenticate(&state.db_pool, &headers).await?;

    let repo = SqlNoticeRepository::new(state.db_pool.clone());
    let notices = repo.list(100).await.map_err(db_failure)?;

    Ok(Json(NoticeListResponse { notices: notices.iter().map(notice_response).collect() }))
}

async fn get_notice(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<NoticeState>,
) -> Result<Json<NoticeResponse>, ApiFailure> {
    authenticate(&state.db_pool, &headers).await?;

    let repo = SqlNoticeRepository::new(state.db_pool.clone());
    let notice = repo
        .find_by_id(&NoticeId(id))
        .await
        .map_err(db_failure)?
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "not_found", "notice not found"))?;

    Ok(Json(notice_response(&notice)))
}

async fn delete_notice(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<NoticeState>,
) -> Result<StatusCode, ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;
    require_admin(&user)?;

    let repo = SqlNoticeRepository::new(state.db_pool.clone());
    let removed = repo.delete(&NoticeId(id.clone())).await.map_err(db_failure)?;
    if !removed {
        return Err(failure(StatusCode::NOT_FOUND, "not_found", "notice not found"));
    }

    info!(
        event_name = "notice.removed",
        correlation_id = %id,
        actor = %user.id.0,
        "notice removed"
    );

    Ok(StatusCode::NO_CONTENT)
}
