//! Safety-education sessions and per-user completion tracking.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use safework_core::domain::education::{EducationRecord, EducationSession, EducationSessionId};
use safework_db::repositories::{EducationRepository, SqlEducationRepository};
use safework_db::DbPool;

use crate::api::{db_failure, failure, new_entity_id, ApiFailure};
use crate::auth::{authenticate, require_admin};

#[derive(Clone)]
pub struct EducationState {
    db_pool: DbPool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    #[serde(default)]
    pub topic: String,
    pub description: Option<String>,
    #[serde(default)]
    pub held_on: String,
    #[serde(default)]
    pub instructor: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub held_on: String,
    pub instructor: String,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub session_id: String,
    pub user_id: String,
    pub completed_at: String,
}

#[derive(Debug, Serialize)]
pub struct CompletionListResponse {
    pub completions: Vec<CompletionResponse>,
}

fn session_response(session: &EducationSession) -> SessionResponse {
    SessionResponse {
        id: session.id.0.clone(),
        topic: session.topic.clone(),
        description: session.description.clone(),
        held_on: session.held_on.format("%Y-%m-%d").to_string(),
        instructor: session.instructor.clone(),
    }
}

fn completion_response(record: &EducationRecord) -> CompletionResponse {
    CompletionResponse {
        session_id: record.session_id.0.clone(),
        user_id: record.user_id.0.clone(),
        completed_at: record.completed_at.to_rfc3339(),
    }
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/v1/education/sessions", post(create_session).get(list_sessions))
        .route("/api/v1/education/sessions/{id}/complete", post(complete_session))
        .route("/api/v1/education/sessions/{id}/completions", get(list_completions))
        .with_state(EducationState { db_pool })
}

async fn create_session(
    headers: HeaderMap,
    State(state): State<EducationState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;
    require_admin(&user)?;

    let topic = body.topic.trim();
    let instructor = body.instructor.trim();
    if topic.is_empty() || instructor.is_empty() {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "validation",
            "topic and instructor are required",
        ));
    }
    let held_on = NaiveDate::parse_from_str(body.held_on.trim(), "%Y-%m-%d").map_err(|_| {
        failure(StatusCode::BAD_REQUEST, "validation", "heldOn must be a YYYY-MM-DD date")
    })?;

    let session = EducationSession {
        id: EducationSessionId(new_entity_id("EDU")),
        topic: topic.to_string(),
        description: body.description.filter(|text| !text.trim().is_empty()),
        held_on,
        instructor: instructor.to_string(),
        created_at: Utc::now(),
    };

    let repo = SqlEducationRepository::new(state.db_pool.clone());
    repo.create_session(session.clone()).await.map_err(db_failure)?;

    info!(
        event_name = "education.session_created",
        correlation_id = %session.id.0,
        actor = %user.id.0,
        "education session created"
    );

    Ok((StatusCode::CREATED, Json(session_response(&session))))
}

async fn list_sessions(
    headers: HeaderMap,
    State(state): State<EducationState>,
) -> Result<Json<SessionListResponse>, ApiFailure> {
    authenticate(&state.db_pool, &headers).await?;

    let repo = SqlEducationRepository::new(state.db_pool.clone());
    let sessions = repo.list_sessions(100).await.map_err(db_failure)?;

    Ok(Json(SessionListResponse { sessions: sessions.iter().map(session_response).collect() }))
}

async fn complete_session(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<EducationState>,
) -> Result<Json<CompletionResponse>, ApiFailure> {
    let user = authenticate(&state.db_pool, &headers).await?;

    let repo = SqlEducationRepository::new(state.db_pool.clone());
    let session = repo
        .find_session(&EducationSessionId(id))
        .await
        .map_err(db_failure)?
        .ok_or_else(|| {
            failure(StatusCode::NOT_FOUND, "not_found", "education session not found")
        })?;

    let record = repo
        .record_completion(EducationRecord {
            session_id: session.id.clone(),
            user_id: user.id.clone(),
            completed_at: Utc::now(),
        })
        .await
        .map_err(db_failure)?;

    info!(
        event_name = "education.completed",
        correlation_id = %session.id.0,
        actor = %user.id.0,
        "education session completion recorded"
    );

    Ok(Json(completion_response(&record)))
}

async fn list_completions(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<EducationState>,
) -> Result<Json<CompletionListResponse>, ApiFailure> {
    authenticate(&state.db_pool, &headers).await?;

    let repo = SqlEducationRepository::new(state.db_pool.clone());
    let completions =
        repo.list_completions(&EducationSessionId(id)).await.map_err(db_failure)?;

    Ok(Json(CompletionListResponse {
        completions: completions.iter().map(completion_response).collect(),
    }))
}
