use chrono::NaiveDate;
use sqlx::Row;

use safework_core::domain::education::{EducationRecord, EducationSession, EducationSessionId};
use safework_core::domain::user::UserId;

use super::{parse_timestamp, EducationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEducationRepository {
    pool: DbPool,
}

impl SqlEducationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<EducationSession, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let topic: String = row.try_get("topic").map_err(decode)?;
    let description: Option<String> = row.try_get("description").map_err(decode)?;
    let held_on: String = row.try_get("held_on").map_err(decode)?;
    let instructor: String = row.try_get("instructor").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;

    Ok(EducationSession {
        id: EducationSessionId(id),
        topic,
        description,
        held_on: NaiveDate::parse_from_str(&held_on, "%Y-%m-%d")
            .map_err(|err| RepositoryError::Decode(format!("bad date in `held_on`: {err}")))?,
        instructor,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<EducationRecord, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let session_id: String = row.try_get("session_id").map_err(decode)?;
    let user_id: String = row.try_get("user_id").map_err(decode)?;
    let completed_at: String = row.try_get("completed_at").map_err(decode)?;

    Ok(EducationRecord {
        session_id: EducationSessionId(session_id),
        user_id: UserId(user_id),
        completed_at: parse_timestamp("completed_at", &completed_at)?,
    })
}

#[async_trait::async_trait]
impl EducationRepository for SqlEducationRepository {
    async fn create_session(&self, session: EducationSession) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO education_session (id, topic, description, held_on, instructor, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id.0)
        .bind(&session.topic)
        .bind(&session.description)
        .bind(session.held_on.format("%Y-%m-%d").to_string())
        .bind(&session.instructor)
        .bind(session.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(
        &self,
        id: &EducationSessionId,
    ) -> Result<Option<EducationSession>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, topic, description, held_on, instructor, created_at
             FROM education_session WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_session(r)?)),
            None => Ok(None),
        }
    }

    async fn list_sessions(&self, limit: u32) -> Result<Vec<EducationSession>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, topic, description, held_on, instructor, created_at
             FROM education_session
             ORDER BY held_on DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_session).collect()
    }

    async fn record_completion(
        &self,
        record: EducationRecord,
    ) -> Result<EducationRecord, RepositoryError> {
        // First completion wins; a repeat keeps the original timestamp.
        sqlx::query(
            "INSERT INTO education_record (session_id, user_id, completed_at)
             VALUES (?, ?, ?)
             ON CONFLICT(session_id, user_id) DO NOTHING",
        )
        .bind(&record.session_id.0)
        .bind(&record.user_id.0)
        .bind(record.completed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT session_id, user_id, completed_at FROM education_record
             WHERE session_id = ? AND user_id = ?",
        )
        .bind(&record.session_id.0)
        .bind(&record.user_id.0)
        .fetch_one(&self.pool)
        .await?;

        row_to_record(&row)
    }

    async fn list_completions(
        &self,
        session_id: &EducationSessionId,
    ) -> Result<Vec<EducationRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT session_id, user_id, completed_at FROM education_record
             WHERE session_id = ?
             ORDER BY completed_at ASC",
        )
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}
