use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EducationSessionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationSession {
    pub id: EducationSessionId,
    pub topic: String,
    pub description: Option<String>,
    pub held_on: NaiveDate,
    pub instructor: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user completion of an education session. At most one per
/// (session, user) pair; repeat completions are idempotent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationRecord {
    pub session_id: EducationSessionId,
    pub user_id: UserId,
    pub completed_at: DateTime<Utc>,
}
