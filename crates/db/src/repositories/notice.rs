use sqlx::Row;

use safework_core::domain::notice::{Notice, NoticeId};
use safework_core::domain::user::UserId;

use super::{parse_timestamp, NoticeRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNoticeRepository {
    pool: DbPool,
}

impl SqlNoticeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_notice(row: &sqlx::sqlite::SqliteRow) -> Result<Notice, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let title: String = row.try_get("title").map_err(decode)?;
    let body: String = row.try_get("body").map_err(decode)?;
    let pinned: i64 = row.try_get("pinned").map_err(decode)?;
    let author_id: String = row.try_get("author_id").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode)?;

    Ok(Notice {
        id: NoticeId(id),
        title,
        body,
        pinned: pinned != 0,
        author_id: UserId(author_id),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl NoticeRepository for SqlNoticeRepository {
    async fn create(&self, notice: Notice) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notice (id, title, body, pinned, author_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&notice.id.0)
        .bind(&notice.title)
        .bind(&notice.body)
        .bind(i64::from(notice.pinned))
        .bind(&notice.author_id.0)
        .bind(notice.created_at.to_rfc3339())
        .bind(notice.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &NoticeId) -> Result<Option<Notice>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, body, pinned, author_id, created_at, updated_at
             FROM notice WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_notice(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: u32) -> Result<Vec<Notice>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, body, pinned, author_id, created_at, updated_at
             FROM notice
             ORDER BY pinned DESC, created_at DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notice).collect()
    }

    async fn delete(&self, id: &NoticeId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM notice WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use safework_core::domain::notice::{Notice, NoticeId};
    use safework_core::domain::user::UserId;

    use super::SqlNoticeRepository;
    use crate::repositories::NoticeRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO app_user (id, name, email, role, team_id, created_at)
             VALUES ('u-admin', 'Admin', 'admin@example.com', 'admin', NULL, ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .expect("seed user");

        pool
    }

    fn notice(id: &str, title: &str, pinned: bool) -> Notice {
        let now = Utc::now();
        Notice {
            id: NoticeId(id.to_string()),
            title: title.to_string(),
            body: "Hard hats are mandatory past the gate.".to_string(),
            pinned,
            author_id: UserId("u-admin".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn pinned_notices_list_first() {
        let pool = setup().await;
        let repo = SqlNoticeRepository::new(pool);

        repo.create(notice("N-1", "Weekly schedule", false)).await.expect("create 1");
        repo.create(notice("N-2", "Evacuation drill Friday", true)).await.expect("create 2");
        repo.create(notice("N-3", "Parking change", false)).await.expect("create 3");

        let listed = repo.list(10).await.expect("list");
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id.0, "N-2", "pinned notice should sort first");
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let pool = setup().await;
        let repo = SqlNoticeRepository::new(pool);

        repo.create(notice("N-1", "Old notice", false)).await.expect("create");

        assert!(repo.delete(&NoticeId("N-1".to_string())).await.expect("delete"));
        assert!(!repo.delete(&NoticeId("N-1".to_string())).await.expect("re-delete"));
        assert!(repo.find_by_id(&NoticeId("N-1".to_string())).await.expect("find").is_none());
    }
}
