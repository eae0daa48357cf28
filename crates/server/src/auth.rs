//! Bearer-session authentication.
//!
//! Every `/api/v1` handler resolves the `Authorization: Bearer <token>`
//! header against the `user_session` table and passes the resulting
//! identity into the domain checks explicitly, so authorization logic
//! stays testable without a simulated browser session.

use axum::http::{header, HeaderMap, StatusCode};
use chrono::Utc;
use sqlx::Row;

use safework_core::domain::user::{UserId, UserRole};
use safework_db::DbPool;

use crate::api::{failure, ApiFailure};

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

fn unauthorized(message: &str) -> ApiFailure {
    failure(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn authenticate(
    pool: &DbPool,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, ApiFailure> {
    let Some(token) = bearer_token(headers) else {
        return Err(unauthorized("missing bearer token"));
    };

    let row = sqlx::query(
        "SELECT u.id, u.name, u.email, u.role
         FROM user_session s
         JOIN app_user u ON u.id = s.user_id
         WHERE s.token = ? AND s.expires_at > ?",
    )
    .bind(token)
    .bind(Utc::now().to_rfc3339())
    .fetch_optional(pool)
    .await
    .map_err(crate::api::db_failure)?;

    let Some(row) = row else {
        return Err(unauthorized("session is invalid or expired"));
    };

    let decode = |e: sqlx::Error| {
        failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            format!("failed to decode session row: {e}"),
        )
    };

    Ok(AuthenticatedUser {
        id: UserId(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        role: UserRole::parse(&row.try_get::<String, _>("role").map_err(decode)?),
    })
}

/// Admin gate for the management surfaces (notices, education sessions).
pub fn require_admin(user: &AuthenticatedUser) -> Result<(), ApiFailure> {
    if !user.is_admin() {
        return Err(failure(
            StatusCode::FORBIDDEN,
            "forbidden",
            "this action requires the admin role",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
    use chrono::{Duration, Utc};

    use safework_db::{connect_with_settings, migrations};

    use super::authenticate;

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO app_user (id, name, email, role, team_id, created_at)
             VALUES ('u-manager', 'Miguel Santos', 'miguel@example.com', 'manager', NULL, ?)",
        )
        .bind(now.to_rfc3339())
        .execute(&pool)
        .await
        .expect("seed user");

        sqlx::query(
            "INSERT INTO user_session (token, user_id, expires_at, created_at)
             VALUES ('tok-live', 'u-manager', ?, ?)",
        )
        .bind((now + Duration::hours(8)).to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&pool)
        .await
        .expect("seed live session");

        sqlx::query(
            "INSERT INTO user_session (token, user_id, expires_at, created_at)
             VALUES ('tok-expired', 'u-manager', ?, ?)",
        )
        .bind((now - Duration::hours(1)).to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&pool)
        .await
        .expect("seed expired session");

        pool
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
        );
        headers
    }

    #[tokio::test]
    async fn valid_session_resolves_the_user() {
        let pool = setup().await;

        let user = authenticate(&pool, &headers_with("tok-live")).await.expect("authenticate");
        assert_eq!(user.id.0, "u-manager");
        assert_eq!(user.email, "miguel@example.com");
        assert!(!user.is_admin());
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let pool = setup().await;

        let (status, _) =
            authenticate(&pool, &HeaderMap::new()).await.expect_err("no header must fail");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_and_expired_tokens_are_unauthorized() {
        let pool = setup().await;

        let (status, _) = authenticate(&pool, &headers_with("tok-unknown"))
            .await
            .expect_err("unknown token must fail");
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = authenticate(&pool, &headers_with("tok-expired"))
            .await
            .expect_err("expired token must fail");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
