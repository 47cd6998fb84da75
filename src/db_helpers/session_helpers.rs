use sqlx::{Sqlite, SqlitePool};
use time::OffsetDateTime;
use tracing::debug;

use crate::{authentication::generate_session_token, models::User};

/// Stores a new session for the user and returns its token. Sessions that
/// have already expired are purged on the way.
pub async fn create_session(
    pool: &SqlitePool,
    user_id: i64,
    lifetime: time::Duration,
) -> Result<String, sqlx::Error> {
    let now = OffsetDateTime::now_utc();
    let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
        .bind(now.unix_timestamp())
        .execute(pool)
        .await?
        .rows_affected();
    if purged > 0 {
        debug!(purged, "removed expired sessions");
    }

    let token = generate_session_token();
    let expires_at = (now + lifetime).unix_timestamp();
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)")
        .bind(&token)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Resolves a live session to its active user.
pub async fn get_session_user(pool: &SqlitePool, token: &str) -> Result<Option<User>, sqlx::Error> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    sqlx::query_as::<Sqlite, User>(
        r#"
        SELECT users.id, users.username, users.email, users.first_name, users.last_name,
               users.password, users.is_active, users.is_staff, users.date_joined, users.last_login
        FROM sessions
            JOIN users ON users.id = sessions.user_id
        WHERE sessions.token = ?1 AND sessions.expires_at > ?2 AND users.is_active = 1
        "#,
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = ?1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_sessions_for_user(pool: &SqlitePool, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
