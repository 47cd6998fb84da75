use std::collections::HashSet;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::errors::{is_unique_violation, RequestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    Unfollowed,
}

pub async fn is_following(
    pool: &SqlitePool,
    follower_id: i64,
    following_id: i64,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2)
        "#,
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_one(pool)
    .await
}

/// Removes the edge if present, otherwise creates it.
pub async fn toggle_follow_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    following_id: i64,
) -> Result<FollowOutcome, RequestError> {
    let mut tx = pool.begin().await?;
    let removed = sqlx::query("DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2")
        .bind(follower_id)
        .bind(following_id)
        .execute(&mut tx)
        .await?
        .rows_affected();
    if removed > 0 {
        tx.commit().await?;
        return Ok(FollowOutcome::Unfollowed);
    }

    let outcome = insert_follow_edge(&mut tx, follower_id, following_id).await?;
    tx.commit().await?;
    Ok(outcome)
}

/// Inserts the edge. Losing the race on the (follower, following) key to
/// another insert leaves the same edge in place, so it still reports `Followed`.
async fn insert_follow_edge(
    conn: &mut SqliteConnection,
    follower_id: i64,
    following_id: i64,
) -> Result<FollowOutcome, sqlx::Error> {
    let inserted = sqlx::query("INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)")
        .bind(follower_id)
        .bind(following_id)
        .execute(conn)
        .await;
    match inserted {
        Ok(_) => Ok(FollowOutcome::Followed),
        Err(e) if is_unique_violation(&e) => {
            debug!(follower_id, following_id, "follow edge already present");
            Ok(FollowOutcome::Followed)
        }
        Err(e) => Err(e),
    }
}

/// Ids of the users `user_id` follows.
pub async fn following_ids(pool: &SqlitePool, user_id: i64) -> Result<HashSet<i64>, sqlx::Error> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT following_id FROM follows WHERE follower_id = ?1")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().collect())
}
