use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    models::{Profile, ProfileDetail},
};

use super::{get_user_by_username, is_following};

pub async fn get_profile(pool: &SqlitePool, user_id: i64) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<Sqlite, Profile>(
        r#"
        SELECT id, user_id, bio, profile_pic, created_at FROM profiles WHERE user_id = ?1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Loads the user's profile. A user without one is a broken invariant, not a 404.
pub async fn require_profile(pool: &SqlitePool, user_id: i64) -> Result<Profile, RequestError> {
    match get_profile(pool, user_id).await? {
        Some(profile) => Ok(profile),
        None => Err(anyhow::anyhow!("user {} has no profile", user_id).into()),
    }
}

pub async fn get_profile_by_username_in_db(
    pool: &SqlitePool,
    viewer_id: i64,
    username: &str,
) -> Result<ProfileDetail, RequestError> {
    let user = match get_user_by_username(pool, username).await? {
        Some(user) => user,
        None => return Err(RequestError::NotFound),
    };
    let profile = require_profile(pool, user.id).await?;
    let is_following = is_following(pool, viewer_id, user.id).await?;
    let (followers_count, following_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT (SELECT COUNT(*) FROM follows WHERE following_id = ?1),
               (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)
        "#,
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    Ok(ProfileDetail {
        user,
        profile,
        is_following,
        followers_count,
        following_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::test_support::{make_user, test_pool};
    use crate::db_helpers::toggle_follow_in_db;

    #[tokio::test]
    async fn profile_detail_reports_follow_state_and_counts() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let bob = make_user(&pool, "bob").await;
        toggle_follow_in_db(&pool, alice.id, bob.id).await.unwrap();

        let seen_by_alice = get_profile_by_username_in_db(&pool, alice.id, "bob")
            .await
            .unwrap();
        assert!(seen_by_alice.is_following);
        assert_eq!(seen_by_alice.followers_count, 1);
        assert_eq!(seen_by_alice.following_count, 0);

        let seen_by_bob = get_profile_by_username_in_db(&pool, bob.id, "alice")
            .await
            .unwrap();
        assert!(!seen_by_bob.is_following);
        assert_eq!(seen_by_bob.following_count, 1);
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let err = get_profile_by_username_in_db(&pool, alice.id, "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::NotFound));
    }

    #[tokio::test]
    async fn missing_profile_is_an_internal_error() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        sqlx::query("DELETE FROM profiles WHERE user_id = ?1")
            .bind(alice.id)
            .execute(&pool)
            .await
            .unwrap();
        let err = get_profile_by_username_in_db(&pool, alice.id, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::ServerError(_)));
    }
}
