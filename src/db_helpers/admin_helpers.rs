use chrono::NaiveDateTime;
use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::User};

use super::like_pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminEntity {
    Users,
    Posts,
    Comments,
    Follows,
}

impl AdminEntity {
    pub const ALL: [AdminEntity; 4] = [
        AdminEntity::Users,
        AdminEntity::Posts,
        AdminEntity::Comments,
        AdminEntity::Follows,
    ];

    fn table(self) -> &'static str {
        match self {
            AdminEntity::Users => "users",
            AdminEntity::Posts => "posts",
            AdminEntity::Comments => "comments",
            AdminEntity::Follows => "follows",
        }
    }

    /// Path segment under `/admin/`.
    pub fn slug(self) -> &'static str {
        self.table()
    }

    pub fn noun(self) -> &'static str {
        match self {
            AdminEntity::Users => "user",
            AdminEntity::Posts => "post",
            AdminEntity::Comments => "comment",
            AdminEntity::Follows => "follow",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AdminEntity::Users => "Users",
            AdminEntity::Posts => "Posts",
            AdminEntity::Comments => "Comments",
            AdminEntity::Follows => "Follows",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminPostRow {
    pub id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminCommentRow {
    pub id: i64,
    pub author_username: String,
    pub post_id: i64,
    pub post_content: String,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminFollowRow {
    pub id: i64,
    pub follower_username: String,
    pub following_username: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct AdminUserChanges {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub bio: String,
    pub profile_pic: String,
}

pub async fn count_rows(pool: &SqlitePool, entity: AdminEntity) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", entity.table()))
        .fetch_one(pool)
        .await
}

pub async fn search_users(pool: &SqlitePool, term: Option<&str>) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<Sqlite, User>(
        r#"
        SELECT id, username, email, first_name, last_name, password,
               is_active, is_staff, date_joined, last_login
        FROM users
        WHERE ?1 IS NULL
           OR username LIKE ?1
           OR email LIKE ?1
           OR first_name LIKE ?1
           OR last_name LIKE ?1
        ORDER BY username
        "#,
    )
    .bind(like_pattern(term))
    .fetch_all(pool)
    .await
}

pub async fn search_posts(
    pool: &SqlitePool,
    term: Option<&str>,
) -> Result<Vec<AdminPostRow>, sqlx::Error> {
    sqlx::query_as::<Sqlite, AdminPostRow>(
        r#"
        SELECT posts.id AS "id", users.username AS "author_username",
               posts.content AS "content", posts.created_at AS "created_at"
        FROM posts
            JOIN users ON users.id = posts.author_id
        WHERE ?1 IS NULL
           OR posts.content LIKE ?1
           OR users.username LIKE ?1
        ORDER BY posts.created_at DESC, posts.id DESC
        "#,
    )
    .bind(like_pattern(term))
    .fetch_all(pool)
    .await
}

pub async fn search_comments(
    pool: &SqlitePool,
    term: Option<&str>,
) -> Result<Vec<AdminCommentRow>, sqlx::Error> {
    sqlx::query_as::<Sqlite, AdminCommentRow>(
        r#"
        SELECT comments.id AS "id", users.username AS "author_username",
               posts.id AS "post_id", posts.content AS "post_content",
               comments.content AS "content", comments.created_at AS "created_at"
        FROM comments
            JOIN users ON users.id = comments.author_id
            JOIN posts ON posts.id = comments.post_id
        WHERE ?1 IS NULL
           OR comments.content LIKE ?1
           OR users.username LIKE ?1
           OR posts.content LIKE ?1
        ORDER BY comments.created_at DESC, comments.id DESC
        "#,
    )
    .bind(like_pattern(term))
    .fetch_all(pool)
    .await
}

pub async fn list_follows(pool: &SqlitePool) -> Result<Vec<AdminFollowRow>, sqlx::Error> {
    sqlx::query_as::<Sqlite, AdminFollowRow>(
        r#"
        SELECT follows.id AS "id", follower.username AS "follower_username",
               followee.username AS "following_username", follows.created_at AS "created_at"
        FROM follows
            JOIN users AS follower ON follower.id = follows.follower_id
            JOIN users AS followee ON followee.id = follows.following_id
        ORDER BY follows.created_at DESC, follows.id DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Saves the user record and its inline profile together.
pub async fn admin_update_user(
    pool: &SqlitePool,
    user_id: i64,
    changes: &AdminUserChanges,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        r#"
        UPDATE users
        SET username = ?1, email = ?2, first_name = ?3, last_name = ?4,
            is_active = ?5, is_staff = ?6
        WHERE id = ?7
        "#,
    )
    .bind(&changes.username)
    .bind(&changes.email)
    .bind(&changes.first_name)
    .bind(&changes.last_name)
    .bind(changes.is_active)
    .bind(changes.is_staff)
    .bind(user_id)
    .execute(&mut tx)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(RequestError::NotFound);
    }
    sqlx::query("UPDATE profiles SET bio = ?1, profile_pic = ?2 WHERE user_id = ?3")
        .bind(&changes.bio)
        .bind(&changes.profile_pic)
        .bind(user_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn admin_delete_row(
    pool: &SqlitePool,
    entity: AdminEntity,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", entity.table()))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::test_support::{make_user, test_pool};
    use crate::db_helpers::{
        add_comment_to_post_in_db, get_profile, insert_post, toggle_follow_in_db,
    };

    #[tokio::test]
    async fn post_search_matches_content_or_author() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let bob = make_user(&pool, "bob").await;
        insert_post(&pool, alice.id, "sunny day", None).await.unwrap();
        insert_post(&pool, bob.id, "rainy day", None).await.unwrap();

        assert_eq!(search_posts(&pool, None).await.unwrap().len(), 2);
        assert_eq!(search_posts(&pool, Some("  ")).await.unwrap().len(), 2);
        let sunny = search_posts(&pool, Some("sunny")).await.unwrap();
        assert_eq!(sunny.len(), 1);
        assert_eq!(sunny[0].author_username, "alice");
        let by_bob = search_posts(&pool, Some("bob")).await.unwrap();
        assert_eq!(by_bob.len(), 1);
        assert_eq!(by_bob[0].content, "rainy day");
    }

    #[tokio::test]
    async fn comment_search_includes_post_content() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let post = insert_post(&pool, alice.id, "pancakes", None).await.unwrap();
        add_comment_to_post_in_db(&pool, alice.id, post, "with syrup").await.unwrap();

        let hits = search_comments(&pool, Some("pancake")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].post_id, post);
        assert!(search_comments(&pool, Some("waffles")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_edit_updates_user_and_inline_profile() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        admin_update_user(
            &pool,
            alice.id,
            &AdminUserChanges {
                username: "alice2".into(),
                email: "a2@example.com".into(),
                first_name: "Al".into(),
                last_name: "Ice".into(),
                is_active: true,
                is_staff: true,
                bio: "moderated".into(),
                profile_pic: "profile_pics/alice.png".into(),
            },
        )
        .await
        .unwrap();

        let users = search_users(&pool, Some("alice2")).await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_staff);
        let profile = get_profile(&pool, alice.id).await.unwrap().unwrap();
        assert_eq!(profile.bio, "moderated");
        assert_eq!(profile.profile_pic, "profile_pics/alice.png");
    }

    #[tokio::test]
    async fn admin_delete_cascades_and_counts_follow() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let bob = make_user(&pool, "bob").await;
        toggle_follow_in_db(&pool, alice.id, bob.id).await.unwrap();
        assert_eq!(list_follows(&pool).await.unwrap()[0].following_username, "bob");

        assert!(admin_delete_row(&pool, AdminEntity::Users, bob.id).await.unwrap());
        assert_eq!(count_rows(&pool, AdminEntity::Follows).await.unwrap(), 0);
        assert_eq!(count_rows(&pool, AdminEntity::Users).await.unwrap(), 1);
        assert!(!admin_delete_row(&pool, AdminEntity::Posts, 999).await.unwrap());
    }
}
