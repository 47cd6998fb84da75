use sqlx::{Sqlite, SqlitePool};

use crate::models::{Post, PostView};

// ?1 is the viewer id; it only drives the `liked` column.
const POST_VIEW_QUERY: &str = r#"
            SELECT posts.id                                          AS "id",
                   posts.author_id                                   AS "author_id",
                   users.username                                    AS "author_username",
                   profiles.profile_pic                              AS "author_pic",
                   posts.content                                     AS "content",
                   posts.image                                       AS "image",
                   posts.created_at                                  AS "created_at",
                   (SELECT COUNT(*)
                    FROM   post_likes
                    WHERE  post_likes.post_id = posts.id)            AS "likes_count",
                   (SELECT COUNT(*)
                    FROM   comments
                    WHERE  comments.post_id = posts.id)              AS "comments_count",
                   EXISTS (SELECT 1
                           FROM   post_likes
                           WHERE  post_likes.post_id = posts.id
                              AND post_likes.user_id = ?1)           AS "liked"
            FROM   posts
                JOIN users
                    ON users.id = posts.author_id
                LEFT JOIN profiles
                    ON profiles.user_id = posts.author_id
"#;

const NEWEST_FIRST: &str = "ORDER BY posts.created_at DESC, posts.id DESC";

// ----------------- Post Queries -----------------

pub async fn list_all_posts(
    pool: &SqlitePool,
    viewer_id: Option<i64>,
) -> Result<Vec<PostView>, sqlx::Error> {
    let query = format!("{} {}", POST_VIEW_QUERY, NEWEST_FIRST);
    sqlx::query_as::<Sqlite, PostView>(&query)
        .bind(viewer_id)
        .fetch_all(pool)
        .await
}

pub async fn list_posts_by_author(
    pool: &SqlitePool,
    viewer_id: Option<i64>,
    author_id: i64,
) -> Result<Vec<PostView>, sqlx::Error> {
    let query = format!("{} WHERE posts.author_id = ?2 {}", POST_VIEW_QUERY, NEWEST_FIRST);
    sqlx::query_as::<Sqlite, PostView>(&query)
        .bind(viewer_id)
        .bind(author_id)
        .fetch_all(pool)
        .await
}

pub async fn get_post_view(
    pool: &SqlitePool,
    viewer_id: Option<i64>,
    post_id: i64,
) -> Result<Option<PostView>, sqlx::Error> {
    let query = format!("{} WHERE posts.id = ?2", POST_VIEW_QUERY);
    sqlx::query_as::<Sqlite, PostView>(&query)
        .bind(viewer_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

pub async fn post_exists(pool: &SqlitePool, post_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = ?1)")
        .bind(post_id)
        .fetch_one(pool)
        .await
}

/// Looks a post up by id *and* author, so that someone else's post and a
/// missing post are indistinguishable to the caller.
pub async fn get_post_owned_by(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<Sqlite, Post>(
        r#"
        SELECT id, author_id, content, image, created_at
        FROM posts WHERE id = ?1 AND author_id = ?2
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_post(
    pool: &SqlitePool,
    author_id: i64,
    content: &str,
    image: Option<&str>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO posts (author_id, content, image)
        VALUES (?1, ?2, ?3)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(content)
    .bind(image)
    .fetch_one(pool)
    .await
}

/// Rewrites content and image; `created_at` is never touched.
pub async fn update_post_in_db(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    content: &str,
    image: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE posts SET content = ?1, image = ?2
        WHERE id = ?3 AND author_id = ?4
        "#,
    )
    .bind(content)
    .bind(image)
    .bind(post_id)
    .bind(author_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_post_in_db(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?1 AND author_id = ?2")
        .bind(post_id)
        .bind(author_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ----------------- Like Queries -----------------

/// Flips the user's membership in the post's like set. Returns whether the
/// user likes the post afterwards.
pub async fn toggle_like_in_db(
    pool: &SqlitePool,
    post_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2")
        .bind(post_id)
        .bind(user_id)
        .execute(&mut tx)
        .await?
        .rows_affected();
    if removed == 0 {
        sqlx::query("INSERT OR IGNORE INTO post_likes (post_id, user_id) VALUES (?1, ?2)")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut tx)
            .await?;
    }
    tx.commit().await?;
    Ok(removed == 0)
}

pub async fn count_likes(pool: &SqlitePool, post_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = ?1")
        .bind(post_id)
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::test_support::{make_user, test_pool};

    #[tokio::test]
    async fn feed_lists_every_post_newest_first() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let bob = make_user(&pool, "bob").await;
        let first = insert_post(&pool, alice.id, "first", None).await.unwrap();
        let second = insert_post(&pool, bob.id, "second", Some("post_images/a.png"))
            .await
            .unwrap();
        let third = insert_post(&pool, alice.id, "third", None).await.unwrap();

        let posts = list_all_posts(&pool, Some(bob.id)).await.unwrap();
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![third, second, first]);
        assert_eq!(posts[1].author_username, "bob");
        assert_eq!(posts[1].image.as_deref(), Some("post_images/a.png"));
        assert_eq!(posts[0].likes_count, 0);
        assert!(!posts[0].liked);
    }

    #[tokio::test]
    async fn double_like_is_the_same_as_no_like_and_likes_are_a_set() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let bob = make_user(&pool, "bob").await;
        let post = insert_post(&pool, alice.id, "hello world", None).await.unwrap();

        assert!(toggle_like_in_db(&pool, post, bob.id).await.unwrap());
        assert_eq!(count_likes(&pool, post).await.unwrap(), 1);
        let view = get_post_view(&pool, Some(bob.id), post).await.unwrap().unwrap();
        assert!(view.liked);
        assert_eq!(view.likes_count, 1);

        assert!(!toggle_like_in_db(&pool, post, bob.id).await.unwrap());
        assert_eq!(count_likes(&pool, post).await.unwrap(), 0);

        let err = sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES (?1, ?2), (?1, ?2)")
            .bind(post)
            .bind(bob.id)
            .execute(&pool)
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn only_the_author_can_edit_or_delete() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let bob = make_user(&pool, "bob").await;
        let post = insert_post(&pool, alice.id, "mine", None).await.unwrap();

        assert!(get_post_owned_by(&pool, post, bob.id).await.unwrap().is_none());
        assert!(!update_post_in_db(&pool, post, bob.id, "hijack", None).await.unwrap());
        assert!(!delete_post_in_db(&pool, post, bob.id).await.unwrap());

        let before = get_post_owned_by(&pool, post, alice.id).await.unwrap().unwrap();
        assert!(update_post_in_db(&pool, post, alice.id, "edited", Some("post_images/x.png"))
            .await
            .unwrap());
        let after = get_post_owned_by(&pool, post, alice.id).await.unwrap().unwrap();
        assert_eq!(after.content, "edited");
        assert_eq!(after.created_at, before.created_at);

        assert!(delete_post_in_db(&pool, post, alice.id).await.unwrap());
        assert!(!post_exists(&pool, post).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_post_removes_its_comments_and_likes() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let bob = make_user(&pool, "bob").await;
        let post = insert_post(&pool, alice.id, "short lived", None).await.unwrap();
        toggle_like_in_db(&pool, post, bob.id).await.unwrap();
        crate::db_helpers::add_comment_to_post_in_db(&pool, bob.id, post, "bye")
            .await
            .unwrap();

        delete_post_in_db(&pool, post, alice.id).await.unwrap();
        let leftovers: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM comments) + (SELECT COUNT(*) FROM post_likes)",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(leftovers, 0);
    }
}
