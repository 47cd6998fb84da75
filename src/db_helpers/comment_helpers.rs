use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    models::{Comment, CommentView},
};

pub async fn add_comment_to_post_in_db(
    pool: &SqlitePool,
    author_id: i64,
    post_id: i64,
    content: &str,
) -> Result<Comment, RequestError> {
    let mut tx = pool.begin().await?;

    let post: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?1")
        .bind(post_id)
        .fetch_optional(&mut tx)
        .await?;
    if post.is_none() {
        return Err(RequestError::NotFound);
    }

    let result = sqlx::query_as::<Sqlite, Comment>(
        r#"
        INSERT INTO comments (content, author_id, post_id)
        VALUES (?1, ?2, ?3)
        RETURNING id, post_id, author_id, content, created_at
        "#,
    )
    .bind(content)
    .bind(author_id)
    .bind(post_id)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;

    Ok(result)
}

/// Comments on a post, oldest first.
pub async fn get_comments_for_post_in_db(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Vec<CommentView>, sqlx::Error> {
    sqlx::query_as::<Sqlite, CommentView>(
        r#"
        SELECT comments.id         AS "id",
               comments.post_id    AS "post_id",
               users.username      AS "author_username",
               profiles.profile_pic AS "author_pic",
               comments.content    AS "content",
               comments.created_at AS "created_at"
        FROM   comments
            JOIN users
                ON users.id = comments.author_id
            LEFT JOIN profiles
                ON profiles.user_id = comments.author_id
        WHERE  comments.post_id = ?1
        ORDER  BY comments.created_at ASC, comments.id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::insert_post;
    use crate::db_helpers::test_support::{make_user, test_pool};

    #[tokio::test]
    async fn comments_come_back_oldest_first_with_authors() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let bob = make_user(&pool, "bob").await;
        let post = insert_post(&pool, alice.id, "hello", None).await.unwrap();

        let first = add_comment_to_post_in_db(&pool, bob.id, post, "first!").await.unwrap();
        add_comment_to_post_in_db(&pool, alice.id, post, "thanks").await.unwrap();
        assert_eq!(first.author_id, bob.id);
        assert_eq!(first.post_id, post);

        let comments = get_comments_for_post_in_db(&pool, post).await.unwrap();
        let rendered: Vec<(&str, &str)> = comments
            .iter()
            .map(|c| (c.author_username.as_str(), c.content.as_str()))
            .collect();
        assert_eq!(rendered, vec![("bob", "first!"), ("alice", "thanks")]);
    }

    #[tokio::test]
    async fn commenting_on_a_missing_post_is_not_found() {
        let pool = test_pool().await;
        let alice = make_user(&pool, "alice").await;
        let err = add_comment_to_post_in_db(&pool, alice.id, 404, "anyone?")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::NotFound));
    }
}
