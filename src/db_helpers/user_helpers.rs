use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{errors::RequestError, models::User};

const USER_QUERY: &str = r#"
        SELECT id, username, email, first_name, last_name, password,
               is_active, is_staff, date_joined, last_login
        FROM users
"#;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

/// Fields written by the profile editor: user columns and profile columns together.
#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bio: String,
    pub profile_pic: String,
}

// ----------------- User Queries -----------------

/// Creates the user and its profile in one transaction. The profile is
/// created here and nowhere else.
pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<User, RequestError> {
    let mut tx = pool.begin().await?;
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .fetch_one(&mut tx)
    .await?;
    create_profile_for_user(&mut tx, id).await?;
    tx.commit().await?;

    get_user_by_id(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", id).into())
}

/// Post-creation hook for a freshly inserted user.
async fn create_profile_for_user(conn: &mut SqliteConnection, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO profiles (user_id) VALUES (?1)")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    let query = format!("{} WHERE id = ?1", USER_QUERY);
    sqlx::query_as::<Sqlite, User>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    let query = format!("{} WHERE username = ?1", USER_QUERY);
    sqlx::query_as::<Sqlite, User>(&query)
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn username_taken(pool: &SqlitePool, username: &str) -> Result<bool, sqlx::Error> {
    let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1)")
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(taken)
}

pub async fn touch_last_login(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Updates the user row and its profile row atomically.
pub async fn update_user_and_profile(
    pool: &SqlitePool,
    user_id: i64,
    changes: &ProfileChanges,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        r#"
        UPDATE users SET first_name = ?1, last_name = ?2, email = ?3
        WHERE id = ?4
        "#,
    )
    .bind(&changes.first_name)
    .bind(&changes.last_name)
    .bind(&changes.email)
    .bind(user_id)
    .execute(&mut tx)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(RequestError::NotFound);
    }

    let updated = sqlx::query("UPDATE profiles SET bio = ?1, profile_pic = ?2 WHERE user_id = ?3")
        .bind(&changes.bio)
        .bind(&changes.profile_pic)
        .bind(user_id)
        .execute(&mut tx)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(anyhow::anyhow!("user {} has no profile", user_id).into());
    }
    tx.commit().await?;
    Ok(())
}

/// Uploaded media referenced by the user's profile and posts.
pub async fn uploaded_files_of_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT profile_pic FROM profiles WHERE user_id = ?1
        UNION ALL
        SELECT image FROM posts WHERE author_id = ?1 AND image IS NOT NULL
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Deletes the user; foreign keys cascade to everything the user owns.
pub async fn delete_user_in_db(pool: &SqlitePool, user_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn promote_to_staff(pool: &SqlitePool, username: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET is_staff = 1 WHERE username = ?1")
        .bind(username)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
