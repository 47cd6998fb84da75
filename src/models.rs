use chrono::NaiveDateTime;

pub const DEFAULT_PROFILE_PIC: &str = "profile_pics/default-avatar.png";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: NaiveDateTime,
    pub last_login: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub bio: String,
    pub profile_pic: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A post joined with its author and the viewer-relative like state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostView {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub author_pic: Option<String>,
    pub content: String,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub likes_count: i64,
    pub comments_count: i64,
    pub liked: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author_username: String,
    pub author_pic: Option<String>,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct ProfileDetail {
    pub user: User,
    pub profile: Profile,
    pub is_following: bool,
    pub followers_count: i64,
    pub following_count: i64,
}
