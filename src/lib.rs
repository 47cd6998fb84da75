mod authentication;
pub mod config;
pub mod data_formats;
mod db_helpers;
mod errors;
mod flash;
mod handlers;
pub mod models;
mod storage;
mod templates;

use std::{
    net::{SocketAddr, TcpListener},
    str::FromStr,
    sync::Arc,
};

use anyhow::Context;
pub use anyhow::Result;
use axum::{extract::DefaultBodyLimit, routing::*, Router};
use handlers::*;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::Config;
pub use crate::storage::MediaStorage;

/// Shared by every handler. Cloned per request, so everything in it is a handle.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub storage: MediaStorage,
}

pub async fn run_app(app: Router, listener: TcpListener) -> Result<()> {
    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database url {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);
    let mut pool_options = SqlitePoolOptions::new();
    if database_url.contains(":memory:") {
        // each connection to :memory: is a separate, empty database
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }
    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", database_url))?;
    info!("Running migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations completed");
    Ok(pool)
}

/// Opens the database and media storage, and applies the staff promotion
/// requested by `ADMIN_USERNAME`.
pub async fn build_state(config: Config) -> Result<AppState> {
    let pool = init_db(&config.database_url).await?;
    let storage = MediaStorage::new(config.media_root.clone()).await?;
    if let Some(username) = &config.admin_username {
        if db_helpers::promote_to_staff(&pool, username)
            .await
            .context("Failed to promote admin user")?
        {
            info!("User {} is staff", username);
        } else {
            warn!("ADMIN_USERNAME {} does not match any user", username);
        }
    }
    Ok(AppState {
        pool,
        config: Arc::new(config),
        storage,
    })
}

pub fn get_random_free_port() -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Could not get a free port")?;
    let address = listener.local_addr()?;
    Ok((listener, address))
}

/// Literal segments (`/post/create/`, `/profile/edit/`, `/profile/delete/`)
/// are registered ahead of the parameterized routes they sit next to.
pub fn make_router(state: AppState) -> Router {
    let media = ServeDir::new(state.storage.root());
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    Router::new()
        .route("/", get(feed))
        // auth
        .route("/register/", get(register_form).post(register_user))
        .route("/register", get(register_form).post(register_user))
        .route("/login/", get(login_form).post(login_user))
        .route("/login", get(login_form).post(login_user))
        .route("/logout/", post(logout))
        .route("/logout", post(logout))
        // posts
        .route("/post/create/", get(create_post_form).post(create_post))
        .route("/post/:id/", get(post_detail).post(post_detail_comment))
        .route("/post/:id/edit/", get(edit_post_form).post(edit_post))
        .route("/post/:id/delete/", get(delete_post_form).post(delete_post))
        .route("/post/:id/like/", post(like_post))
        .route("/post/:id/comment/", post(add_comment))
        // profiles
        .route("/profile/edit/", get(edit_profile_form).post(edit_profile))
        .route("/profile/delete/", get(delete_profile_form).post(delete_profile))
        .route("/profile/:username/", get(profile_view))
        .route("/profile/:username/follow/", post(follow_toggle))
        // admin
        .route("/admin/", get(admin_index))
        .route("/admin/users/", get(admin_users))
        .route("/admin/users/:id/", get(admin_user_form).post(admin_user_save))
        .route("/admin/users/:id/delete/", post(admin_delete_user))
        .route("/admin/posts/", get(admin_posts))
        .route("/admin/posts/:id/delete/", post(admin_delete_post))
        .route("/admin/comments/", get(admin_comments))
        .route("/admin/comments/:id/delete/", post(admin_delete_comment))
        .route("/admin/follows/", get(admin_follows))
        .route("/admin/follows/:id/delete/", post(admin_delete_follow))
        .nest_service("/media", media)
        .fallback(not_found)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
