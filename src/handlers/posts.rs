use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info};

use crate::{
    authentication::{AuthUser, MaybeUser},
    data_formats::{
        validate_comment, validate_post, CommentRequest, FormErrors, ImageChange, LikeResponse,
        MultipartForm, PostInput,
    },
    db_helpers::{
        add_comment_to_post_in_db, count_likes, delete_post_in_db, following_ids,
        get_comments_for_post_in_db, get_post_owned_by, get_post_view, insert_post,
        list_all_posts, post_exists, toggle_like_in_db, update_post_in_db,
    },
    errors::RequestError,
    flash::Level,
    models::Post,
    storage::UploadDir,
    templates::pages::{self, PostFormTarget},
    AppState,
};

use super::{html, page_context, redirect_with, referer_path, HandlerResult};

async fn owned_post(state: &AppState, post_id: i64, user: &AuthUser) -> Result<Post, RequestError> {
    get_post_owned_by(&state.pool, post_id, user.id)
        .await?
        .ok_or(RequestError::NotFound)
}

// ----------------- Feed -----------------

pub async fn feed(user: AuthUser, State(state): State<AppState>, jar: CookieJar) -> HandlerResult {
    let following = following_ids(&state.pool, user.id).await?;
    let posts = list_all_posts(&state.pool, Some(user.id)).await?;
    debug!(
        "Feed for {} lists all {} posts; follows {} users",
        user.username,
        posts.len(),
        following.len()
    );
    let (jar, ctx) = page_context(Some(&user), jar);
    html(jar, pages::feed_page(&ctx, &posts, user.id, &following)?)
}

// ----------------- Create -----------------

pub async fn create_post_form(user: AuthUser, jar: CookieJar) -> HandlerResult {
    let (jar, ctx) = page_context(Some(&user), jar);
    html(
        jar,
        pages::post_form_page(&ctx, PostFormTarget::Create, "", &FormErrors::default())?,
    )
}

pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> HandlerResult {
    let input = PostInput::from(MultipartForm::read(multipart).await?);
    let valid = match validate_post(&input) {
        Ok(valid) => valid,
        Err(errors) => {
            let (jar, ctx) = page_context(Some(&user), jar);
            return html(
                jar,
                pages::post_form_page(&ctx, PostFormTarget::Create, &input.content, &errors)?,
            );
        }
    };

    let image = match &valid.image {
        ImageChange::Replace(file) => Some(state.storage.save(UploadDir::PostImages, file).await?),
        ImageChange::Keep | ImageChange::Clear => None,
    };
    let post_id = match insert_post(&state.pool, user.id, &valid.content, image.as_deref()).await {
        Ok(id) => id,
        Err(e) => {
            if let Some(path) = &image {
                state.storage.remove(path).await;
            }
            return Err(e.into());
        }
    };
    info!("User {} created post {}", user.username, post_id);
    redirect_with(jar, Level::Success, "Your post has been created!", "/")
}

// ----------------- Detail & Comments -----------------

pub async fn post_detail(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(post_id): Path<i64>,
) -> HandlerResult {
    render_detail(&state, &user, jar, post_id, "", &FormErrors::default()).await
}

async fn render_detail(
    state: &AppState,
    user: &AuthUser,
    jar: CookieJar,
    post_id: i64,
    draft: &str,
    errors: &FormErrors,
) -> HandlerResult {
    let post = get_post_view(&state.pool, Some(user.id), post_id)
        .await?
        .ok_or(RequestError::NotFound)?;
    let comments = get_comments_for_post_in_db(&state.pool, post_id).await?;
    let (jar, ctx) = page_context(Some(user), jar);
    html(
        jar,
        pages::post_detail_page(&ctx, &post, &comments, user.id, draft, errors)?,
    )
}

pub async fn post_detail_comment(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(post_id): Path<i64>,
    Form(request): Form<CommentRequest>,
) -> HandlerResult {
    let content = match validate_comment(&request) {
        Ok(content) => content,
        Err(errors) => {
            return render_detail(&state, &user, jar, post_id, &request.content, &errors).await
        }
    };
    add_comment_to_post_in_db(&state.pool, user.id, post_id, &content).await?;
    redirect_with(
        jar,
        Level::Success,
        "Your comment has been added.",
        &format!("/post/{}/", post_id),
    )
}

/// Inline comment form on the feed and profile pages; goes back where it came from.
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Form(request): Form<CommentRequest>,
) -> HandlerResult {
    if !post_exists(&state.pool, post_id).await? {
        return Err(RequestError::NotFound);
    }
    let back = referer_path(&headers);
    match validate_comment(&request) {
        Ok(content) => {
            add_comment_to_post_in_db(&state.pool, user.id, post_id, &content).await?;
            redirect_with(jar, Level::Success, "Comment added.", &back)
        }
        Err(_) => redirect_with(jar, Level::Error, "Comment cannot be empty.", &back),
    }
}

// ----------------- Edit & Delete -----------------

pub async fn edit_post_form(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(post_id): Path<i64>,
) -> HandlerResult {
    let post = owned_post(&state, post_id, &user).await?;
    let (jar, ctx) = page_context(Some(&user), jar);
    let target = PostFormTarget::Edit {
        id: post.id,
        current_image: post.image.as_deref(),
    };
    html(
        jar,
        pages::post_form_page(&ctx, target, &post.content, &FormErrors::default())?,
    )
}

pub async fn edit_post(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> HandlerResult {
    let post = owned_post(&state, post_id, &user).await?;
    let input = PostInput::from(MultipartForm::read(multipart).await?);
    let valid = match validate_post(&input) {
        Ok(valid) => valid,
        Err(errors) => {
            let (jar, ctx) = page_context(Some(&user), jar);
            let target = PostFormTarget::Edit {
                id: post.id,
                current_image: post.image.as_deref(),
            };
            return html(
                jar,
                pages::post_form_page(&ctx, target, &input.content, &errors)?,
            );
        }
    };

    let (image, uploaded) = match &valid.image {
        ImageChange::Keep => (post.image.clone(), false),
        ImageChange::Clear => (None, false),
        ImageChange::Replace(file) => (
            Some(state.storage.save(UploadDir::PostImages, file).await?),
            true,
        ),
    };
    let updated = update_post_in_db(&state.pool, post.id, user.id, &valid.content, image.as_deref()).await;
    match updated {
        Ok(true) => {}
        outcome => {
            if let (true, Some(path)) = (uploaded, &image) {
                state.storage.remove(path).await;
            }
            return match outcome {
                Err(e) => Err(e.into()),
                // deleted between the lookup and the update
                _ => Err(RequestError::NotFound),
            };
        }
    }
    if let Some(old) = &post.image {
        if image.as_ref() != Some(old) {
            state.storage.remove(old).await;
        }
    }
    redirect_with(
        jar,
        Level::Success,
        "Post updated successfully!",
        &format!("/post/{}/", post.id),
    )
}

pub async fn delete_post_form(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(post_id): Path<i64>,
) -> HandlerResult {
    let post = owned_post(&state, post_id, &user).await?;
    let (jar, ctx) = page_context(Some(&user), jar);
    html(
        jar,
        pages::confirm_page(
            &ctx,
            "Delete post",
            "Are you sure you want to delete this post?",
            &format!("/post/{}/delete/", post.id),
            &format!("/post/{}/", post.id),
        )?,
    )
}

pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(post_id): Path<i64>,
) -> HandlerResult {
    let post = owned_post(&state, post_id, &user).await?;
    if !delete_post_in_db(&state.pool, post.id, user.id).await? {
        return Err(RequestError::NotFound);
    }
    if let Some(image) = &post.image {
        state.storage.remove(image).await;
    }
    info!("User {} deleted post {}", user.username, post.id);
    redirect_with(jar, Level::Success, "Post has been deleted.", "/")
}

// ----------------- Likes -----------------

/// Anonymous callers get the current count back and nothing changes.
pub async fn like_post(
    maybe_user: MaybeUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<LikeResponse>, RequestError> {
    if !post_exists(&state.pool, post_id).await? {
        return Err(RequestError::NotFound);
    }
    let liked = match maybe_user.get_id() {
        Some(user_id) => toggle_like_in_db(&state.pool, post_id, user_id).await?,
        None => false,
    };
    let likes_count = count_likes(&state.pool, post_id).await?;
    Ok(Json(LikeResponse { likes_count, liked }))
}
