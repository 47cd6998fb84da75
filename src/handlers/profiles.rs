use axum::extract::{Multipart, Path, State};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::{
    authentication::{expired_session_cookie, AuthUser},
    data_formats::{validate_profile, FormErrors, ImageChange, MultipartForm, ProfileInput},
    db_helpers::{
        delete_sessions_for_user, delete_user_in_db, get_profile_by_username_in_db,
        get_user_by_id, get_user_by_username, list_posts_by_author, require_profile,
        toggle_follow_in_db, update_user_and_profile, uploaded_files_of_user, FollowOutcome,
        ProfileChanges,
    },
    errors::RequestError,
    flash::Level,
    models::DEFAULT_PROFILE_PIC,
    storage::UploadDir,
    templates::pages,
    AppState,
};

use super::{html, page_context, profile_path, redirect_with, HandlerResult};

pub async fn profile_view(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(username): Path<String>,
) -> HandlerResult {
    let detail = get_profile_by_username_in_db(&state.pool, user.id, &username).await?;
    let posts = list_posts_by_author(&state.pool, Some(user.id), detail.user.id).await?;
    let (jar, ctx) = page_context(Some(&user), jar);
    html(jar, pages::profile_page(&ctx, &detail, &posts, user.id)?)
}

pub async fn follow_toggle(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(username): Path<String>,
) -> HandlerResult {
    let target = get_user_by_username(&state.pool, &username)
        .await?
        .ok_or(RequestError::NotFound)?;
    let back = profile_path(&target.username);
    if target.id == user.id {
        return redirect_with(jar, Level::Warning, "You cannot follow yourself.", &back);
    }
    match toggle_follow_in_db(&state.pool, user.id, target.id).await? {
        FollowOutcome::Followed => redirect_with(
            jar,
            Level::Success,
            format!("You are now following {}.", target.username),
            &back,
        ),
        FollowOutcome::Unfollowed => redirect_with(
            jar,
            Level::Info,
            format!("You have unfollowed {}.", target.username),
            &back,
        ),
    }
}

// ----------------- Edit -----------------

pub async fn edit_profile_form(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> HandlerResult {
    let account = get_user_by_id(&state.pool, user.id)
        .await?
        .ok_or(RequestError::NotFound)?;
    let profile = require_profile(&state.pool, user.id).await?;
    let input = ProfileInput {
        first_name: account.first_name,
        last_name: account.last_name,
        email: account.email,
        bio: profile.bio,
        ..Default::default()
    };
    let (jar, ctx) = page_context(Some(&user), jar);
    html(
        jar,
        pages::edit_profile_page(
            &ctx,
            &user.username,
            &input,
            &profile.profile_pic,
            &FormErrors::default(),
        )?,
    )
}

/// Both halves of the form are validated before anything is written; the
/// user row and the profile row are then saved in one transaction.
pub async fn edit_profile(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> HandlerResult {
    let profile = require_profile(&state.pool, user.id).await?;
    let input = ProfileInput::from(MultipartForm::read(multipart).await?);
    let valid = match validate_profile(&input) {
        Ok(valid) => valid,
        Err(errors) => {
            let (jar, ctx) = page_context(Some(&user), jar);
            return html(
                jar,
                pages::edit_profile_page(&ctx, &user.username, &input, &profile.profile_pic, &errors)?,
            );
        }
    };

    let (profile_pic, uploaded) = match &valid.profile_pic {
        ImageChange::Keep => (profile.profile_pic.clone(), false),
        ImageChange::Clear => (DEFAULT_PROFILE_PIC.to_owned(), false),
        ImageChange::Replace(file) => (
            state.storage.save(UploadDir::ProfilePics, file).await?,
            true,
        ),
    };
    let changes = ProfileChanges {
        first_name: valid.first_name,
        last_name: valid.last_name,
        email: valid.email,
        bio: valid.bio,
        profile_pic,
    };
    if let Err(e) = update_user_and_profile(&state.pool, user.id, &changes).await {
        if uploaded {
            state.storage.remove(&changes.profile_pic).await;
        }
        return Err(e);
    }
    if profile.profile_pic != changes.profile_pic {
        state.storage.remove(&profile.profile_pic).await;
    }
    redirect_with(
        jar,
        Level::Success,
        "Your profile has been updated successfully!",
        &profile_path(&user.username),
    )
}

// ----------------- Delete -----------------

pub async fn delete_profile_form(user: AuthUser, jar: CookieJar) -> HandlerResult {
    let (jar, ctx) = page_context(Some(&user), jar);
    html(
        jar,
        pages::confirm_page(
            &ctx,
            "Delete account",
            "Are you sure you want to delete your account? Everything you have posted will be removed.",
            "/profile/delete/",
            &profile_path(&user.username),
        )?,
    )
}

pub async fn delete_profile(
    user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> HandlerResult {
    let files = uploaded_files_of_user(&state.pool, user.id).await?;
    delete_sessions_for_user(&state.pool, user.id).await?;
    if !delete_user_in_db(&state.pool, user.id).await? {
        return Err(RequestError::NotFound);
    }
    for file in &files {
        state.storage.remove(file).await;
    }
    info!("User {} deleted their account", user.username);
    let jar = jar.remove(expired_session_cookie());
    redirect_with(
        jar,
        Level::Success,
        "Your account has been successfully deleted.",
        "/login/",
    )
}
