use axum::extract::{Multipart, Path, Query, State};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::{
    authentication::StaffUser,
    data_formats::{
        validate_admin_user, AdminUserInput, FormErrors, ImageChange, MultipartForm, SearchQuery,
        USERNAME_TAKEN,
    },
    db_helpers::{
        admin_delete_row, admin_update_user, count_rows, get_post_view, get_user_by_id,
        list_follows, require_profile, search_comments, search_posts, search_users,
        uploaded_files_of_user, AdminEntity, AdminUserChanges,
    },
    errors::RequestError,
    flash::Level,
    models::DEFAULT_PROFILE_PIC,
    storage::UploadDir,
    templates::admin,
    AppState,
};

use super::{html, page_context, redirect_with, HandlerResult};

pub async fn admin_index(
    StaffUser(staff): StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> HandlerResult {
    let mut counts = Vec::with_capacity(AdminEntity::ALL.len());
    for entity in AdminEntity::ALL {
        counts.push((entity, count_rows(&state.pool, entity).await?));
    }
    let (jar, ctx) = page_context(Some(&staff), jar);
    html(jar, admin::index_page(&ctx, &counts)?)
}

// ----------------- Users -----------------

pub async fn admin_users(
    StaffUser(staff): StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SearchQuery>,
) -> HandlerResult {
    let users = search_users(&state.pool, query.q.as_deref()).await?;
    let (jar, ctx) = page_context(Some(&staff), jar);
    html(
        jar,
        admin::users_page(&ctx, &users, query.q.as_deref().unwrap_or_default())?,
    )
}

pub async fn admin_user_form(
    StaffUser(staff): StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(user_id): Path<i64>,
) -> HandlerResult {
    let user = get_user_by_id(&state.pool, user_id)
        .await?
        .ok_or(RequestError::NotFound)?;
    let profile = require_profile(&state.pool, user_id).await?;
    let form = AdminUserInput {
        username: user.username,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        is_active: user.is_active,
        is_staff: user.is_staff,
        bio: profile.bio,
        ..Default::default()
    };
    let (jar, ctx) = page_context(Some(&staff), jar);
    html(
        jar,
        admin::user_form_page(
            &ctx,
            user_id,
            &form,
            &profile.profile_pic,
            &FormErrors::default(),
        )?,
    )
}

/// Saves the user and the inline profile, picture included, in one transaction.
pub async fn admin_user_save(
    StaffUser(staff): StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(user_id): Path<i64>,
    multipart: Multipart,
) -> HandlerResult {
    get_user_by_id(&state.pool, user_id)
        .await?
        .ok_or(RequestError::NotFound)?;
    let profile = require_profile(&state.pool, user_id).await?;
    let form = AdminUserInput::from(MultipartForm::read(multipart).await?);
    let rerender = |jar: CookieJar, errors: FormErrors| {
        let (jar, ctx) = page_context(Some(&staff), jar);
        html(
            jar,
            admin::user_form_page(&ctx, user_id, &form, &profile.profile_pic, &errors)?,
        )
    };
    let valid = match validate_admin_user(&form) {
        Ok(valid) => valid,
        Err(errors) => return rerender(jar, errors),
    };

    let (profile_pic, uploaded) = match &valid.profile_pic {
        ImageChange::Keep => (profile.profile_pic.clone(), false),
        ImageChange::Clear => (DEFAULT_PROFILE_PIC.to_owned(), false),
        ImageChange::Replace(file) => (
            state.storage.save(UploadDir::ProfilePics, file).await?,
            true,
        ),
    };
    let changes = AdminUserChanges {
        username: valid.username,
        email: valid.email,
        first_name: valid.first_name,
        last_name: valid.last_name,
        is_active: valid.is_active,
        is_staff: valid.is_staff,
        bio: valid.bio,
        profile_pic,
    };
    if let Err(e) = admin_update_user(&state.pool, user_id, &changes).await {
        if uploaded {
            state.storage.remove(&changes.profile_pic).await;
        }
        if e.is_unique_violation() {
            return rerender(jar, FormErrors::single("username", USERNAME_TAKEN));
        }
        return Err(e);
    }
    if profile.profile_pic != changes.profile_pic {
        state.storage.remove(&profile.profile_pic).await;
    }
    info!("Staff {} changed user {}", staff.username, user_id);
    redirect_with(
        jar,
        Level::Success,
        format!("The user \u{201c}{}\u{201d} was changed successfully.", changes.username),
        "/admin/users/",
    )
}

// ----------------- Content -----------------

pub async fn admin_posts(
    StaffUser(staff): StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SearchQuery>,
) -> HandlerResult {
    let posts = search_posts(&state.pool, query.q.as_deref()).await?;
    let (jar, ctx) = page_context(Some(&staff), jar);
    html(
        jar,
        admin::posts_page(&ctx, &posts, query.q.as_deref().unwrap_or_default())?,
    )
}

pub async fn admin_comments(
    StaffUser(staff): StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SearchQuery>,
) -> HandlerResult {
    let comments = search_comments(&state.pool, query.q.as_deref()).await?;
    let (jar, ctx) = page_context(Some(&staff), jar);
    html(
        jar,
        admin::comments_page(&ctx, &comments, query.q.as_deref().unwrap_or_default())?,
    )
}

pub async fn admin_follows(
    StaffUser(staff): StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> HandlerResult {
    let follows = list_follows(&state.pool).await?;
    let (jar, ctx) = page_context(Some(&staff), jar);
    html(jar, admin::follows_page(&ctx, &follows)?)
}

// ----------------- Deletes -----------------

async fn delete_entity(
    state: &AppState,
    staff: &StaffUser,
    jar: CookieJar,
    entity: AdminEntity,
    id: i64,
) -> HandlerResult {
    // uploads do not cascade with the rows that reference them
    let files = match entity {
        AdminEntity::Users => uploaded_files_of_user(&state.pool, id).await?,
        AdminEntity::Posts => get_post_view(&state.pool, None, id)
            .await?
            .and_then(|post| post.image)
            .into_iter()
            .collect(),
        AdminEntity::Comments | AdminEntity::Follows => Vec::new(),
    };
    if !admin_delete_row(&state.pool, entity, id).await? {
        return Err(RequestError::NotFound);
    }
    for file in &files {
        state.storage.remove(file).await;
    }
    info!("Staff {} deleted {} {}", staff.0.username, entity.noun(), id);
    redirect_with(
        jar,
        Level::Success,
        format!("The {} #{} was deleted successfully.", entity.noun(), id),
        &format!("/admin/{}/", entity.slug()),
    )
}

pub async fn admin_delete_user(
    staff: StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> HandlerResult {
    delete_entity(&state, &staff, jar, AdminEntity::Users, id).await
}

pub async fn admin_delete_post(
    staff: StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> HandlerResult {
    delete_entity(&state, &staff, jar, AdminEntity::Posts, id).await
}

pub async fn admin_delete_comment(
    staff: StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> HandlerResult {
    delete_entity(&state, &staff, jar, AdminEntity::Comments, id).await
}

pub async fn admin_delete_follow(
    staff: StaffUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> HandlerResult {
    delete_entity(&state, &staff, jar, AdminEntity::Follows, id).await
}
