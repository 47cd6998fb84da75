use axum::{
    extract::{Query, State},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::{
    authentication::{
        expired_session_cookie, hash_password_argon2, safe_next, session_cookie,
        verify_password_argon2, AuthUser, MaybeUser,
    },
    data_formats::{
        validate_login, validate_registration, FormErrors, LoginRequest, NextQuery,
        RegisterRequest, INVALID_LOGIN, NON_FIELD, USERNAME_TAKEN,
    },
    db_helpers::{
        create_session, delete_session, get_user_by_username, insert_user, touch_last_login,
        username_taken, NewUser,
    },
    flash::Level,
    templates::pages,
    AppState,
};

use super::{html, page_context, redirect, redirect_with, HandlerResult};

// ----------------- Registration -----------------

pub async fn register_form(MaybeUser(user): MaybeUser, jar: CookieJar) -> HandlerResult {
    if user.is_some() {
        return redirect(jar, "/");
    }
    let (jar, ctx) = page_context(None, jar);
    html(
        jar,
        pages::register_page(&ctx, &RegisterRequest::default(), &FormErrors::default())?,
    )
}

pub async fn register_user(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Form(request): Form<RegisterRequest>,
) -> HandlerResult {
    if user.is_some() {
        return redirect(jar, "/");
    }
    let rerender = |jar: CookieJar, errors: FormErrors| {
        let (jar, ctx) = page_context(None, jar);
        html(jar, pages::register_page(&ctx, &request, &errors)?)
    };

    let valid = match validate_registration(&request) {
        Ok(valid) => valid,
        Err(errors) => return rerender(jar, errors),
    };
    if username_taken(&state.pool, &valid.username).await? {
        return rerender(jar, FormErrors::single("username", USERNAME_TAKEN));
    }

    let password_hash = hash_password_argon2(valid.password).await?;
    let new_user = NewUser {
        username: valid.username,
        email: valid.email,
        first_name: valid.first_name,
        last_name: valid.last_name,
        password_hash,
    };
    let user = match insert_user(&state.pool, &new_user).await {
        Ok(user) => user,
        // lost a race with another registration of the same name
        Err(e) if e.is_unique_violation() => {
            return rerender(jar, FormErrors::single("username", USERNAME_TAKEN))
        }
        Err(e) => return Err(e),
    };
    info!("Registered user {} (id {})", user.username, user.id);
    redirect_with(
        jar,
        Level::Success,
        "Account created successfully! Please log in.",
        "/login/",
    )
}

// ----------------- Sessions -----------------

pub async fn login_form(
    MaybeUser(user): MaybeUser,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
) -> HandlerResult {
    if user.is_some() {
        return redirect(jar, "/");
    }
    let (jar, ctx) = page_context(None, jar);
    html(
        jar,
        pages::login_page(&ctx, "", query.next.as_deref(), &FormErrors::default())?,
    )
}

pub async fn login_user(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Form(request): Form<LoginRequest>,
) -> HandlerResult {
    if user.is_some() {
        return redirect(jar, "/");
    }
    let rerender = |jar: CookieJar, errors: FormErrors| {
        let (jar, ctx) = page_context(None, jar);
        html(
            jar,
            pages::login_page(&ctx, &request.username, request.next.as_deref(), &errors)?,
        )
    };

    let credentials = match validate_login(&request.username, &request.password) {
        Ok(credentials) => credentials,
        Err(errors) => return rerender(jar, errors),
    };
    let user = match get_user_by_username(&state.pool, &credentials.username).await? {
        Some(user) if user.is_active => user,
        _ => return rerender(jar, FormErrors::single(NON_FIELD, INVALID_LOGIN)),
    };
    if !verify_password_argon2(credentials.password, &user.password).await? {
        return rerender(jar, FormErrors::single(NON_FIELD, INVALID_LOGIN));
    }

    touch_last_login(&state.pool, user.id).await?;
    let token = create_session(&state.pool, user.id, state.config.session_lifetime).await?;
    info!("User {} logged in", user.username);
    let jar = jar.add(session_cookie(token, &state.config));
    redirect(jar, safe_next(request.next.as_deref()))
}

pub async fn logout(user: AuthUser, State(state): State<AppState>, jar: CookieJar) -> HandlerResult {
    delete_session(&state.pool, &user.token).await?;
    info!("User {} logged out", user.username);
    let jar = jar.remove(expired_session_cookie());
    redirect_with(
        jar,
        Level::Info,
        "You have been successfully logged out.",
        "/login/",
    )
}
