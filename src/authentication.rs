use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::{distributions::Alphanumeric, Rng};

use crate::{config::Config, db_helpers::get_session_user, errors::RequestError, AppState};

pub const SESSION_COOKIE: &str = "sessionid";
const SESSION_TOKEN_LEN: usize = 40;

/// The user behind a live session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
    pub token: String,
}

/// Like `AuthUser`, but anonymous requests are let through.
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn get_id(&self) -> Option<i64> {
        self.0.as_ref().map(|a| a.id)
    }
}

/// An authenticated, active staff member.
pub struct StaffUser(pub AuthUser);

async fn resolve_session(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, RequestError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_owned(),
        None => return Ok(None),
    };
    let user = get_session_user(&state.pool, &token).await?;
    Ok(user.map(|user| AuthUser {
        id: user.id,
        username: user.username,
        is_staff: user.is_staff,
        token,
    }))
}

fn requested_path(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| "/".to_owned())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = RequestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        match resolve_session(parts, state).await? {
            Some(user) => Ok(user),
            None => Err(RequestError::not_authorized(requested_path(parts))),
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = RequestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_session(parts, state).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = RequestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(RequestError::NotFound);
        }
        Ok(StaffUser(user))
    }
}

// ----------------- Session Cookies -----------------

pub fn generate_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .max_age(config.session_lifetime)
        .finish()
}

/// Cookie handed to `CookieJar::remove`; path must match the one it was set with.
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "").path("/").finish()
}

/// Only same-site absolute paths are honoured as post-login targets.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

// ----------------- Passwords -----------------

pub async fn verify_password_argon2(password: String, hash: &str) -> Result<bool> {
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || -> Result<bool> {
        let hash = match PasswordHash::new(hash.as_str()) {
            Ok(hash) => hash,
            // unusable hash: nobody can log in with it
            Err(_) => return Ok(false),
        };
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .context("Failed to verify password")?
}

pub async fn hash_password_argon2(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || -> Result<String> {
        let salt = SaltString::generate(rand::thread_rng());
        let hash = PasswordHash::generate(Argon2::default(), password, salt.as_salt())
            .map_err(|_| anyhow::anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn password_hash_verifies_only_the_original() {
        let hash = hash_password_argon2("correct horse".to_string()).await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password_argon2("correct horse".to_string(), &hash).await.unwrap());
        assert!(!verify_password_argon2("wrong horse".to_string(), &hash).await.unwrap());
        assert!(!verify_password_argon2("anything".to_string(), "garbage").await.unwrap());
    }

    #[test]
    fn session_tokens_are_long_and_unique() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), SESSION_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/post/3/")), "/post/3/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn session_cookie_is_http_only_and_scoped_to_root() {
        let cookie = session_cookie("abc".into(), &Config::default());
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }
}
