mod admin;
mod auth;
mod posts;
mod profiles;

pub use admin::*;
pub use auth::*;
pub use posts::*;
pub use profiles::*;

use axum::{
    http::{header, HeaderMap, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    authentication::{safe_next, AuthUser},
    errors::RequestError,
    flash::{self, Level},
    templates::PageContext,
};

pub type HandlerResult = Result<Response, RequestError>;

// ----------------- Helper Handlers -----------------

pub async fn not_found() -> RequestError {
    RequestError::NotFound
}

/// Drains pending flash messages into the page context. The returned jar
/// carries the cookie removal and must go out with the response.
fn page_context(user: Option<&AuthUser>, jar: CookieJar) -> (CookieJar, PageContext) {
    let (jar, messages) = flash::take(jar);
    let ctx = PageContext {
        username: user.map(|u| u.username.clone()),
        is_staff: user.map(|u| u.is_staff).unwrap_or(false),
        messages,
    };
    (jar, ctx)
}

fn html(jar: CookieJar, page: String) -> HandlerResult {
    Ok((jar, Html(page)).into_response())
}

fn redirect(jar: CookieJar, to: &str) -> HandlerResult {
    Ok((jar, Redirect::to(to)).into_response())
}

fn redirect_with(jar: CookieJar, level: Level, message: impl Into<String>, to: &str) -> HandlerResult {
    redirect(flash::push(jar, level, message), to)
}

fn profile_path(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

/// Path and query of the `Referer` header when it points back into the site.
fn referer_path(headers: &HeaderMap) -> String {
    let path = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Uri>().ok())
        .and_then(|uri| uri.path_and_query().map(|pq| pq.as_str().to_owned()));
    safe_next(path.as_deref()).to_owned()
}
