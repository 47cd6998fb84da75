use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::error;

use crate::templates::pages;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Missing entity, or an entity the caller does not own.
    #[error("not found")]
    NotFound,
    #[error("authentication required for {next}")]
    NotAuthorized { next: String },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error(transparent)]
    ServerError(#[from] anyhow::Error),
}

impl RequestError {
    pub fn not_authorized(next: impl Into<String>) -> Self {
        Self::NotAuthorized { next: next.into() }
    }

    /// True when the underlying database error is a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            RequestError::DatabaseError(e) => is_unique_violation(e),
            _ => false,
        }
    }
}

pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(e) = error {
        return e.message().contains("UNIQUE constraint failed");
    }
    false
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        match self {
            RequestError::NotFound => {
                (StatusCode::NOT_FOUND, Html(pages::not_found_page())).into_response()
            }
            RequestError::NotAuthorized { next } => {
                let location = format!("/login/?next={}", urlencoding::encode(&next));
                Redirect::to(&location).into_response()
            }
            RequestError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Html(pages::bad_request_page(&message)),
            )
                .into_response(),
            RequestError::DatabaseError(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(pages::server_error_page()),
                )
                    .into_response()
            }
            RequestError::ServerError(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(pages::server_error_page()),
                )
                    .into_response()
            }
        }
    }
}
