use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::views;

/// Result alias used by the repository layer.
pub type RepoResult<T> = Result<T, RepoError>;

/// RepoError
///
/// Failures surfaced by the persistence layer. Uniqueness violations are split out
/// so handlers can turn them into a flash message instead of a 500.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepoError {
    /// Classifies a raw sqlx error, pulling unique violations into `Conflict`.
    pub fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                let constraint = db.constraint().unwrap_or("unique").to_string();
                return RepoError::Conflict(constraint);
            }
        }
        RepoError::Database(err)
    }
}

/// AppError
///
/// Everything a handler can fail with. Each variant maps to one HTTP status and is
/// rendered as an HTML error page.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("session error: {0}")]
    Session(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::PasswordHash(_) | AppError::Session(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict(constraint) => AppError::Conflict(constraint),
            RepoError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs.
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, views::error_page(status)).into_response()
    }
}
