//! Handler error boundary
//!
//! Recoverable failures turn into error notices plus a `303` redirect,
//! either to the form the request came from or to the error's default
//! target. Persistence and template failures are logged and rendered as
//! the 500 page.

use crate::api::context::{redirect_with, ErrorPage};
use crate::models::Notices;
use crate::services::{MovieServiceError, UserServiceError};
use crate::views::ViewError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// One message per failed rule
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("User with this email or username already exists")]
    DuplicateIdentity,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Movie not found")]
    NotFound,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("Persistence unavailable: {0:#}")]
    PersistenceUnavailable(anyhow::Error),

    #[error("Internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl AppError {
    /// Redirect target used when the handler does not pick one
    pub fn default_target(&self) -> &'static str {
        match self {
            AppError::NotFound | AppError::Forbidden => "/movies",
            AppError::InvalidCredentials => "/login",
            AppError::DuplicateIdentity => "/register",
            _ => "/",
        }
    }

    /// Error notices shown to the user, or `None` for server failures
    pub fn notices(&self) -> Option<Notices> {
        match self {
            AppError::Validation(errors) => Some(
                errors
                    .iter()
                    .fold(Notices::new(), |mut notices, message| {
                        notices.push_error(message.clone());
                        notices
                    }),
            ),
            AppError::PersistenceUnavailable(_) | AppError::Internal(_) => None,
            other => Some(Notices::error(other.to_string())),
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Validation(errors) => AppError::Validation(errors),
            UserServiceError::DuplicateIdentity => AppError::DuplicateIdentity,
            UserServiceError::InvalidCredentials => AppError::InvalidCredentials,
            // an unknown account reads the same as a wrong password
            UserServiceError::NotFound => AppError::InvalidCredentials,
            UserServiceError::Internal(e) => AppError::PersistenceUnavailable(e),
        }
    }
}

impl From<MovieServiceError> for AppError {
    fn from(err: MovieServiceError) -> Self {
        match err {
            MovieServiceError::Validation(errors) => AppError::Validation(errors),
            MovieServiceError::NotFound => AppError::NotFound,
            MovieServiceError::Forbidden => AppError::Forbidden,
            MovieServiceError::Internal(e) => AppError::PersistenceUnavailable(e),
        }
    }
}

impl From<ViewError> for AppError {
    fn from(err: ViewError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

/// An [`AppError`] plus where to send the user back to
#[derive(Debug)]
pub struct Rejection {
    pub error: AppError,
    pub back: Option<String>,
}

impl Rejection {
    pub fn new(error: impl Into<AppError>) -> Self {
        Self {
            error: error.into(),
            back: None,
        }
    }

    pub fn bounce_to(mut self, back: impl Into<String>) -> Self {
        self.back = Some(back.into());
        self
    }
}

impl From<AppError> for Rejection {
    fn from(error: AppError) -> Self {
        Self::new(error)
    }
}

impl From<UserServiceError> for Rejection {
    fn from(error: UserServiceError) -> Self {
        Self::new(error)
    }
}

impl From<MovieServiceError> for Rejection {
    fn from(error: MovieServiceError) -> Self {
        Self::new(error)
    }
}

impl From<ViewError> for Rejection {
    fn from(error: ViewError) -> Self {
        Self::new(error)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self.error.notices() {
            Some(notices) => {
                let target = self
                    .back
                    .unwrap_or_else(|| self.error.default_target().to_string());
                tracing::debug!("Redirecting to {} after: {}", target, self.error);
                redirect_with(&target, notices)
            }
            None => {
                tracing::error!("{}", self.error);
                let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
                response.extensions_mut().insert(ErrorPage::server_error());
                response
            }
        }
    }
}

/// Attach a redirect target to a failed result
pub trait BounceExt<T> {
    fn bounce_to(self, back: impl Into<String>) -> Result<T, Rejection>;
}

impl<T, E> BounceExt<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn bounce_to(self, back: impl Into<String>) -> Result<T, Rejection> {
        self.map_err(|e| Rejection::new(e).bounce_to(back))
    }
}
