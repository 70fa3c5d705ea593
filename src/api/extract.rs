//! Custom extractors

use crate::api::context::{login_redirect, RequestContext};
use crate::api::error::{AppError, Rejection};
use crate::api::AppState;
use crate::models::Movie;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

/// Parse a movie id from the path. Anything that is not a number is
/// reported as a missing movie.
pub fn parse_movie_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>().map_err(|_| AppError::NotFound)
}

/// A movie the caller owns, loaded from the `{id}` path segment.
///
/// Rejects with the login redirect for anonymous callers, `NotFound` for an
/// unknown or malformed id, and `Forbidden` for someone else's movie.
#[derive(Debug, Clone)]
pub struct OwnedMovie(pub Movie);

impl FromRequestParts<AppState> for OwnedMovie {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.user_id())
            .ok_or_else(login_redirect)?;

        let Path(raw_id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| Rejection::from(AppError::NotFound).into_response())?;
        let id = parse_movie_id(&raw_id).map_err(|e| Rejection::from(e).into_response())?;

        state
            .movie_service
            .check_ownership(id, user_id)
            .await
            .map(OwnedMovie)
            .map_err(|e| Rejection::from(e).into_response())
    }
}
