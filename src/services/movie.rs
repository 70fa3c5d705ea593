//! Movie service
//!
//! Catalog operations plus the ownership check that guards every edit and
//! delete. Mutating methods take the `Movie` returned by
//! [`MovieService::check_ownership`] so they never act on a record whose
//! owner was not compared.

use crate::db::repositories::MovieRepository;
use crate::models::{Movie, MovieForm, MovieWithOwner};
use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, SubsecRound, Utc};
use std::sync::Arc;

/// Error types for movie service operations
#[derive(Debug, thiserror::Error)]
pub enum MovieServiceError {
    /// One message per failed rule, in field order
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Movie not found")]
    NotFound,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct MovieService {
    repo: Arc<dyn MovieRepository>,
}

/// Timestamp precision shared by both backends
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next `updated_at` for a record last touched at `previous`.
///
/// Always strictly later than `previous`, even if the clock did not move
/// or went backwards.
pub fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

impl MovieService {
    pub fn new(repo: Arc<dyn MovieRepository>) -> Self {
        Self { repo }
    }

    /// Validate a submitted form and store it with `owner_id` as owner
    pub async fn create(&self, owner_id: i64, form: &MovieForm) -> Result<Movie, MovieServiceError> {
        let input = form
            .validate(Utc::now().year())
            .map_err(MovieServiceError::Validation)?;

        let movie = self
            .repo
            .create(owner_id, &input, now_micros())
            .await
            .context("Failed to create movie")?;

        tracing::info!("User {} added movie {}", owner_id, movie.id);
        Ok(movie)
    }

    pub async fn list_all(&self) -> Result<Vec<MovieWithOwner>, MovieServiceError> {
        Ok(self.repo.list_all().await.context("Failed to list movies")?)
    }

    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<MovieWithOwner>, MovieServiceError> {
        Ok(self
            .repo
            .list_by_owner(owner_id)
            .await
            .context("Failed to list movies by owner")?)
    }

    /// Load a movie with its owner's username for the detail page
    pub async fn get_with_owner(&self, id: i64) -> Result<MovieWithOwner, MovieServiceError> {
        self.repo
            .get_with_owner(id)
            .await
            .context("Failed to get movie")?
            .ok_or(MovieServiceError::NotFound)
    }

    /// Load a movie and confirm `user_id` owns it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no movie has this id
    /// - `Forbidden` if it belongs to someone else
    pub async fn check_ownership(&self, id: i64, user_id: i64) -> Result<Movie, MovieServiceError> {
        let movie = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get movie")?
            .ok_or(MovieServiceError::NotFound)?;

        if !movie.is_owned_by(user_id) {
            tracing::warn!(
                "User {} denied access to movie {} owned by {}",
                user_id,
                movie.id,
                movie.owner_id
            );
            return Err(MovieServiceError::Forbidden);
        }

        Ok(movie)
    }

    /// Apply a validated form to an owned movie in one write.
    ///
    /// Concurrent edits by the owner are last-write-wins.
    pub async fn update(&self, movie: &Movie, form: &MovieForm) -> Result<Movie, MovieServiceError> {
        let input = form
            .validate(Utc::now().year())
            .map_err(MovieServiceError::Validation)?;
        let updated_at = next_updated_at(movie.updated_at, now_micros());

        let found = self
            .repo
            .update(movie.id, &input, updated_at)
            .await
            .context("Failed to update movie")?;
        if !found {
            return Err(MovieServiceError::NotFound);
        }

        tracing::info!("User {} updated movie {}", movie.owner_id, movie.id);
        Ok(Movie {
            name: input.name,
            description: input.description,
            year: input.year,
            genres: input.genres,
            rating: input.rating,
            image: input.image,
            updated_at,
            ..movie.clone()
        })
    }

    /// Delete an owned movie
    pub async fn delete(&self, movie: &Movie) -> Result<(), MovieServiceError> {
        let found = self
            .repo
            .delete(movie.id)
            .await
            .context("Failed to delete movie")?;
        if !found {
            return Err(MovieServiceError::NotFound);
        }
        tracing::info!("User {} deleted movie {}", movie.owner_id, movie.id);
        Ok(())
    }
}
