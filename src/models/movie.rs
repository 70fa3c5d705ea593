//! Movie model
//!
//! `MovieForm` is the raw form as submitted; `MovieForm::validate` turns it
//! into a `MovieInput` whose fields all satisfy the catalog rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Poster used when a movie is saved without an image URL
pub const DEFAULT_MOVIE_IMAGE: &str = "/images/default-movie.svg";

/// Earliest accepted release year
pub const MIN_YEAR: i32 = 1888;

/// How far past the current year a release may be scheduled
pub const MAX_YEARS_AHEAD: i32 = 5;

pub const MAX_IMAGE_LEN: usize = 2048;

/// A catalog entry, owned by the user who created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub year: i32,
    pub genres: Vec<String>,
    pub rating: f64,
    pub image: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }
}

/// A movie joined with its owner's username, for list and detail pages.
#[derive(Debug, Clone, Serialize)]
pub struct MovieWithOwner {
    #[serde(flatten)]
    pub movie: Movie,
    pub owner_username: String,
}

/// Validated movie fields, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieInput {
    pub name: String,
    pub description: String,
    pub year: i32,
    pub genres: Vec<String>,
    pub rating: f64,
    pub image: String,
}

/// Movie form fields exactly as submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieForm {
    pub name: String,
    pub description: String,
    pub year: String,
    pub genres: Vec<String>,
    pub rating: String,
    pub image: String,
}

impl MovieForm {
    /// Collect a url-encoded body decoded as ordered pairs.
    ///
    /// `genres` may repeat (checkboxes) or carry one value; both end up in
    /// the list. Blank genre values are dropped. Unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "name" => form.name = value,
                "description" => form.description = value,
                "year" => form.year = value,
                "genres" | "genres[]" => {
                    let genre = value.trim();
                    if !genre.is_empty() && !form.genres.iter().any(|g| g == genre) {
                        form.genres.push(genre.to_string());
                    }
                }
                "rating" => form.rating = value,
                "image" => form.image = value,
                _ => {}
            }
        }
        form
    }

    /// Check every rule and report all failures in field order.
    pub fn validate(&self, current_year: i32) -> Result<MovieInput, Vec<String>> {
        let mut errors = Vec::new();
        let max_year = current_year + MAX_YEARS_AHEAD;

        let name = self.name.trim();
        let name_len = name.chars().count();
        if !(1..=200).contains(&name_len) {
            errors.push("Movie name must be between 1 and 200 characters".to_string());
        }

        let description = self.description.trim();
        let description_len = description.chars().count();
        if !(10..=1000).contains(&description_len) {
            errors.push("Description must be between 10 and 1000 characters".to_string());
        }

        let year = self
            .year
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|y| (MIN_YEAR..=max_year).contains(y));
        if year.is_none() {
            errors.push(format!(
                "Year must be between {} and {}",
                MIN_YEAR, max_year
            ));
        }

        if self.genres.is_empty() {
            errors.push("At least one genre must be selected".to_string());
        }

        let rating = self
            .rating
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite() && (0.0..=10.0).contains(r));
        if rating.is_none() {
            errors.push("Rating must be between 0 and 10".to_string());
        }

        let image = self.image.trim();
        if image.chars().count() > MAX_IMAGE_LEN {
            errors.push(format!(
                "Image URL must be at most {} characters",
                MAX_IMAGE_LEN
            ));
        }

        match (year, rating) {
            (Some(year), Some(rating)) if errors.is_empty() => Ok(MovieInput {
                name: name.to_string(),
                description: description.to_string(),
                year,
                genres: self.genres.clone(),
                rating,
                image: if image.is_empty() {
                    DEFAULT_MOVIE_IMAGE.to_string()
                } else {
                    image.to_string()
                },
            }),
            _ => Err(errors),
        }
    }
}
