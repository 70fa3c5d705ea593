//! Movie repository
//!
//! - `MovieRepository` trait defining the interface for catalog storage
//! - `SqlxMovieRepository` implementing it for SQLite and MySQL
//!
//! Genres are kept as a JSON array in a text column. Listings are ordered
//! newest first, ties broken by id, and carry the owner's username.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Movie, MovieInput, MovieWithOwner};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait MovieRepository: Send + Sync {
    /// Insert a movie owned by `owner_id`, stamped with `now`
    async fn create(&self, owner_id: i64, input: &MovieInput, now: DateTime<Utc>) -> Result<Movie>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Movie>>;

    async fn get_with_owner(&self, id: i64) -> Result<Option<MovieWithOwner>>;

    /// Every movie, newest first
    async fn list_all(&self) -> Result<Vec<MovieWithOwner>>;

    /// Movies owned by one user, newest first
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<MovieWithOwner>>;

    /// Overwrite the editable fields in a single write.
    /// Returns false when no row matched.
    async fn update(&self, id: i64, input: &MovieInput, updated_at: DateTime<Utc>) -> Result<bool>;

    /// Returns false when no row matched
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based movie repository for both SQLite and MySQL
pub struct SqlxMovieRepository {
    pool: DynDatabasePool,
}

impl SqlxMovieRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MovieRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_MOVIE: &str = r#"
    INSERT INTO movies (name, description, year, genres, rating, image, owner_id, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_MOVIE: &str = r#"
    UPDATE movies
    SET name = ?, description = ?, year = ?, genres = ?, rating = ?, image = ?, updated_at = ?
    WHERE id = ?
"#;

const SELECT_MOVIE: &str = r#"
    SELECT id, name, description, year, genres, rating, image, owner_id, created_at, updated_at
    FROM movies
    WHERE id = ?
"#;

const SELECT_WITH_OWNER: &str = r#"
    SELECT m.id, m.name, m.description, m.year, m.genres, m.rating, m.image,
           m.owner_id, m.created_at, m.updated_at, u.username AS owner_username
    FROM movies m
    INNER JOIN users u ON u.id = m.owner_id
"#;

const NEWEST_FIRST: &str = "ORDER BY m.created_at DESC, m.id DESC";

#[async_trait]
impl MovieRepository for SqlxMovieRepository {
    async fn create(&self, owner_id: i64, input: &MovieInput, now: DateTime<Utc>) -> Result<Movie> {
        let genres = serde_json::to_string(&input.genres)?;
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_MOVIE)
                .bind(&input.name)
                .bind(&input.description)
                .bind(input.year)
                .bind(&genres)
                .bind(input.rating)
                .bind(&input.image)
                .bind(owner_id)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(INSERT_MOVIE)
                .bind(&input.name)
                .bind(&input.description)
                .bind(input.year)
                .bind(&genres)
                .bind(input.rating)
                .bind(&input.image)
                .bind(owner_id)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create movie")?;

        Ok(Movie {
            id,
            name: input.name.clone(),
            description: input.description.clone(),
            year: input.year,
            genres: input.genres.clone(),
            rating: input.rating,
            image: input.image.clone(),
            owner_id,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Movie>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_MOVIE)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get movie by ID")?;
                row.as_ref().map(row_to_movie_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_MOVIE)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get movie by ID")?;
                row.as_ref().map(row_to_movie_mysql).transpose()
            }
        }
    }

    async fn get_with_owner(&self, id: i64) -> Result<Option<MovieWithOwner>> {
        let sql = format!("{SELECT_WITH_OWNER} WHERE m.id = ?");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get movie with owner")?;
                row.as_ref().map(row_to_movie_with_owner_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get movie with owner")?;
                row.as_ref().map(row_to_movie_with_owner_mysql).transpose()
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<MovieWithOwner>> {
        let sql = format!("{SELECT_WITH_OWNER} {NEWEST_FIRST}");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list movies")?;
                rows.iter().map(row_to_movie_with_owner_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list movies")?;
                rows.iter().map(row_to_movie_with_owner_mysql).collect()
            }
        }
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<MovieWithOwner>> {
        let sql = format!("{SELECT_WITH_OWNER} WHERE m.owner_id = ? {NEWEST_FIRST}");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(owner_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list movies by owner")?;
                rows.iter().map(row_to_movie_with_owner_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(owner_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list movies by owner")?;
                rows.iter().map(row_to_movie_with_owner_mysql).collect()
            }
        }
    }

    async fn update(&self, id: i64, input: &MovieInput, updated_at: DateTime<Utc>) -> Result<bool> {
        let genres = serde_json::to_string(&input.genres)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(UPDATE_MOVIE)
                .bind(&input.name)
                .bind(&input.description)
                .bind(input.year)
                .bind(&genres)
                .bind(input.rating)
                .bind(&input.image)
                .bind(updated_at)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected() > 0),
            DatabaseDriver::Mysql => sqlx::query(UPDATE_MOVIE)
                .bind(&input.name)
                .bind(&input.description)
                .bind(input.year)
                .bind(&genres)
                .bind(input.rating)
                .bind(&input.image)
                .bind(updated_at)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected() > 0),
        }
        .context("Failed to update movie")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM movies WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected() > 0),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected() > 0),
        }
        .context("Failed to delete movie")
    }
}

fn parse_genres(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).with_context(|| format!("Invalid genres stored for movie: {}", raw))
}

fn row_to_movie_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Movie> {
    let genres: String = row.get("genres");
    Ok(Movie {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        year: row.get("year"),
        genres: parse_genres(&genres)?,
        rating: row.get("rating"),
        image: row.get("image"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_movie_with_owner_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<MovieWithOwner> {
    Ok(MovieWithOwner {
        movie: row_to_movie_sqlite(row)?,
        owner_username: row.get("owner_username"),
    })
}

fn row_to_movie_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Movie> {
    let genres: String = row.get("genres");
    Ok(Movie {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        year: row.get("year"),
        genres: parse_genres(&genres)?,
        rating: row.get("rating"),
        image: row.get("image"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_movie_with_owner_mysql(row: &sqlx::mysql::MySqlRow) -> Result<MovieWithOwner> {
    Ok(MovieWithOwner {
        movie: row_to_movie_mysql(row)?,
        owner_username: row.get("owner_username"),
    })
}
