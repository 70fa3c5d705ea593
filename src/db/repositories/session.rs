//! Session repository
//!
//! - `SessionRepository` trait defining the interface for session storage
//! - `SqlxSessionRepository` implementing it for SQLite and MySQL
//!
//! Expiry is enforced here: `get_active` only returns rows whose
//! `expires_at` lies after the supplied instant.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Notices, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<()>;

    /// Fetch a session that has not expired at `now`
    async fn get_active(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>>;

    /// Delete by token. Deleting a missing token is not an error.
    async fn delete(&self, token: &str) -> Result<()>;

    /// Purge sessions expired at `now`, returning how many were removed
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Replace the queued notices of a session
    async fn set_notices(&self, token: &str, notices: &Notices) -> Result<()>;
}

/// SQLx-based session repository for both SQLite and MySQL
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_SESSION: &str = r#"
    INSERT INTO sessions (token, user_id, username, notices, created_at, expires_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const SELECT_ACTIVE: &str = r#"
    SELECT token, user_id, username, notices, created_at, expires_at
    FROM sessions
    WHERE token = ? AND expires_at > ?
"#;

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<()> {
        let notices = serde_json::to_string(&session.notices)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(INSERT_SESSION)
                    .bind(&session.token)
                    .bind(session.user_id)
                    .bind(&session.username)
                    .bind(&notices)
                    .bind(session.created_at)
                    .bind(session.expires_at)
                    .execute(self.pool.sqlite()?)
                    .await
                    .map(|_| ())
            }
            DatabaseDriver::Mysql => {
                sqlx::query(INSERT_SESSION)
                    .bind(&session.token)
                    .bind(session.user_id)
                    .bind(&session.username)
                    .bind(&notices)
                    .bind(session.created_at)
                    .bind(session.expires_at)
                    .execute(self.pool.mysql()?)
                    .await
                    .map(|_| ())
            }
        }
        .context("Failed to create session")
    }

    async fn get_active(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_ACTIVE)
                    .bind(token)
                    .bind(now)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get session")?;
                row.as_ref().map(row_to_session_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_ACTIVE)
                    .bind(token)
                    .bind(now)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get session")?;
                row.as_ref().map(row_to_session_mysql).transpose()
            }
        }
    }

    async fn delete(&self, token: &str) -> Result<()> {
        let sql = "DELETE FROM sessions WHERE token = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(token)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(token)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to delete session")
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE expires_at <= ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete expired sessions")
    }

    async fn set_notices(&self, token: &str, notices: &Notices) -> Result<()> {
        let sql = "UPDATE sessions SET notices = ? WHERE token = ?";
        let notices = serde_json::to_string(notices)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&notices)
                .bind(token)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&notices)
                .bind(token)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to store session notices")
    }
}

fn parse_notices(raw: &str) -> Result<Notices> {
    serde_json::from_str(raw).context("Invalid notices stored in session")
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    let notices: String = row.get("notices");
    Ok(Session {
        token: row.get("token"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        notices: parse_notices(&notices)?,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    })
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Session> {
    let notices: String = row.get("notices");
    Ok(Session {
        token: row.get("token"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        notices: parse_notices(&notices)?,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    })
}
