//! User repository
//!
//! - `UserRepository` trait defining the interface for account storage
//! - `SqlxUserRepository` implementing it for SQLite and MySQL
//!
//! The UNIQUE constraints on `username` and `email` are the final word on
//! duplicates; callers can recognise them with [`super::is_unique_violation`].

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user and return it with its assigned id
    async fn create(&self, user: &User) -> Result<User>;

    /// Look up by email. The address must already be normalized.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// True when either the username or the email is taken
    async fn exists_by_username_or_email(&self, username: &str, email: &str) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository for both SQLite and MySQL
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get user by email")?;
                Ok(row.as_ref().map(row_to_user_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get user by email")?;
                Ok(row.as_ref().map(row_to_user_mysql))
            }
        }
    }

    async fn exists_by_username_or_email(&self, username: &str, email: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM users WHERE username = ? OR email = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql)
                    .bind(username)
                    .bind(email)
                    .fetch_one(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql)
                    .bind(username)
                    .bind(email)
                    .fetch_one(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to check for existing user")?;
        Ok(count > 0)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM users";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql).fetch_one(self.pool.mysql()?).await,
        }
        .context("Failed to count users")
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.created_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        ..user.clone()
    })
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.created_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        ..user.clone()
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::is_unique_violation;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(username: &str, email: &str) -> User {
        User::new(username.to_string(), email.to_string(), "hash".to_string())
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&test_user("alice", "alice@example.com"))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);

        let by_email = repo
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .expect("by email");
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.username, "alice");
        assert_eq!(by_email.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_lookup_missing() {
        let repo = setup_test_repo().await;
        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_by_username_or_email() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(repo
            .exists_by_username_or_email("alice", "x@example.com")
            .await
            .unwrap());
        assert!(repo
            .exists_by_username_or_email("bob", "alice@example.com")
            .await
            .unwrap());
        assert!(!repo
            .exists_by_username_or_email("bob", "bob@example.com")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_unique_violation() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = repo
            .create(&test_user("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
