//! Database layer
//!
//! Supports SQLite (default, a single file next to the binary) and MySQL.
//! The driver is chosen from configuration; everything above this module
//! talks to the `DatabasePool` trait and the repositories.
//!
//! ```ignore
//! use cinevault::config::DatabaseConfig;
//! use cinevault::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
