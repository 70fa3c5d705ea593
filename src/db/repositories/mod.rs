//! Database repositories
//!
//! One repository per table. Each exposes a trait for the services to hold
//! and an SQLx implementation that dispatches on the configured driver.

pub mod movie;
pub mod session;
pub mod user;

pub use movie::{MovieRepository, SqlxMovieRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Whether a repository error was caused by a UNIQUE constraint.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err)) if db_err.is_unique_violation()
        )
    })
}
