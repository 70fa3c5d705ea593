//! Session manager
//!
//! Sessions exist only after a successful login. Each one has a fixed
//! lifetime counted from creation; the store refuses to return a record
//! past its `expires_at`, so callers never check expiry themselves.

use crate::db::repositories::SessionRepository;
use crate::models::{Notices, Session, SessionState};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Session lifetime used when none is configured
pub const DEFAULT_SESSION_MAX_AGE_DAYS: i64 = 7;

pub struct SessionManager {
    repo: Arc<dyn SessionRepository>,
    max_age: Duration,
}

impl SessionManager {
    pub fn new(repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_max_age(repo, Duration::days(DEFAULT_SESSION_MAX_AGE_DAYS))
    }

    pub fn with_max_age(repo: Arc<dyn SessionRepository>, max_age: Duration) -> Self {
        Self { repo, max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Start a session for a user and return its token.
    ///
    /// Tokens are random v4 UUIDs. Expired rows are purged here, which is
    /// the only cleanup the table gets.
    pub async fn create(&self, user_id: i64, username: &str) -> Result<String> {
        let now = Utc::now();

        match self.repo.delete_expired(now).await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!("Purged {} expired session(s)", purged),
            Err(e) => tracing::warn!("Failed to purge expired sessions: {:#}", e),
        }

        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            user_id,
            username: username.to_string(),
            notices: Notices::new(),
            created_at: now,
            expires_at: now + self.max_age,
        };
        self.repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::debug!("Session created for user {}", user_id);
        Ok(session.token)
    }

    /// Look up a token. Unknown and expired tokens resolve to `None`.
    pub async fn resolve(&self, token: &str) -> Result<SessionState> {
        let session = self
            .repo
            .get_active(token, Utc::now())
            .await
            .context("Failed to resolve session")?;
        Ok(session.map_or(SessionState::None, SessionState::Active))
    }

    /// End a session. Destroying an unknown token succeeds.
    pub async fn destroy(&self, token: &str) -> Result<()> {
        self.repo
            .delete(token)
            .await
            .context("Failed to destroy session")
    }

    /// Append notices to the session's flash queue.
    ///
    /// Returns false when the session no longer exists, so the caller can
    /// deliver the notices some other way.
    pub async fn push_notices(&self, token: &str, notices: Notices) -> Result<bool> {
        if notices.is_empty() {
            return Ok(true);
        }
        let Some(session) = self.repo.get_active(token, Utc::now()).await? else {
            return Ok(false);
        };
        let mut queued = session.notices;
        queued.extend(notices);
        self.repo.set_notices(token, &queued).await?;
        Ok(true)
    }

    /// Remove and return everything queued for the session
    pub async fn take_notices(&self, session: &Session) -> Result<Notices> {
        if session.notices.is_empty() {
            return Ok(Notices::new());
        }
        self.repo
            .set_notices(&session.token, &Notices::new())
            .await
            .context("Failed to clear session notices")?;
        Ok(session.notices.clone())
    }
}
