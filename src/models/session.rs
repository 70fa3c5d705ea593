//! Session and flash notice models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side session record, created on login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token carried in the `sid` cookie
    pub token: String,
    pub user_id: i64,
    pub username: String,
    /// Flash notices queued for the next rendered page
    pub notices: Notices,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of resolving a session token.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    /// No token, or an unknown, tampered or expired one
    #[default]
    None,
    Active(Session),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Active(session) => Some(session),
            SessionState::None => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.session().map(|s| s.user_id)
    }

    pub fn username(&self) -> Option<&str> {
        self.session().map(|s| s.username.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Most notices a queue holds; older ones are dropped first.
pub const MAX_QUEUED_NOTICES: usize = 8;

/// Ordered queue of flash notices.
///
/// Serialized as a plain JSON array, which is also the storage format in
/// the `sessions.notices` column and the `flash` cookie. A notice already
/// in the queue is not queued again, and the queue never grows past
/// [`MAX_QUEUED_NOTICES`], so a client that never renders a page cannot
/// inflate its cookie or session row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Notices(Vec<Notice>);

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(message: impl Into<String>) -> Self {
        let mut notices = Self::new();
        notices.push_success(message);
        notices
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut notices = Self::new();
        notices.push_error(message);
        notices
    }

    pub fn push_success(&mut self, message: impl Into<String>) {
        self.push(Notice {
            kind: NoticeKind::Success,
            message: message.into(),
        });
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.push(Notice {
            kind: NoticeKind::Error,
            message: message.into(),
        });
    }

    pub fn push(&mut self, notice: Notice) {
        if self.0.contains(&notice) {
            return;
        }
        self.0.push(notice);
        if self.0.len() > MAX_QUEUED_NOTICES {
            let excess = self.0.len() - MAX_QUEUED_NOTICES;
            self.0.drain(..excess);
        }
    }

    pub fn extend(&mut self, other: Notices) {
        for notice in other.0 {
            self.push(notice);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.0.iter()
    }

    /// Messages of one kind, in queue order
    pub fn messages(&self, kind: NoticeKind) -> Vec<String> {
        self.0
            .iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.message.clone())
            .collect()
    }

    /// Group into the `{ success: [...], error: [...] }` shape templates use
    pub fn grouped(&self) -> GroupedNotices {
        GroupedNotices {
            success: self.messages(NoticeKind::Success),
            error: self.messages(NoticeKind::Error),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupedNotices {
    pub success: Vec<String>,
    pub error: Vec<String>,
}
