//! Data models
//!
//! Plain data carried between the repositories, services and views:
//! users, sessions with their flash notices, and movies with the form
//! types that feed them.

mod movie;
mod session;
mod user;

pub use movie::{
    Movie, MovieForm, MovieInput, MovieWithOwner, DEFAULT_MOVIE_IMAGE, MAX_YEARS_AHEAD, MIN_YEAR,
};
pub use session::{
    GroupedNotices, Notice, NoticeKind, Notices, Session, SessionState, MAX_QUEUED_NOTICES,
};
pub use user::{LoginInput, RegisterInput, User};
