//! Services layer
//!
//! Business rules sit here, between the HTTP handlers and the repositories:
//! account registration and login checks, the session lifecycle, and the
//! movie catalog with its ownership rule.

pub mod movie;
pub mod password;
pub mod session;
pub mod user;

pub use movie::{MovieService, MovieServiceError};
pub use password::{hash_password, verify_password};
pub use session::SessionManager;
pub use user::{UserService, UserServiceError};
