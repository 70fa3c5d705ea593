//! View engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    /// A template failed to parse at startup
    #[error("Failed to load template {name}: {message}")]
    Load { name: String, message: String },

    /// A template failed to render
    #[error("Template error: {0}")]
    Render(String),
}
