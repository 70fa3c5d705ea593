//! Home page

use axum::{extract::State, response::Response};
use tera::Context as TeraContext;

use crate::api::context::{render, RequestContext};
use crate::api::error::Rejection;
use crate::api::AppState;

/// GET /
pub async fn index(State(state): State<AppState>, ctx: RequestContext) -> Result<Response, Rejection> {
    render(&state, &ctx, "index.html", "Home", TeraContext::new())
}
