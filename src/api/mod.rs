//! HTTP layer
//!
//! Server-rendered pages over axum. Routes fall into three classes:
//! - guest only: `/register`, `/login`
//! - authenticated: adding movies, "my movies", and every owner action
//! - public: everything else
//!
//! Unknown paths and known paths hit with the wrong method both get the
//! 404 page. The session middleware wraps the whole router, fallbacks
//! included, so every page (404 too) sees the caller's session and queued
//! notices.

pub mod auth;
pub mod context;
pub mod cookies;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod movies;
pub mod pages;
pub mod static_files;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use context::RequestContext;
pub use cookies::CookieSigner;
pub use error::{AppError, Rejection};
pub use middleware::AppState;

/// Routes only callers without a session may use
fn guest_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route_layer(axum_middleware::from_fn(middleware::require_guest))
}

/// Routes that need a session; owner checks happen in the `OwnedMovie` extractor
fn authenticated_routes() -> Router<AppState> {
    Router::new()
        .route("/movies/add", get(movies::add_page).post(movies::add))
        .route("/movies/my/movies", get(movies::my_movies))
        .route("/movies/{id}/edit", get(movies::edit_page))
        .route(
            "/movies/{id}",
            post(movies::update).put(movies::update).delete(movies::delete),
        )
        .route("/movies/{id}/delete", post(movies::delete))
        .route_layer(axum_middleware::from_fn(middleware::require_authenticated))
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/movies", get(movies::list))
        .route("/movies/{id}", get(movies::view))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(public_routes())
        .merge(guest_routes())
        .merge(authenticated_routes())
        .fallback(static_files::serve_static)
        .method_not_allowed_fallback(static_files::serve_static)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
