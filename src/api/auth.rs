//! Account endpoints
//!
//! - GET/POST /register - Registration form and submission
//! - GET/POST /login - Login form and submission
//! - GET/POST /logout - End the session

use axum::{
    extract::State,
    response::Response,
    Form,
};
use tera::Context as TeraContext;

use crate::api::context::{
    redirect, redirect_with, render, RequestContext, SessionEnded, SessionIssued,
};
use crate::api::error::{AppError, BounceExt, Rejection};
use crate::api::AppState;
use crate::models::{LoginInput, Notices, RegisterInput};

/// GET /register
pub async fn register_page(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, Rejection> {
    render(&state, &ctx, "register.html", "Register", TeraContext::new())
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Form(input): Form<RegisterInput>,
) -> Result<Response, Rejection> {
    state.user_service.register(input).await.bounce_to("/register")?;

    Ok(redirect_with(
        "/login",
        Notices::success("Registration successful! Please log in."),
    ))
}

/// GET /login
pub async fn login_page(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, Rejection> {
    render(&state, &ctx, "login.html", "Login", TeraContext::new())
}

/// POST /login
///
/// Unknown email and wrong password produce the same notice.
pub async fn login(
    State(state): State<AppState>,
    Form(input): Form<LoginInput>,
) -> Result<Response, Rejection> {
    let user = state
        .user_service
        .authenticate(&input.email, &input.password)
        .await
        .bounce_to("/login")?;

    let token = state
        .session_manager
        .create(user.id, &user.username)
        .await
        .map_err(AppError::PersistenceUnavailable)?;
    tracing::info!("User {} logged in", user.id);

    let mut response = redirect_with(
        "/movies",
        Notices::success(format!("Welcome back, {}!", user.username)),
    );
    response.extensions_mut().insert(SessionIssued(token));
    Ok(response)
}

/// GET|POST /logout
///
/// Succeeds whether or not the caller had a session.
pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, Rejection> {
    if let Some(session) = ctx.session.session() {
        state
            .session_manager
            .destroy(&session.token)
            .await
            .map_err(AppError::PersistenceUnavailable)?;
        tracing::info!("User {} logged out", session.user_id);
    }

    let mut response = redirect("/");
    response.extensions_mut().insert(SessionEnded);
    Ok(response)
}
