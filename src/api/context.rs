//! Per-request context and response markers
//!
//! The session middleware resolves the caller once and stores a
//! [`RequestContext`] in the request extensions. Handlers never touch the
//! session store for notices: they attach markers to the response
//! ([`PendingNotices`], [`SessionIssued`], [`SessionEnded`], [`NoticesShown`],
//! [`ErrorPage`]) and the middleware persists or renders them on the way out.

use crate::api::error::Rejection;
use crate::api::AppState;
use crate::models::{Notices, SessionState};
use crate::views::PageVars;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{Html, IntoResponse, Redirect, Response};
use std::convert::Infallible;
use tera::Context as TeraContext;

pub const LOGIN_REQUIRED_NOTICE: &str = "Please log in to access this page";

/// Who is calling and what is waiting to be shown to them
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session: SessionState,
    /// Notices queued by earlier requests
    pub notices: Notices,
}

impl RequestContext {
    pub fn user_id(&self) -> Option<i64> {
        self.session.user_id()
    }

    /// Standard page variables for this caller
    pub fn page_vars(&self, title: &str) -> PageVars {
        let vars = PageVars::new(title).with_notices(self.notices.grouped());
        match self.session.username() {
            Some(username) => vars.with_user(username),
            None => vars,
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// The logged-in caller. Rejects anonymous requests with the login redirect.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.session.session())
            .map(|session| CurrentUser {
                id: session.user_id,
                username: session.username.clone(),
            })
            .ok_or_else(login_redirect)
    }
}

/// Notices the handler wants shown on the next rendered page
#[derive(Debug, Clone)]
pub struct PendingNotices(pub Notices);

/// A session was created for this response; its cookie must be set
#[derive(Debug, Clone)]
pub struct SessionIssued(pub String);

/// The caller's session was destroyed; its cookie must be cleared
#[derive(Debug, Clone, Copy)]
pub struct SessionEnded;

/// The response rendered the caller's queued notices
#[derive(Debug, Clone, Copy)]
pub struct NoticesShown;

/// Status page to be rendered by the session middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPage {
    pub title: &'static str,
    pub message: &'static str,
}

impl ErrorPage {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found",
            message: "The page you are looking for does not exist.",
        }
    }

    pub fn server_error() -> Self {
        Self {
            title: "Server Error",
            message: "Something went wrong on our server.",
        }
    }
}

/// `303 See Other` to `to`
pub fn redirect(to: &str) -> Response {
    Redirect::to(to).into_response()
}

/// `303 See Other` to `to`, queueing `notices` for the next page
pub fn redirect_with(to: &str, notices: Notices) -> Response {
    let mut response = redirect(to);
    if !notices.is_empty() {
        response.extensions_mut().insert(PendingNotices(notices));
    }
    response
}

pub fn login_redirect() -> Response {
    redirect_with("/login", Notices::error(LOGIN_REQUIRED_NOTICE))
}

/// Render a page template for the caller
pub fn render(
    state: &AppState,
    ctx: &RequestContext,
    template: &str,
    title: &str,
    context: TeraContext,
) -> Result<Response, Rejection> {
    let html = state
        .views
        .render_page(template, &ctx.page_vars(title), context)?;
    let mut response = Html(html).into_response();
    response.extensions_mut().insert(NoticesShown);
    Ok(response)
}
