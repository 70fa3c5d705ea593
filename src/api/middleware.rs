//! HTTP middleware
//!
//! Contains middleware for:
//! - Session resolution and notice delivery (every request)
//! - Authentication guards (per route class)

use crate::api::context::{
    login_redirect, redirect, ErrorPage, NoticesShown, PendingNotices, RequestContext,
    SessionEnded, SessionIssued,
};
use crate::api::cookies::{self, CookieSigner, SESSION_COOKIE};
use crate::models::{Notices, SessionState};
use crate::services::{MovieService, SessionManager, UserService};
use crate::views::ViewEngine;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub session_manager: Arc<SessionManager>,
    pub movie_service: Arc<MovieService>,
    pub views: Arc<ViewEngine>,
    pub cookies: CookieSigner,
}

/// Session middleware
///
/// Resolves the `sid` cookie into a [`RequestContext`] before the handler
/// runs. Afterwards it renders any [`ErrorPage`], then settles notices:
/// whatever was rendered is dropped from the queue, anything not yet shown
/// plus the handler's [`PendingNotices`] is kept for the next page. The
/// queue lives in the session record when there is one and in the signed
/// `flash` cookie otherwise.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let had_sid = cookies::read_cookie(headers, SESSION_COOKIE).is_some();
    let flash = state.cookies.read_flash(headers);

    let session = match state.cookies.session_token(headers) {
        Some(token) => match state.session_manager.resolve(&token).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Failed to resolve session: {:#}", e);
                return error_page_response(
                    &state,
                    &RequestContext::default(),
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorPage::server_error(),
                );
            }
        },
        None => SessionState::None,
    };

    let mut incoming = session
        .session()
        .map(|s| s.notices.clone())
        .unwrap_or_default();
    if let Some(flash) = &flash {
        incoming.extend(flash.clone());
    }

    let ctx = RequestContext {
        session,
        notices: incoming,
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;

    if let Some(page) = response.extensions_mut().remove::<ErrorPage>() {
        let status = response.status();
        response = error_page_response(&state, &ctx, status, page);
    }

    let shown = response.extensions_mut().remove::<NoticesShown>().is_some();
    let pending = response
        .extensions_mut()
        .remove::<PendingNotices>()
        .map(|p| p.0)
        .unwrap_or_default();
    let issued = response.extensions_mut().remove::<SessionIssued>();
    let ended = response.extensions_mut().remove::<SessionEnded>().is_some();

    let mut set_cookies = Vec::new();
    let mut outgoing = if shown { Notices::new() } else { ctx.notices.clone() };

    match (issued, ctx.session.session()) {
        (Some(SessionIssued(token)), _) => {
            set_cookies.push(
                state
                    .cookies
                    .session_cookie(&token, state.session_manager.max_age().num_seconds()),
            );
            outgoing.extend(pending);
            if let Err(e) = state.session_manager.push_notices(&token, outgoing).await {
                tracing::warn!("Failed to queue notices for new session: {:#}", e);
            }
            if flash.is_some() {
                set_cookies.push(cookies::clear_flash_cookie());
            }
        }
        (None, Some(session)) if !ended => {
            if shown {
                if let Err(e) = state.session_manager.take_notices(session).await {
                    tracing::warn!("Failed to clear session notices: {:#}", e);
                }
                if flash.is_some() {
                    set_cookies.push(cookies::clear_flash_cookie());
                }
            }
            match state.session_manager.push_notices(&session.token, pending).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!("Session ended before notices could be queued"),
                Err(e) => tracing::warn!("Failed to queue session notices: {:#}", e),
            }
        }
        _ => {
            if ended || had_sid {
                set_cookies.push(cookies::clear_session_cookie());
            }
            let unchanged = !shown && !ended && pending.is_empty();
            outgoing.extend(pending);
            if !unchanged {
                match state.cookies.flash_cookie(&outgoing) {
                    Some(cookie) => set_cookies.push(cookie),
                    None if flash.is_some() => set_cookies.push(cookies::clear_flash_cookie()),
                    None => {}
                }
            }
        }
    }

    for cookie in set_cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Dropping malformed Set-Cookie value: {}", e),
        }
    }

    response
}

fn error_page_response(
    state: &AppState,
    ctx: &RequestContext,
    status: StatusCode,
    page: ErrorPage,
) -> Response {
    let html = state
        .views
        .render_error_page(&ctx.page_vars(page.title), page.message);
    let mut response = (status, Html(html)).into_response();
    response.extensions_mut().insert(NoticesShown);
    response
}

/// Authentication guard: anonymous callers are sent to the login page
pub async fn require_authenticated(request: Request, next: Next) -> Response {
    let active = request
        .extensions()
        .get::<RequestContext>()
        .is_some_and(|ctx| ctx.session.is_active());

    if !active {
        tracing::debug!("Anonymous request to {} sent to login", request.uri().path());
        return login_redirect();
    }
    next.run(request).await
}

/// Guest guard: logged-in callers skip the login and registration pages
pub async fn require_guest(request: Request, next: Next) -> Response {
    let active = request
        .extensions()
        .get::<RequestContext>()
        .is_some_and(|ctx| ctx.session.is_active());

    if active {
        return redirect("/movies");
    }
    next.run(request).await
}
