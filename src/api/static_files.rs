//! Static file serving
//!
//! Files under `public/` are embedded at build time and served from the
//! site root (`/css/*`, `/js/*`, `/images/*`). Any other unmatched path gets
//! the "Page Not Found" page.

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

use crate::api::context::ErrorPage;

#[derive(RustEmbed)]
#[folder = "public/"]
struct PublicAssets;

/// Router fallback: an embedded asset, or the 404 page
pub async fn serve_static(method: Method, uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if method == Method::GET || method == Method::HEAD {
        if let Some(content) = PublicAssets::get(path) {
            return build_response(path, &content.data);
        }
    }

    not_found()
}

fn build_response(path: &str, data: &[u8]) -> Response {
    let mut response = Body::from(data.to_vec()).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(get_content_type(path)),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
    response
}

/// 404 response, rendered by the session middleware
pub fn not_found() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    response.extensions_mut().insert(ErrorPage::not_found());
    response
}

/// Get content type from file extension
fn get_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
