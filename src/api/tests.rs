//! Router-level tests
//!
//! Each test drives the full router with `tower::ServiceExt::oneshot`
//! against an in-memory database, carrying cookies between requests the
//! way a browser would.

use super::*;
use crate::db::repositories::{SqlxMovieRepository, SqlxSessionRepository, SqlxUserRepository};
use crate::db::{create_test_pool, migrations};
use crate::models::Movie;
use crate::services::{MovieService, SessionManager, UserService};
use crate::views::ViewEngine;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use chrono::Datelike;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

const ARRIVAL: &str = "name=Arrival&description=A+linguist+deciphers+an+alien+language.\
&year=2016&genres=Sci-Fi&rating=8.0&image=";

async fn test_state() -> AppState {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    AppState {
        user_service: Arc::new(UserService::new(SqlxUserRepository::boxed(pool.clone()))),
        session_manager: Arc::new(SessionManager::new(SqlxSessionRepository::boxed(pool.clone()))),
        movie_service: Arc::new(MovieService::new(SqlxMovieRepository::boxed(pool))),
        views: Arc::new(ViewEngine::new().expect("templates should load")),
        cookies: CookieSigner::new(b"router-test-secret-0123456789").unwrap(),
    }
}

/// One browser: a router plus a cookie jar
struct Browser {
    app: Router,
    jar: BTreeMap<String, String>,
}

impl Browser {
    fn new(state: &AppState) -> Self {
        Self {
            app: build_router(state.clone()),
            jar: BTreeMap::new(),
        }
    }

    async fn send(&mut self, method: Method, uri: &str, form: Option<&str>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.jar.is_empty() {
            let cookie = self
                .jar
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let value = value.to_str().unwrap();
            let (name, rest) = value.split_once('=').unwrap();
            let cookie_value = rest.split(';').next().unwrap();
            if value.contains("Max-Age=0") {
                self.jar.remove(name);
            } else {
                self.jar.insert(name.to_string(), cookie_value.to_string());
            }
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&mut self, uri: &str, form: &str) -> Response {
        self.send(Method::POST, uri, Some(form)).await
    }

    async fn page(&mut self, uri: &str) -> String {
        let response = self.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        body_text(response).await
    }

    async fn register(&mut self, username: &str, email: &str, password: &str) -> Response {
        let form = format!(
            "username={username}&email={email}&password={password}&confirmPassword={password}"
        );
        self.post("/register", &form).await
    }

    async fn login(&mut self, email: &str, password: &str) -> Response {
        self.post("/login", &format!("email={email}&password={password}"))
            .await
    }

    async fn signed_up(&mut self, username: &str) {
        let email = format!("{username}@x.com");
        assert_eq!(
            location(&self.register(username, &email, "secret1").await),
            "/login"
        );
        assert_eq!(location(&self.login(&email, "secret1").await), "/movies");
    }
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> String {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

async fn all_movies(state: &AppState) -> Vec<Movie> {
    state
        .movie_service
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.movie)
        .collect()
}

#[tokio::test]
async fn test_register_login_and_add_movie() {
    let state = test_state().await;
    let mut alice = Browser::new(&state);

    let response = alice.register("alice", "alice@x.com", "secret1").await;
    assert_eq!(location(&response), "/login");
    let html = alice.page("/login").await;
    assert!(html.contains("Registration successful! Please log in."));

    let response = alice.login("alice@x.com", "secret1").await;
    assert_eq!(location(&response), "/movies");
    assert!(alice.jar.contains_key("sid"));

    let html = alice.page("/movies").await;
    assert!(html.contains("Welcome back, alice!"));

    let response = alice.post("/movies/add", ARRIVAL).await;
    assert_eq!(location(&response), "/movies");

    let html = alice.page("/movies/my/movies").await;
    assert!(html.contains("Movie added successfully!"));
    assert!(html.contains("Arrival"));

    let mut anonymous = Browser::new(&state);
    let html = anonymous.page("/movies").await;
    assert!(html.contains("Arrival"));
    assert!(html.contains("Added by alice"));

    let movies = all_movies(&state).await;
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].genres, vec!["Sci-Fi"]);
    assert_eq!(movies[0].rating, 8.0);
}

#[tokio::test]
async fn test_non_owner_cannot_edit_or_delete() {
    let state = test_state().await;
    let mut bob = Browser::new(&state);
    bob.signed_up("bob").await;
    bob.post("/movies/add", ARRIVAL).await;
    let original = all_movies(&state).await.remove(0);
    let id = original.id;

    let mut alice = Browser::new(&state);
    alice.signed_up("alice").await;

    let response = alice.get(&format!("/movies/{id}/edit")).await;
    assert_eq!(location(&response), "/movies");
    let html = alice.page("/movies").await;
    assert!(html.contains("You do not have permission to perform this action"));

    let edit = ARRIVAL.replace("name=Arrival", "name=Hijacked");
    let response = alice.post(&format!("/movies/{id}"), &edit).await;
    assert_eq!(location(&response), "/movies");
    let response = alice.send(Method::PUT, &format!("/movies/{id}"), Some(&edit)).await;
    assert_eq!(location(&response), "/movies");
    let response = alice.post(&format!("/movies/{id}/delete"), "").await;
    assert_eq!(location(&response), "/movies");
    let response = alice.send(Method::DELETE, &format!("/movies/{id}"), None).await;
    assert_eq!(location(&response), "/movies");

    let stored = all_movies(&state).await;
    assert_eq!(stored, vec![original]);

    // the owner page hides edit controls from others
    let html = alice.page(&format!("/movies/{id}")).await;
    assert!(!html.contains(&format!("/movies/{id}/edit")));
}

#[tokio::test]
async fn test_anonymous_add_is_sent_to_login() {
    let state = test_state().await;
    let mut anonymous = Browser::new(&state);

    let response = anonymous.get("/movies/add").await;
    assert_eq!(location(&response), "/login");
    let html = anonymous.page("/login").await;
    assert!(html.contains("Please log in to access this page"));

    let response = anonymous.post("/movies/add", ARRIVAL).await;
    assert_eq!(location(&response), "/login");
    assert!(all_movies(&state).await.is_empty());

    // the notice is read once
    let html = anonymous.page("/login").await;
    assert!(html.contains("Please log in to access this page"));
    let html = anonymous.page("/login").await;
    assert!(!html.contains("Please log in to access this page"));
}

#[tokio::test]
async fn test_repeated_bounces_keep_flash_cookie_small() {
    let state = test_state().await;
    let mut anonymous = Browser::new(&state);

    for _ in 0..60 {
        let response = anonymous.post("/movies/add", ARRIVAL).await;
        assert_eq!(location(&response), "/login");
    }
    assert!(anonymous.jar["flash"].len() < 512);

    let html = anonymous.page("/login").await;
    assert_eq!(html.matches("Please log in to access this page").count(), 1);
}

#[tokio::test]
async fn test_invalid_year_bounces_to_add_form() {
    let state = test_state().await;
    let mut alice = Browser::new(&state);
    alice.signed_up("alice").await;

    let response = alice
        .post("/movies/add", &ARRIVAL.replace("year=2016", "year=1700"))
        .await;
    assert_eq!(location(&response), "/movies/add");

    let max_year = chrono::Utc::now().year() + 5;
    let html = alice.page("/movies/add").await;
    assert!(html.contains(&format!("Year must be between 1888 and {max_year}")));
    assert!(all_movies(&state).await.is_empty());
}

#[tokio::test]
async fn test_owner_updates_and_deletes() {
    let state = test_state().await;
    let mut alice = Browser::new(&state);
    alice.signed_up("alice").await;
    alice.post("/movies/add", ARRIVAL).await;
    let before = all_movies(&state).await.remove(0);
    let id = before.id;

    let html = alice.page(&format!("/movies/{id}/edit")).await;
    assert!(html.contains("value=\"Arrival\""));

    let edit = ARRIVAL
        .replace("name=Arrival", "name=Arrival+Redux")
        .replace("genres=Sci-Fi", "genres=Sci-Fi&genres=Drama");
    let response = alice.send(Method::PUT, &format!("/movies/{id}"), Some(&edit)).await;
    assert_eq!(location(&response), format!("/movies/{id}"));

    let html = alice.page(&format!("/movies/{id}")).await;
    assert!(html.contains("Movie updated successfully!"));
    assert!(html.contains(&format!("/movies/{id}/edit")));

    let after = all_movies(&state).await.remove(0);
    assert_eq!(after.name, "Arrival Redux");
    assert_eq!(after.genres, vec!["Sci-Fi", "Drama"]);
    assert!(after.updated_at > before.updated_at);
    assert_eq!(after.created_at, before.created_at);

    let response = alice.post(&format!("/movies/{id}/delete"), "").await;
    assert_eq!(location(&response), "/movies");
    let html = alice.page("/movies").await;
    assert!(html.contains("Movie deleted successfully!"));
    assert!(all_movies(&state).await.is_empty());
}

#[tokio::test]
async fn test_invalid_update_bounces_to_edit_form() {
    let state = test_state().await;
    let mut alice = Browser::new(&state);
    alice.signed_up("alice").await;
    alice.post("/movies/add", ARRIVAL).await;
    let before = all_movies(&state).await.remove(0);

    let response = alice
        .post(
            &format!("/movies/{}", before.id),
            &ARRIVAL.replace("rating=8.0", "rating=11"),
        )
        .await;
    assert_eq!(location(&response), format!("/movies/{}/edit", before.id));
    assert_eq!(all_movies(&state).await, vec![before]);
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let state = test_state().await;
    let mut browser = Browser::new(&state);
    browser.register("alice", "alice@x.com", "secret1").await;

    let response = browser.register("alice", "other@x.com", "secret1").await;
    assert_eq!(location(&response), "/register");
    let html = browser.page("/register").await;
    assert!(html.contains("User with this email or username already exists"));
    assert_eq!(state.user_service.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_bad_login_is_ambiguous() {
    let state = test_state().await;
    let mut browser = Browser::new(&state);
    browser.register("alice", "alice@x.com", "secret1").await;

    for (email, password) in [("alice@x.com", "secret2"), ("nobody@x.com", "secret1")] {
        let response = browser.login(email, password).await;
        assert_eq!(location(&response), "/login");
        let html = browser.page("/login").await;
        assert!(html.contains("Invalid email or password"));
        assert!(!browser.jar.contains_key("sid"));
    }
}

#[tokio::test]
async fn test_guest_pages_redirect_when_logged_in() {
    let state = test_state().await;
    let mut alice = Browser::new(&state);
    alice.signed_up("alice").await;

    assert_eq!(location(&alice.get("/login").await), "/movies");
    assert_eq!(location(&alice.get("/register").await), "/movies");
}

#[tokio::test]
async fn test_logout_ends_session_and_is_idempotent() {
    let state = test_state().await;
    let mut anonymous = Browser::new(&state);
    assert_eq!(location(&anonymous.get("/logout").await), "/");

    let mut alice = Browser::new(&state);
    alice.signed_up("alice").await;
    let stolen_sid = alice.jar.get("sid").cloned().unwrap();

    assert_eq!(location(&alice.post("/logout", "").await), "/");
    assert!(!alice.jar.contains_key("sid"));
    assert_eq!(location(&alice.get("/logout").await), "/");
    assert_eq!(location(&alice.get("/movies/add").await), "/login");

    // the old cookie no longer resolves
    let mut replay = Browser::new(&state);
    replay.jar.insert("sid".to_string(), stolen_sid);
    assert_eq!(location(&replay.get("/movies/add").await), "/login");
    assert!(!replay.jar.contains_key("sid"));
}

#[tokio::test]
async fn test_tampered_session_cookie_is_anonymous() {
    let state = test_state().await;
    let mut alice = Browser::new(&state);
    alice.signed_up("alice").await;

    let sid = alice.jar.get("sid").cloned().unwrap();
    let (token, signature) = sid.rsplit_once('.').unwrap();
    let last = if token.ends_with('0') { '1' } else { '0' };
    let forged = format!("{}{}.{}", &token[..token.len() - 1], last, signature);
    alice.jar.insert("sid".to_string(), forged);

    assert_eq!(location(&alice.get("/movies/my/movies").await), "/login");
}

#[tokio::test]
async fn test_missing_movie_and_unknown_path() {
    let state = test_state().await;
    let mut browser = Browser::new(&state);

    assert_eq!(location(&browser.get("/movies/999").await), "/movies");
    assert!(browser.page("/movies").await.contains("Movie not found"));
    assert_eq!(location(&browser.get("/movies/not-a-number").await), "/movies");

    let response = browser.get("/no/such/page").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_text(response).await;
    assert!(html.contains("Page Not Found"));
    assert!(html.contains("The page you are looking for does not exist."));
}

#[tokio::test]
async fn test_wrong_method_gets_not_found_page() {
    let state = test_state().await;
    let mut browser = Browser::new(&state);

    for (method, uri) in [
        (Method::POST, "/movies"),
        (Method::PUT, "/login"),
        (Method::POST, "/"),
        (Method::DELETE, "/logout"),
    ] {
        let response = browser.send(method.clone(), uri, Some("")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        assert!(body_text(response).await.contains("Page Not Found"));
    }
}

#[tokio::test]
async fn test_static_assets_and_home() {
    let state = test_state().await;
    let mut browser = Browser::new(&state);

    let response = browser.get("/images/default-movie.svg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");

    let html = browser.page("/").await;
    assert!(html.contains("<title>Home | Cinevault</title>"));
}
