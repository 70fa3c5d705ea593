//! Cinevault - a server-rendered movie catalog

use anyhow::Result;
use chrono::Duration;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use cinevault::{
    api::{self, AppState, CookieSigner},
    config::Config,
    db::{
        self,
        repositories::{SqlxMovieRepository, SqlxSessionRepository, SqlxUserRepository},
    },
    services::{MovieService, SessionManager, UserService},
    views::ViewEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinevault=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cinevault...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let secret = if config.session.secret.is_empty() {
        tracing::warn!(
            "No session secret configured; using a random one. Sessions will not survive a restart."
        );
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    } else {
        config.session.secret.clone()
    };
    let cookies = CookieSigner::new(secret.as_bytes())?;

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let pending = db::migrations::pending_count(&pool).await?;
    if pending > 0 {
        tracing::info!("Applying {} pending migration(s)", pending);
    }
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    // Create repositories and services
    let user_service = Arc::new(UserService::new(SqlxUserRepository::boxed(pool.clone())));
    let session_manager = Arc::new(SessionManager::with_max_age(
        SqlxSessionRepository::boxed(pool.clone()),
        Duration::seconds(config.session.max_age_seconds()),
    ));
    let movie_service = Arc::new(MovieService::new(SqlxMovieRepository::boxed(pool.clone())));
    let views = Arc::new(ViewEngine::new()?);

    tracing::info!("{} registered user(s)", user_service.count().await?);

    let state = AppState {
        user_service,
        session_manager,
        movie_service,
        views,
        cookies,
    };

    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server is running on port {}", config.server.port);

    axum::serve(listener, app).await?;

    pool.close().await;
    Ok(())
}
