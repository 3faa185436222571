use std::net::SocketAddr;

use anyhow::{Context, Result};
use revue_server::{config::Settings, db::Database, router, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "revue_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new().context("Failed to load settings")?;

    let db = Database::new(&settings.database.path).context("Failed to create database")?;
    let applied = db.initialize()?;
    if applied.is_empty() {
        tracing::info!("Database schema is up to date");
    } else {
        tracing::info!("Applied migrations {:?}", applied);
    }

    if settings.database.seed_demo_data {
        db.seed_demo_data()?;
        tracing::info!("Demo data seeded");
    }

    let state = AppState::new(db, settings.auth.clone());

    match state.session_manager.cleanup_expired_sessions() {
        Ok(count) if count > 0 => tracing::info!("Cleaned up {} expired sessions on startup", count),
        Ok(_) => {}
        Err(e) => tracing::error!("Failed to cleanup expired sessions on startup: {}", e),
    }

    // Periodic session cleanup
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = cleanup_state.session_manager.cleanup_expired_sessions() {
                tracing::error!("Periodic session cleanup failed: {}", e);
            }
        }
    });

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Failed to parse server address")?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router(state)).await.context("Server error")?;
    Ok(())
}
