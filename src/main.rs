// Define data modules
mod models;  // Data structures (User, Task, nested records, Db)
mod store;   // Persistent storage (load/save db.json, serialized mutations)
mod error;   // Error kinds and their HTTP mapping
mod config;  // Environment configuration
mod identity; // Users, password hashing, preferences, stats
mod auth;    // Bearer-token sessions and the AuthUser extractor
mod tasks;   // Task lifecycle: CRUD, sharing, comments, completion
mod focus;   // Focus-session tracker
mod analytics; // Productivity summary over a task set
mod suggest; // Prioritized suggestions and time blocks
mod app;     // Router and shared state
mod routes_auth;      // HTTP handlers for auth & preferences
mod routes_tasks;     // HTTP handlers for task APIs
mod routes_analytics; // HTTP handler for analytics

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::AppState;
use crate::auth::SessionRegistry;
use crate::config::AppConfig;
use crate::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,focus_tasks=debug,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    info!(?config, "Loaded configuration");

    let store = Store::open(&config.db_path, config.seed_demo_data)?;
    let sessions = SessionRegistry::new(chrono::Duration::hours(config.session_ttl_hours));

    let addr = config.http_addr;
    let state = AppState {
        store: Arc::new(store),
        sessions: Arc::new(sessions),
        config: Arc::new(config),
    };

    let app = app::build_router(state);

    // Print the link to the server
    info!("Server running at http://{}", addr);
    info!("API base:     http://{}/api", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Received Ctrl+C, shutting down");
        })
        .await?;

    Ok(())
}
