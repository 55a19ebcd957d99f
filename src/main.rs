use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use db_chat_backend::api::routes::{create_router, AppState};
use db_chat_backend::config::Config;
use db_chat_backend::services::database::{create_backend, mask_credentials};
use db_chat_backend::services::{CompletionClient, LlmService};
use db_chat_backend::storage::SqliteStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first so RUST_LOG from .env is visible to the filter
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting server on {}", config.server_address());

    // Chat history
    let storage = Arc::new(SqliteStorage::new(&config.history.url).await.map_err(|e| {
        error!("Failed to initialize history database: {}", e);
        e
    })?);

    let backend = create_backend(&config.database.url).map_err(|e| {
        error!(
            "Failed to create data backend for {}: {}",
            mask_credentials(&config.database.url),
            e
        );
        e
    })?;

    let llm: Arc<dyn CompletionClient> = Arc::new(LlmService::new(&config));

    let state = AppState::new(storage, &config, backend, llm)?;
    let app: Router = create_router(state);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
