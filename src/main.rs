//! mixtable server binary.

use anyhow::Result;
use mixtable::config::Config;
use mixtable::services::{OllamaChatClient, RecipeCache, RecipeService, RenderedPageFetcher};
use mixtable::ws::ConnectionPool;
use mixtable::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    info!("Starting mixtable");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Renderer endpoint: {}", config.renderer_url);
    info!("Chat model: {}", config.model);

    let cache = Arc::new(RecipeCache::new());
    let fetcher = Arc::new(RenderedPageFetcher::new(
        config.renderer_url.clone(),
        config.renderer_explicit,
    ));
    let completer = Arc::new(OllamaChatClient::new(
        config.ollama_url.clone(),
        config.model.clone(),
    ));
    let recipe_service = Arc::new(RecipeService::new(cache, fetcher, completer));
    let pool = Arc::new(ConnectionPool::new());

    let state = AppState::new(pool, recipe_service);
    let app = mixtable::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
