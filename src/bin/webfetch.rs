//! Standalone extraction run against a single URL.
//!
//! Exercises the full fetch → reduce → extract pipeline outside the server,
//! printing progress and the resulting ingredient list. Target URL comes
//! from `WEBFETCH_URL`; renderer and model settings from the usual
//! environment.

use anyhow::Result;
use mixtable::config::Config;
use mixtable::models::SharerInfo;
use mixtable::services::{OllamaChatClient, RecipeCache, RecipeService, RenderedPageFetcher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const DEFAULT_TARGET: &str =
    "https://www.theguardian.com/food/2025/oct/11/meera-sodha-recipe-zaatar-roast-vegetables-whipped-feta";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Config::from_env();
    let target = std::env::var("WEBFETCH_URL").unwrap_or_else(|_| DEFAULT_TARGET.to_string());

    println!("Fetching: {target}");

    let service = RecipeService::new(
        Arc::new(RecipeCache::new()),
        Arc::new(RenderedPageFetcher::new(
            config.renderer_url.clone(),
            config.renderer_explicit,
        )),
        Arc::new(OllamaChatClient::new(
            config.ollama_url.clone(),
            config.model.clone(),
        )),
    );

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<mixtable::services::recipe::Progress>();
    let reporter = tokio::spawn(async move {
        while let Some(p) = progress_rx.recv().await {
            println!("[{}/{}] {}", p.phase.as_str(), p.status.as_str(), p.message);
        }
    });

    let sharer = SharerInfo {
        id: "webfetch".to_string(),
        name: "webfetch".to_string(),
    };
    let result = service
        .recipe_for_url("webfetch", &target, sharer, &progress_tx)
        .await;
    drop(progress_tx);
    let _ = reporter.await;

    let recipe = result?;

    println!();
    println!("Recipe: {}", recipe.name);
    if let Some(image) = &recipe.image {
        println!("Image: {image}");
    }
    println!("{} ingredients:", recipe.ingredients.len());
    for (i, ingredient) in recipe.ingredients.iter().enumerate() {
        println!(
            "  {}. {} (quantity: {}, unit: {})",
            i + 1,
            ingredient.name,
            ingredient.quantity.as_deref().unwrap_or("null"),
            ingredient.unit.as_deref().unwrap_or("null"),
        );
    }

    Ok(())
}
