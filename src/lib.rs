//! mixtable — collaborative recipe mix service.
//!
//! Multiple browser clients share a mix session: one participant posts a
//! recipe URL, the server fetches and distills the page, asks a language
//! model to extract structured ingredient data, and streams progress and
//! results back to every participant in the session.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod ws;

pub use crate::error::{ApiError, ApiResult};

use crate::services::RecipeService;
use crate::ws::ConnectionPool;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
///
/// All components are explicitly constructed at startup and injected here;
/// there is no process-global service state.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry grouped by session id.
    pub pool: Arc<ConnectionPool>,
    /// Recipe extraction service (cache + fetch + AI).
    pub recipe_service: Arc<RecipeService>,
    /// Service startup timestamp for uptime reporting.
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pool: Arc<ConnectionPool>, recipe_service: Arc<RecipeService>) -> Self {
        Self {
            pool,
            recipe_service,
            startup_time: Utc::now(),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/v1/ws/:session_id", get(api::ws_handler))
        .route("/api/v1/mixes/:session_id/recipes", get(api::session_recipes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
