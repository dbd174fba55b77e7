//! Read-only view of a mix's cached recipes.

use crate::error::{ApiError, ApiResult};
use crate::models::Recipe;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;

/// `GET /api/v1/mixes/:session_id/recipes` — every recipe cached for a mix.
///
/// 404 when no recipe has ever been shared into the mix; an empty list is
/// only possible transiently and never observed here.
pub async fn session_recipes(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<Recipe>>> {
    let cache = state.recipe_service.cache();
    if !cache.has_session(&session_id).await {
        return Err(ApiError::NotFound(format!(
            "no recipes shared in mix {session_id}"
        )));
    }
    Ok(Json(cache.list_by_session(&session_id).await))
}
