//! Recipe extraction orchestrator.
//!
//! Drives cache check → page fetch → content reduction → (metadata parse or
//! AI extraction) → recipe assembly, reporting phase progress through a typed
//! event channel. One invocation corresponds to one in-flight
//! `RECIPE_URL_REQUEST`.

use crate::models::{Ingredient, Recipe, SharerInfo};
use crate::services::cache::RecipeCache;
use crate::services::fetch::PageFetcher;
use crate::services::ingredient::parse_line;
use crate::services::llm::ChatCompleter;
use crate::services::reducer::{self, ReductionTier};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Phase of an in-flight extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPhase {
    Fetching,
    Extracting,
    Complete,
}

/// Status of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    InProgress,
    Completed,
    Failed,
}

impl ExtractionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionPhase::Fetching => "fetching",
            ExtractionPhase::Extracting => "extracting",
            ExtractionPhase::Complete => "complete",
        }
    }
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Failed => "failed",
        }
    }
}

/// One progress event, delivered to the requester only.
#[derive(Debug, Clone)]
pub struct Progress {
    pub phase: ExtractionPhase,
    pub status: PhaseStatus,
    pub message: String,
}

/// Sender half of the progress channel. A dropped receiver never fails the
/// extraction; events are simply discarded.
pub type ProgressSender = mpsc::UnboundedSender<Progress>;

/// Terminal extraction errors.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// Page retrieval failed (network, timeout, non-success status).
    #[error("failed to fetch web content: {0}")]
    Fetch(String),

    /// Chat completion transport failed.
    #[error("failed to call AI: {0}")]
    Completion(String),

    /// AI response was not the expected JSON shape. Carries the raw response
    /// for diagnostics; not retried.
    #[error("failed to parse AI response: {message}. Response: {raw}")]
    Decode { message: String, raw: String },
}

/// Expected JSON shape of the AI extraction response.
#[derive(Debug, Deserialize)]
struct ChatRecipeResponse {
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    ingredients: Vec<Ingredient>,
}

/// Recipe extraction service.
///
/// Explicitly constructed and injected into the transport layer; holds no
/// global state.
pub struct RecipeService {
    cache: Arc<RecipeCache>,
    fetcher: Arc<dyn PageFetcher>,
    completer: Arc<dyn ChatCompleter>,
}

impl RecipeService {
    pub fn new(
        cache: Arc<RecipeCache>,
        fetcher: Arc<dyn PageFetcher>,
        completer: Arc<dyn ChatCompleter>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            completer,
        }
    }

    pub fn cache(&self) -> &Arc<RecipeCache> {
        &self.cache
    }

    /// Resolve a recipe for `url` within `session_id`.
    ///
    /// Returns the cached recipe when present (no fetch, no AI call);
    /// otherwise runs the extraction pipeline and caches the result. On
    /// failure nothing is cached.
    pub async fn recipe_for_url(
        &self,
        session_id: &str,
        url: &str,
        sharer: SharerInfo,
        progress: &ProgressSender,
    ) -> Result<Recipe, RecipeError> {
        if let Some(recipe) = self.cache.get(session_id, url).await {
            emit(
                progress,
                ExtractionPhase::Complete,
                PhaseStatus::Completed,
                "Recipe found in mix cache",
            );
            return Ok(recipe);
        }

        let recipe = self.extract(session_id, url, sharer, progress).await?;
        Ok(recipe)
    }

    async fn extract(
        &self,
        session_id: &str,
        url: &str,
        sharer: SharerInfo,
        progress: &ProgressSender,
    ) -> Result<Recipe, RecipeError> {
        emit(
            progress,
            ExtractionPhase::Fetching,
            PhaseStatus::InProgress,
            format!("Fetching content from {url}"),
        );

        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url, error = %e, "page fetch failed");
                emit(
                    progress,
                    ExtractionPhase::Fetching,
                    PhaseStatus::Failed,
                    format!("Failed to fetch content: {e}"),
                );
                return Err(RecipeError::Fetch(e.to_string()));
            }
        };

        emit(
            progress,
            ExtractionPhase::Fetching,
            PhaseStatus::Completed,
            "Content retrieved successfully",
        );

        let reduced = reducer::reduce(&html);
        tracing::info!(
            url,
            tier = reduced.tier.as_str(),
            bytes = reduced.content.len(),
            "page content reduced"
        );

        let (name, image, ingredients) = if reduced.tier == ReductionTier::Structured {
            emit(
                progress,
                ExtractionPhase::Extracting,
                PhaseStatus::InProgress,
                "Parsing embedded recipe metadata",
            );
            match parse_structured_metadata(&reduced.content) {
                Some(parsed) => parsed,
                None => {
                    self.extract_with_ai(url, &reduced.content, progress)
                        .await?
                }
            }
        } else {
            self.extract_with_ai(url, &reduced.content, progress)
                .await?
        };

        emit(
            progress,
            ExtractionPhase::Extracting,
            PhaseStatus::Completed,
            format!("Found recipe with {} ingredients", ingredients.len()),
        );

        let recipe = Recipe::assemble(name, url.to_string(), image, ingredients, Some(sharer));
        self.cache.put(session_id, url, recipe.clone()).await;

        emit(
            progress,
            ExtractionPhase::Complete,
            PhaseStatus::Completed,
            "Recipe processed successfully",
        );

        Ok(recipe)
    }

    /// AI fallback: prompt the chat model with the reduced content and decode
    /// the JSON answer.
    async fn extract_with_ai(
        &self,
        url: &str,
        content: &str,
        progress: &ProgressSender,
    ) -> Result<(String, Option<String>, Vec<Ingredient>), RecipeError> {
        emit(
            progress,
            ExtractionPhase::Extracting,
            PhaseStatus::InProgress,
            "Extracting ingredients with AI...",
        );

        let prompt = extraction_prompt(content);
        let response = match self.completer.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(url, error = %e, "chat completion failed");
                emit(
                    progress,
                    ExtractionPhase::Extracting,
                    PhaseStatus::Failed,
                    format!("AI extraction failed: {e}"),
                );
                return Err(RecipeError::Completion(e.to_string()));
            }
        };

        let body = strip_code_fence(&response);
        let mut decoded: ChatRecipeResponse = match serde_json::from_str(body) {
            Ok(d) => d,
            Err(e) => {
                emit(
                    progress,
                    ExtractionPhase::Extracting,
                    PhaseStatus::Failed,
                    "AI response could not be decoded",
                );
                return Err(RecipeError::Decode {
                    message: e.to_string(),
                    raw: response,
                });
            }
        };

        if decoded.name.trim().is_empty() {
            emit(
                progress,
                ExtractionPhase::Extracting,
                PhaseStatus::Failed,
                "AI response missing recipe name",
            );
            return Err(RecipeError::Decode {
                message: "missing required field: name".to_string(),
                raw: response,
            });
        }
        // Ingredient names are required; drop anything blank rather than
        // carrying unusable entries into the mix.
        decoded.ingredients.retain(|i| !i.name.trim().is_empty());

        Ok((decoded.name, decoded.image, decoded.ingredients))
    }
}

fn emit(
    progress: &ProgressSender,
    phase: ExtractionPhase,
    status: PhaseStatus,
    message: impl Into<String>,
) {
    // Receiver may already be gone (requester disconnected); extraction
    // continues regardless.
    let _ = progress.send(Progress {
        phase,
        status,
        message: message.into(),
    });
}

/// Read name, image and ingredient lines straight out of a validated JSON-LD
/// block. Returns None when the block is unusable without AI (missing name
/// or no parseable ingredient line).
fn parse_structured_metadata(block: &str) -> Option<(String, Option<String>, Vec<Ingredient>)> {
    let value: Value = serde_json::from_str(block).ok()?;
    let node = reducer::find_recipe_node(&value)?;

    let name = node.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let ingredients: Vec<Ingredient> = node
        .get("recipeIngredient")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect();

    if ingredients.is_empty() {
        return None;
    }

    Some((name.to_string(), image_url(node.get("image")), ingredients))
}

/// Pull a usable image URL out of a schema.org `image` value, which may be a
/// bare string, a list, or an ImageObject.
fn image_url(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|item| image_url(Some(item))),
        Value::Object(map) => map
            .get("url")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Build the extraction instruction sent to the chat model.
fn extraction_prompt(content: &str) -> String {
    format!(
        r#"
You are a recipe parsing AI. Extract recipe information from the following page content.

TASK: Parse the content and extract:
1. Recipe name
2. The best representative image URL for the finished dish
3. List of ingredients with quantities and units

OUTPUT FORMAT: JSON with this exact structure:
{{
  "name": "Recipe Name",
  "image": "https://example.com/dish.jpg (or null if none found)",
  "ingredients": [
    {{
      "name": "ingredient name",
      "quantity": "amount (or null if unclear)",
      "unit": "measurement unit (or null if unclear)"
    }}
  ]
}}

RULES:
- Extract ONLY ingredients listed for the recipe
- If quantity is unclear, use null
- If unit is unclear, use null
- If unit is one item, then use piece
- If a quantity range is stated, use the larger bound
- Ignore non-ingredient content like instructions
- If no ingredients found, return empty array
- Be precise with ingredient names (e.g., "olive oil" not just "oil")
- For the image, prefer an absolute URL and a photo of the finished dish over an ingredients or preparation photo
- If no suitable image found, use null

PAGE CONTENT:
{content}
"#
    )
}

/// Strip a surrounding markdown code fence from a model response.
fn strip_code_fence(response: &str) -> &str {
    let mut text = response.trim();
    text = text.strip_prefix("```json").unwrap_or(text);
    text = text.strip_prefix("```").unwrap_or(text);
    text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_fence_stripping() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn prompt_embeds_content_and_rules() {
        let prompt = extraction_prompt("<div>page</div>");
        assert!(prompt.contains("<div>page</div>"));
        assert!(prompt.contains("use piece"));
        assert!(prompt.contains("larger bound"));
        assert!(prompt.contains("finished dish"));
    }

    #[test]
    fn structured_metadata_parses_name_image_ingredients() {
        let block = r#"{
            "@type": "Recipe",
            "name": "Za'atar roast vegetables",
            "image": ["https://example.com/dish.jpg"],
            "recipeIngredient": ["350g sushi rice", "Fine sea salt"]
        }"#;
        let (name, image, ingredients) = parse_structured_metadata(block).unwrap();
        assert_eq!(name, "Za'atar roast vegetables");
        assert_eq!(image.as_deref(), Some("https://example.com/dish.jpg"));
        assert_eq!(ingredients.len(), 2);
        assert_eq!(ingredients[0].quantity.as_deref(), Some("350"));
        assert_eq!(ingredients[1].name, "Fine sea salt");
    }

    #[test]
    fn structured_metadata_without_name_is_unusable() {
        let block = r#"{"@type":"Recipe","recipeIngredient":["1 egg"]}"#;
        assert!(parse_structured_metadata(block).is_none());
    }

    #[test]
    fn image_object_form() {
        let value = serde_json::json!({"url": "https://example.com/a.jpg"});
        assert_eq!(
            image_url(Some(&value)).as_deref(),
            Some("https://example.com/a.jpg")
        );
    }
}
