//! Integration tests for the extraction orchestrator over mock fetch and
//! chat-completion capabilities.

use async_trait::async_trait;
use mixtable::models::SharerInfo;
use mixtable::services::fetch::{FetchError, PageFetcher};
use mixtable::services::llm::{ChatCompleter, CompletionError};
use mixtable::services::recipe::{ExtractionPhase, PhaseStatus, Progress, RecipeError};
use mixtable::services::{RecipeCache, RecipeService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct MockFetcher {
    html: String,
    calls: AtomicUsize,
}

impl MockFetcher {
    fn new(html: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            html: html.into(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.html.clone())
    }
}

struct FailingFetcher;

#[async_trait]
impl PageFetcher for FailingFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        Err(FetchError::Status(503))
    }
}

struct MockCompleter {
    response: String,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockCompleter {
    fn new(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            response: response.into(),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ChatCompleter for MockCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.response.clone())
    }
}

fn sharer() -> SharerInfo {
    SharerInfo {
        id: "u-alice".to_string(),
        name: "alice".to_string(),
    }
}

/// Run one extraction and collect every progress event in order.
async fn run(
    service: &RecipeService,
    session_id: &str,
    url: &str,
) -> (Result<mixtable::models::Recipe, RecipeError>, Vec<Progress>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = service.recipe_for_url(session_id, url, sharer(), &tx).await;
    drop(tx);
    let mut events = Vec::new();
    while let Some(p) = rx.recv().await {
        events.push(p);
    }
    (result, events)
}

fn phases(events: &[Progress]) -> Vec<(ExtractionPhase, PhaseStatus)> {
    events.iter().map(|p| (p.phase, p.status)).collect()
}

const PLAIN_PAGE: &str = "<html><body><h1>Some food blog</h1><p>story text</p></body></html>";

const AI_RESPONSE: &str = r#"{
    "name": "Za'atar roast vegetables",
    "image": "https://example.com/dish.jpg",
    "ingredients": [
        {"name": "aubergine", "quantity": "2", "unit": "piece"},
        {"name": "olive oil", "quantity": "3", "unit": "tbsp"}
    ]
}"#;

#[tokio::test]
async fn cached_url_short_circuits_pipeline() {
    let cache = Arc::new(RecipeCache::new());
    let fetcher = MockFetcher::new(PLAIN_PAGE);
    let completer = MockCompleter::new(AI_RESPONSE);
    let service = RecipeService::new(cache.clone(), fetcher.clone(), completer.clone());

    let url = "https://example.com/cached";
    let seeded = mixtable::models::Recipe::assemble(
        "Seeded".to_string(),
        url.to_string(),
        None,
        Vec::new(),
        None,
    );
    cache.put("mix-1", url, seeded.clone()).await;

    let (result, events) = run(&service, "mix-1", url).await;

    assert_eq!(result.unwrap(), seeded);
    assert_eq!(
        phases(&events),
        vec![(ExtractionPhase::Complete, PhaseStatus::Completed)]
    );
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(completer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn full_pipeline_emits_ordered_progress() {
    let service = RecipeService::new(
        Arc::new(RecipeCache::new()),
        MockFetcher::new(PLAIN_PAGE),
        MockCompleter::new(AI_RESPONSE),
    );

    let (result, events) = run(&service, "mix-1", "https://example.com/new").await;

    let recipe = result.unwrap();
    assert_eq!(recipe.name, "Za'atar roast vegetables");
    assert_eq!(recipe.image.as_deref(), Some("https://example.com/dish.jpg"));
    assert_eq!(recipe.ingredients.len(), 2);
    assert_eq!(recipe.shared_by.as_ref().unwrap().id, "u-alice");

    assert_eq!(
        phases(&events),
        vec![
            (ExtractionPhase::Fetching, PhaseStatus::InProgress),
            (ExtractionPhase::Fetching, PhaseStatus::Completed),
            (ExtractionPhase::Extracting, PhaseStatus::InProgress),
            (ExtractionPhase::Extracting, PhaseStatus::Completed),
            (ExtractionPhase::Complete, PhaseStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn extraction_result_is_cached_per_session() {
    let cache = Arc::new(RecipeCache::new());
    let fetcher = MockFetcher::new(PLAIN_PAGE);
    let service = RecipeService::new(cache.clone(), fetcher.clone(), MockCompleter::new(AI_RESPONSE));

    let url = "https://example.com/new";
    let (first, _) = run(&service, "mix-1", url).await;
    let first = first.unwrap();

    // Second request hits the cache; the fetcher is not consulted again.
    let (second, events) = run(&service, "mix-1", url).await;
    assert_eq!(second.unwrap(), first);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(events.len(), 1);

    // A different session does not see it.
    assert!(cache.get("mix-2", url).await.is_none());
}

#[tokio::test]
async fn structured_metadata_bypasses_ai() {
    let page = r#"<html><head><script type="application/ld+json">
        {"@type":"Recipe","name":"Sushi bowl","image":"https://example.com/bowl.jpg",
         "recipeIngredient":["350g sushi rice","Fine sea salt"]}
    </script></head><body></body></html>"#;

    let completer = MockCompleter::new(AI_RESPONSE);
    let service = RecipeService::new(
        Arc::new(RecipeCache::new()),
        MockFetcher::new(page),
        completer.clone(),
    );

    let (result, events) = run(&service, "mix-1", "https://example.com/sushi").await;

    let recipe = result.unwrap();
    assert_eq!(recipe.name, "Sushi bowl");
    assert_eq!(recipe.ingredients.len(), 2);
    assert_eq!(recipe.ingredients[0].quantity.as_deref(), Some("350"));
    assert_eq!(recipe.ingredients[0].unit.as_deref(), Some("g"));
    assert_eq!(completer.calls.load(Ordering::SeqCst), 0);

    // Same phase sequence as the AI path.
    assert_eq!(
        phases(&events).last(),
        Some(&(ExtractionPhase::Complete, PhaseStatus::Completed))
    );
}

#[tokio::test]
async fn recipe_typed_metadata_without_ingredients_uses_ai() {
    let page = r#"<html><head><script type="application/ld+json">
        {"@type":"Recipe","name":"Hollow"}
    </script></head><body></body></html>"#;

    let completer = MockCompleter::new(AI_RESPONSE);
    let service = RecipeService::new(
        Arc::new(RecipeCache::new()),
        MockFetcher::new(page),
        completer.clone(),
    );

    let (result, _) = run(&service, "mix-1", "https://example.com/hollow").await;
    assert!(result.is_ok());
    assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fenced_ai_response_is_decoded() {
    let fenced = format!("```json\n{AI_RESPONSE}\n```");
    let completer = MockCompleter::new(fenced);
    let service = RecipeService::new(
        Arc::new(RecipeCache::new()),
        MockFetcher::new(PLAIN_PAGE),
        completer.clone(),
    );

    let (result, _) = run(&service, "mix-1", "https://example.com/fenced").await;
    assert_eq!(result.unwrap().ingredients.len(), 2);

    // The prompt embeds reduced page content, not the raw page.
    let prompt = completer.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Some food blog"));
}

#[tokio::test]
async fn decode_failure_carries_raw_response_and_caches_nothing() {
    let cache = Arc::new(RecipeCache::new());
    let service = RecipeService::new(
        cache.clone(),
        MockFetcher::new(PLAIN_PAGE),
        MockCompleter::new("Sorry, I couldn't find a recipe."),
    );

    let (result, events) = run(&service, "mix-1", "https://example.com/bad").await;

    match result {
        Err(RecipeError::Decode { raw, .. }) => {
            assert!(raw.contains("couldn't find a recipe"));
        }
        other => panic!("expected decode error, got {other:?}"),
    }
    assert!(!cache.has_session("mix-1").await);
    assert_eq!(
        phases(&events).last(),
        Some(&(ExtractionPhase::Extracting, PhaseStatus::Failed))
    );
}

#[tokio::test]
async fn blank_recipe_name_is_a_decode_error() {
    let service = RecipeService::new(
        Arc::new(RecipeCache::new()),
        MockFetcher::new(PLAIN_PAGE),
        MockCompleter::new(r#"{"name":"   ","ingredients":[{"name":"salt"}]}"#),
    );

    let (result, _) = run(&service, "mix-1", "https://example.com/noname").await;
    assert!(matches!(result, Err(RecipeError::Decode { .. })));
}

#[tokio::test]
async fn fetch_failure_maps_to_fetching_failed() {
    let completer = MockCompleter::new(AI_RESPONSE);
    let service = RecipeService::new(
        Arc::new(RecipeCache::new()),
        Arc::new(FailingFetcher),
        completer.clone(),
    );

    let (result, events) = run(&service, "mix-1", "https://example.com/down").await;

    assert!(matches!(result, Err(RecipeError::Fetch(_))));
    assert_eq!(
        phases(&events),
        vec![
            (ExtractionPhase::Fetching, PhaseStatus::InProgress),
            (ExtractionPhase::Fetching, PhaseStatus::Failed),
        ]
    );
    assert_eq!(completer.calls.load(Ordering::SeqCst), 0);
}
