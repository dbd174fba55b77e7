//! Integration tests for the mix-scoped recipe cache.

use mixtable::models::Recipe;
use mixtable::services::RecipeCache;

fn recipe(name: &str, url: &str) -> Recipe {
    Recipe::assemble(name.to_string(), url.to_string(), None, Vec::new(), None)
}

#[tokio::test]
async fn get_after_put_returns_same_recipe() {
    let cache = RecipeCache::new();
    let r = recipe("Stew", "https://example.com/stew");
    cache.put("mix-1", "https://example.com/stew", r.clone()).await;

    let got = cache.get("mix-1", "https://example.com/stew").await;
    assert_eq!(got, Some(r));
}

#[tokio::test]
async fn sessions_are_isolated() {
    let cache = RecipeCache::new();
    cache
        .put("mix-1", "https://example.com/a", recipe("A", "https://example.com/a"))
        .await;

    assert!(cache.get("mix-2", "https://example.com/a").await.is_none());
    assert_eq!(cache.count_by_session("mix-1").await, 1);
    assert_eq!(cache.count_by_session("mix-2").await, 0);
}

#[tokio::test]
async fn clear_session_removes_everything() {
    let cache = RecipeCache::new();
    cache
        .put("mix-1", "https://example.com/a", recipe("A", "https://example.com/a"))
        .await;
    cache
        .put("mix-1", "https://example.com/b", recipe("B", "https://example.com/b"))
        .await;
    assert!(cache.has_session("mix-1").await);
    assert_eq!(cache.count_by_session("mix-1").await, 2);

    cache.clear_session("mix-1").await;

    assert!(!cache.has_session("mix-1").await);
    assert_eq!(cache.count_by_session("mix-1").await, 0);
    assert!(cache.get("mix-1", "https://example.com/a").await.is_none());
}

#[tokio::test]
async fn absent_session_reports_empty() {
    let cache = RecipeCache::new();
    assert!(!cache.has_session("nope").await);
    assert_eq!(cache.count_by_session("nope").await, 0);
    assert!(cache.list_by_session("nope").await.is_empty());
}

#[tokio::test]
async fn put_replaces_existing_url_entry() {
    let cache = RecipeCache::new();
    cache
        .put("mix-1", "https://example.com/a", recipe("Old", "https://example.com/a"))
        .await;
    cache
        .put("mix-1", "https://example.com/a", recipe("New", "https://example.com/a"))
        .await;

    assert_eq!(cache.count_by_session("mix-1").await, 1);
    let got = cache.get("mix-1", "https://example.com/a").await.unwrap();
    assert_eq!(got.name, "New");
}

#[tokio::test]
async fn list_by_session_returns_all_entries() {
    let cache = RecipeCache::new();
    cache
        .put("mix-1", "https://example.com/a", recipe("A", "https://example.com/a"))
        .await;
    cache
        .put("mix-1", "https://example.com/b", recipe("B", "https://example.com/b"))
        .await;

    let mut names: Vec<String> = cache
        .list_by_session("mix-1")
        .await
        .into_iter()
        .map(|r| r.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["A", "B"]);
}
