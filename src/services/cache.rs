//! Mix-scoped recipe cache.
//!
//! Two-level in-memory store: session id → source URL → recipe. Lifetime is
//! process lifetime; no TTL, no size bound, no persistence. A session with no
//! entries is indistinguishable from an absent one for `get`/`count`, while
//! `has_session` reports whether the session key itself exists.

use crate::models::Recipe;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Per-session recipe store keyed by source URL.
#[derive(Default)]
pub struct RecipeCache {
    sessions: RwLock<HashMap<String, HashMap<String, Recipe>>>,
}

impl RecipeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a recipe by session and source URL.
    pub async fn get(&self, session_id: &str, url: &str) -> Option<Recipe> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).and_then(|m| m.get(url)).cloned()
    }

    /// Insert (or replace) a recipe under its session and source URL.
    pub async fn put(&self, session_id: &str, url: &str, recipe: Recipe) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(url.to_string(), recipe);
    }

    /// All recipes cached for a session, in no particular order.
    pub async fn list_by_session(&self, session_id: &str) -> Vec<Recipe> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a session and every recipe under it. O(entries-in-session).
    pub async fn clear_session(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
    }

    /// Number of recipes cached for a session (zero for absent sessions).
    pub async fn count_by_session(&self, session_id: &str) -> usize {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Whether any write has ever occurred for this session (and it has not
    /// been cleared since).
    pub async fn has_session(&self, session_id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(session_id)
    }
}
