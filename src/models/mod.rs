//! Core data model for shared recipe mixes.
//!
//! All types serialize with camelCase field names; the wire format is shared
//! with the browser client and must stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical grocery item with category tagging.
///
/// Populated by the grocery matcher outside this service; carried here so the
/// field survives a round trip through the cache and the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub id: String,
    pub name: String,
    pub category: String,
}

/// One ingredient line of a recipe.
///
/// `quantity` stays a string on purpose: "350" and "1.5" are preserved as the
/// page stated them rather than parsed into a number and re-rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "groceryItem")]
    pub grocery_item: Option<GroceryItem>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl Ingredient {
    /// Ingredient with a name only, no quantity or unit.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grocery_item: None,
            quantity: None,
            unit: None,
        }
    }
}

/// Identity of the user who shared a recipe into the mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharerInfo {
    pub id: String,
    pub name: String,
}

/// A recipe extracted from a source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub ingredients: Vec<Ingredient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_by: Option<SharerInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// Assemble a freshly extracted recipe with a new id and current
    /// timestamps. `name` must be non-empty; callers validate upstream.
    pub fn assemble(
        name: String,
        url: String,
        image: Option<String>,
        ingredients: Vec<Ingredient>,
        shared_by: Option<SharerInfo>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            url,
            image,
            ingredients,
            shared_by,
            created_at: now,
            updated_at: now,
        }
    }
}
