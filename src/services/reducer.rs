//! Three-tier reduction of an arbitrary web page into a bounded,
//! ingredient-bearing text payload.
//!
//! Tier priority:
//! 1. `structured` — an embedded JSON-LD block that is Recipe-typed and
//!    carries a non-empty ingredient list, returned verbatim.
//! 2. `section` — a recipe-plugin HTML region located by class markers,
//!    cleaned.
//! 3. `full` — the whole page, cleaned. Always available.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Which reduction strategy produced the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionTier {
    /// Embedded structured metadata (JSON-LD), no cleanup applied.
    Structured,
    /// Targeted recipe section, cleaned.
    Section,
    /// Full page, cleaned.
    Full,
}

impl ReductionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionTier::Structured => "structured",
            ReductionTier::Section => "section",
            ReductionTier::Full => "full",
        }
    }
}

/// Result of [`reduce`].
#[derive(Debug, Clone)]
pub struct ReducedContent {
    pub content: String,
    pub tier: ReductionTier,
}

/// A recipe section shorter than this is considered a trivial snippet and
/// rejected in favor of the full-page tier.
const MIN_SECTION_BYTES: usize = 2000;

static LD_JSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script[^>]*type="application/ld\+json"[^>]*>(.*?)</script>"#).unwrap()
});

/// Recipe-plugin class markers, most specific first. Order matters: earlier
/// entries win ties across markers.
static SECTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("wprm-recipe", r#"(?is)<div[^>]*class="[^"]*wprm-recipe[^"]*"[^>]*>.*?</div>"#),
        ("tasty-recipes", r#"(?is)<div[^>]*class="[^"]*tasty-recipes[^"]*"[^>]*>.*?</div>"#),
        ("recipe-card", r#"(?is)<div[^>]*class="[^"]*recipe-card[^"]*"[^>]*>.*?</div>"#),
        ("mv-create-card", r#"(?is)<div[^>]*class="[^"]*mv-create-card[^"]*"[^>]*>.*?</div>"#),
        ("easyrecipe", r#"(?is)<div[^>]*class="[^"]*easyrecipe[^"]*"[^>]*>.*?</div>"#),
        ("recipe article", r#"(?is)<article[^>]*class="[^"]*recipe[^"]*"[^>]*>.*?</article>"#),
        ("recipe section", r#"(?is)<section[^>]*class="[^"]*recipe[^"]*"[^>]*>.*?</section>"#),
        ("recipe div", r#"(?is)<div[^>]*class="[^"]*recipe[^"]*"[^>]*>.*?</div>"#),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).unwrap()))
    .collect()
});

static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static NOSCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").unwrap());
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static SVG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<svg[^>]*>.*?</svg>").unwrap());
static DATA_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s+data-[a-zA-Z0-9-]+=["'][^"']*["']"#).unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static INTER_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());

/// Reduce a page to its ingredient-bearing core.
pub fn reduce(html: &str) -> ReducedContent {
    let original_size = html.len();

    if let Some(block) = extract_structured_block(html) {
        tracing::debug!(
            bytes = block.len(),
            reduction_pct = reduction_pct(original_size, block.len()),
            "using structured metadata block"
        );
        return ReducedContent {
            content: block,
            tier: ReductionTier::Structured,
        };
    }

    if let Some(section) = extract_recipe_section(html) {
        if section.len() > MIN_SECTION_BYTES {
            let cleaned = clean_html(&section);
            tracing::debug!(
                bytes = cleaned.len(),
                reduction_pct = reduction_pct(original_size, cleaned.len()),
                "using recipe section"
            );
            return ReducedContent {
                content: cleaned,
                tier: ReductionTier::Section,
            };
        }
    }

    let cleaned = clean_html(html);
    tracing::debug!(
        bytes = cleaned.len(),
        reduction_pct = reduction_pct(original_size, cleaned.len()),
        "using cleaned full page"
    );
    ReducedContent {
        content: cleaned,
        tier: ReductionTier::Full,
    }
}

fn reduction_pct(original: usize, reduced: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    100.0 * (original.saturating_sub(reduced)) as f64 / original as f64
}

/// Scan JSON-LD script blocks for the first one that is Recipe-typed and
/// carries at least one ingredient string. Returns the block's original text.
fn extract_structured_block(html: &str) -> Option<String> {
    for captures in LD_JSON_RE.captures_iter(html) {
        let raw = captures.get(1)?.as_str().trim();
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if find_recipe_node(&parsed).is_some() {
            return Some(raw.to_string());
        }
    }
    None
}

/// Locate the Recipe-typed node with a non-empty `recipeIngredient` list
/// inside a JSON-LD document. The document may be the node itself, an array
/// of nodes, or an object exposing an `@graph` list.
pub(crate) fn find_recipe_node(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(graph)) = map.get("@graph") {
                return graph
                    .iter()
                    .filter_map(Value::as_object)
                    .find(|node| is_recipe_with_ingredients(node));
            }
            if is_recipe_with_ingredients(map) {
                Some(map)
            } else {
                None
            }
        }
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .find(|node| is_recipe_with_ingredients(node)),
        _ => None,
    }
}

/// A node qualifies only when its `@type` equals or contains "Recipe" AND it
/// has a non-empty `recipeIngredient` array. A Recipe-typed node without
/// ingredients does not qualify.
fn is_recipe_with_ingredients(node: &serde_json::Map<String, Value>) -> bool {
    let typed = match node.get("@type") {
        Some(Value::String(s)) => s.contains("Recipe"),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.contains("Recipe")),
        _ => false,
    };
    if !typed {
        return false;
    }
    matches!(node.get("recipeIngredient"), Some(Value::Array(list)) if !list.is_empty())
}

/// Find a recipe-plugin HTML region by class marker.
///
/// Within one marker, a matched region containing "ingredient" wins over one
/// that does not; across markers, list order wins.
fn extract_recipe_section(html: &str) -> Option<String> {
    // First pass: regions that mention ingredients.
    for (name, regex) in SECTION_PATTERNS.iter() {
        for m in regex.find_iter(html) {
            if m.as_str().to_lowercase().contains("ingredient") {
                tracing::debug!(pattern = name, bytes = m.as_str().len(), "recipe section with ingredients");
                return Some(m.as_str().to_string());
            }
        }
    }

    // Second pass: first match of any marker.
    for (name, regex) in SECTION_PATTERNS.iter() {
        if let Some(m) = regex.find(html) {
            tracing::debug!(pattern = name, bytes = m.as_str().len(), "recipe section");
            return Some(m.as_str().to_string());
        }
    }

    None
}

/// Strip bulk noise from HTML. Order is load-bearing: block elements first,
/// then data attributes, then whitespace collapse — attribute stripping must
/// not re-expose tag boundaries the whitespace passes depend on.
pub fn clean_html(html: &str) -> String {
    let cleaned = SCRIPT_RE.replace_all(html, "");
    let cleaned = STYLE_RE.replace_all(&cleaned, "");
    let cleaned = NOSCRIPT_RE.replace_all(&cleaned, "");
    let cleaned = COMMENT_RE.replace_all(&cleaned, "");
    let cleaned = SVG_RE.replace_all(&cleaned, "");
    let cleaned = DATA_ATTR_RE.replace_all(&cleaned, "");
    let cleaned = WHITESPACE_RE.replace_all(&cleaned, " ");
    let cleaned = INTER_TAG_RE.replace_all(&cleaned, "><");
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ld_json_page(block: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{block}</script></head><body>filler</body></html>"#
        )
    }

    #[test]
    fn structured_block_with_ingredients_wins() {
        let block = r#"{"@type":"Recipe","name":"Za'atar vegetables","recipeIngredient":["350g sushi rice","2 cups flour"]}"#;
        let reduced = reduce(&ld_json_page(block));
        assert_eq!(reduced.tier, ReductionTier::Structured);
        assert_eq!(reduced.content, block);
    }

    #[test]
    fn recipe_typed_block_without_ingredients_falls_through() {
        let block = r#"{"@type":"Recipe","name":"Empty"}"#;
        let reduced = reduce(&ld_json_page(block));
        assert_ne!(reduced.tier, ReductionTier::Structured);
    }

    #[test]
    fn structured_block_in_array_container() {
        let block = r#"[{"@type":"NewsArticle"},{"@type":"Recipe","recipeIngredient":["1 egg"]}]"#;
        let reduced = reduce(&ld_json_page(block));
        assert_eq!(reduced.tier, ReductionTier::Structured);
    }

    #[test]
    fn structured_block_in_graph_container() {
        let block = r#"{"@graph":[{"@type":"WebPage"},{"@type":["Thing","Recipe"],"recipeIngredient":["salt"]}]}"#;
        let reduced = reduce(&ld_json_page(block));
        assert_eq!(reduced.tier, ReductionTier::Structured);
    }

    #[test]
    fn unparseable_ld_json_is_skipped() {
        let reduced = reduce(&ld_json_page(r#"{"@type":"Recipe","recipeIngredient":["#));
        assert_eq!(reduced.tier, ReductionTier::Full);
    }

    #[test]
    fn section_tier_requires_minimum_size() {
        let small = r#"<html><body><div class="wprm-recipe">ingredient: salt</div></body></html>"#;
        let reduced = reduce(small);
        assert_eq!(reduced.tier, ReductionTier::Full);

        let padding = "ingredient list item, ".repeat(150);
        let large = format!(r#"<html><body><div class="wprm-recipe">{padding}</div></body></html>"#);
        let reduced = reduce(&large);
        assert_eq!(reduced.tier, ReductionTier::Section);
        assert!(reduced.content.contains("ingredient list item"));
    }

    #[test]
    fn section_preference_for_ingredient_bearing_region() {
        let filler = "x".repeat(2100);
        let html = format!(
            r#"<div class="recipe-card">{filler}</div><div class="recipe-card">ingredients here {filler}</div>"#
        );
        let section = extract_recipe_section(&html).unwrap();
        assert!(section.contains("ingredients here"));
    }

    #[test]
    fn clean_html_strips_noise_in_order() {
        let html = concat!(
            "<html><head><script>var x = 1;</script><style>.a{}</style></head>",
            "<body><!-- comment --><svg><path d=\"z\"/></svg>",
            "<div   data-blob='oversized-embedded-payload' class=\"keep\">  a  </div>",
            "<p> b </p>   <p>c</p></body></html>"
        );
        let cleaned = clean_html(html);
        assert!(!cleaned.contains("script"));
        assert!(!cleaned.contains("style"));
        assert!(!cleaned.contains("comment"));
        assert!(!cleaned.contains("svg"));
        assert!(!cleaned.contains("data-blob"));
        assert!(cleaned.contains("class=\"keep\""));
        assert!(!cleaned.contains("  "));
        assert!(cleaned.contains("<p>c</p>"));
    }

    #[test]
    fn full_tier_always_available() {
        let reduced = reduce("<html><body>nothing recipe-like</body></html>");
        assert_eq!(reduced.tier, ReductionTier::Full);
        assert!(!reduced.content.is_empty());
    }
}
