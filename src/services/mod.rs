//! Business-logic services: content reduction, ingredient parsing, recipe
//! extraction, caching, and the external fetch/completion capabilities.

pub mod cache;
pub mod fetch;
pub mod ingredient;
pub mod llm;
pub mod recipe;
pub mod reducer;

pub use cache::RecipeCache;
pub use fetch::{FetchError, PageFetcher, RenderedPageFetcher};
pub use llm::{ChatCompleter, CompletionError, OllamaChatClient};
pub use recipe::{
    ExtractionPhase, PhaseStatus, Progress, ProgressSender, RecipeError, RecipeService,
};
pub use reducer::{ReducedContent, ReductionTier};
