//! Semantic cache for completion calls

pub mod store;

pub use store::{CacheStats, SemanticCache};
