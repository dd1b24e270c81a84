//! Multi-strategy search pipeline: classification, retrieval strategies,
//! rank fusion, merging, conditional re-ranking, orchestration

pub mod classifier;
pub mod fusion;
pub mod merger;
pub mod orchestrator;
pub mod reranker;
pub mod strategies;

pub use classifier::{classify_query, is_fast_query, select_pipeline_mode};
pub use orchestrator::SearchOrchestrator;
