//! channelmind - retrieval-augmented Q&A over per-channel video transcripts
//!
//! The retrieval core runs a query-complexity-driven pipeline: original,
//! HyDE, query-rewrite and RAG-Fusion vector searches merged with rank
//! fusion, conditional LLM re-ranking, then schema-constrained answer
//! generation with a single self-refine pass. A persistent semantic cache
//! fronts the completion client.
//!
//! # Architecture
//!
//! - [`vector`]: per-channel collection adapter over the vector store
//! - [`llm`]: completion/embedding clients and the cache wrapper
//! - [`cache`]: content-addressed completion cache with TTL expiry
//! - [`search`]: classification, strategies, fusion, merging, re-ranking
//! - [`answer`]: context assembly and structured answer generation
//! - [`controller`]: the caller-facing entry point

pub mod answer;
pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod errors;
pub mod llm;
pub mod search;
pub mod types;
pub mod vector;

// Re-export commonly used types
pub use controller::{ControllerOptions, RagController};
pub use errors::{RagError, Result};
pub use types::{AnswerConfig, RagResponse, SearchConfig};
