//! Completion and embedding clients for the Ollama-compatible API

pub mod cached;
pub mod client;

pub use cached::CachedCompletionClient;
pub use client::{CompletionClient, CompletionRequest, EmbeddingClient, OllamaChatClient};
