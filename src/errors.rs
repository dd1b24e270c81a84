//! Error types for the channelmind RAG core
//!
//! Every failure kind maps to one degraded outcome: a failed strategy is
//! skipped, a failed cache access is a miss, a failed answer call becomes a
//! low-confidence structured answer. Only the controller's top-level catch
//! turns an unexpected error into a degraded response for the caller.

use thiserror::Error;

/// Main error type for the RAG pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// A single retrieval strategy's completion or search call failed;
    /// the strategy is skipped and the pipeline continues
    #[error("Retrieval strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },

    /// The channel has no indexed collection
    #[error("No collection found for channel '{0}'")]
    NoCollection(String),

    /// The post-filter result set is empty
    #[error("No documents survived filtering for query {0}")]
    EmptyResults(String),

    /// Answer generation failed or returned unparseable output
    #[error("Answer generation failed: {0}")]
    AnswerGeneration(String),

    /// Cache read/write failed; treated as a miss by callers
    #[error("Cache I/O failed: {0}")]
    CacheIo(String),

    /// Vector store errors
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Completion endpoint errors
    #[error("Completion API error: {0}")]
    CompletionApi(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (invalid thresholds, missing settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Per-call soft timeout
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, RagError>;

impl From<rusqlite::Error> for RagError {
    fn from(err: rusqlite::Error) -> Self {
        RagError::CacheIo(err.to_string())
    }
}

impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Config(err.to_string())
    }
}
