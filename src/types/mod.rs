//! Shared data model for the retrieval and answer pipelines

pub mod answer;
pub mod response;
pub mod search;

pub use answer::{AnswerConfig, AnswerResponse, AnswerStyle, ChannelPrompt, TokenUsage};
pub use response::{ComponentHealth, DebugInfo, HealthStatus, RagResponse, SearchQuality};
pub use search::{
    PipelineMode, QueryType, SearchConfig, SearchDocument, SearchMethod, SearchQuery, SearchResult,
};
