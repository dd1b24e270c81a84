//! Top-level response aggregate and health reporting

use crate::types::answer::TokenUsage;
use crate::types::search::QueryType;
use serde::{Deserialize, Serialize};

/// Which strategies fired and how good the retrieved set looked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuality {
    pub hyde_used: bool,
    pub fusion_used: bool,
    pub rewrite_used: bool,
    pub rerank_used: bool,
    pub avg_similarity: f32,
}

/// Request-scoped telemetry carried back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugInfo {
    pub query_type: QueryType,
    pub fast_mode: bool,
    pub self_refined: bool,
    pub react_steps: Vec<String>,
    pub token_usage: TokenUsage,
    pub cache_enabled: bool,
    /// Set when the controller downgraded an unexpected error
    pub error: Option<String>,
}

/// Final response returned for every `query` call
///
/// The caller always receives one of these; errors are downgraded into a
/// `confidence = 0.0` response rather than propagated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub query_id: String,
    pub channel_name: String,
    pub original_query: String,
    pub answer: String,
    pub confidence: f32,
    pub total_time_ms: f64,
    pub search_time_ms: f64,
    pub answer_time_ms: f64,
    pub documents_found: usize,
    pub sources_used: Vec<String>,
    pub search_quality: SearchQuality,
    pub debug_info: DebugInfo,
}

/// Per-component availability snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub completion_endpoint: bool,
    pub vector_store: bool,
    pub cache: bool,
}

/// Output of `health_check`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" when everything responds, "degraded" otherwise
    pub status: String,
    pub components: ComponentHealth,
    pub collections: usize,
    pub cache_hit_rate: f64,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
