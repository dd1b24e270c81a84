//! Search-side data model: queries, configuration, documents, results

use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query complexity classes derived from lexical features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Simple,
    Factual,
    Analytical,
    Complex,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Simple => "simple",
            QueryType::Factual => "factual",
            QueryType::Analytical => "analytical",
            QueryType::Complex => "complex",
        }
    }
}

/// Which retrieval strategies run for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Original-query search only
    Lightweight,
    /// Original + HyDE + rewrite
    Standard,
    /// Original + HyDE + RAG-Fusion + rewrite
    Comprehensive,
}

/// Strategy that produced the best-surviving copy of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Original,
    Hyde,
    Rewritten,
    Fusion,
    /// Seed-keyword fallback when every strategy came back empty
    Keyword,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Original => "original",
            SearchMethod::Hyde => "hyde",
            SearchMethod::Rewritten => "rewritten",
            SearchMethod::Fusion => "fusion",
            SearchMethod::Keyword => "keyword",
        }
    }
}

/// A query flowing through the search pipeline
///
/// Immutable once created except `hyde_document` and `rewritten_query`,
/// each set at most once by its strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query_id: String,
    pub original_query: String,
    pub channel_name: String,
    pub query_type: QueryType,
    pub hyde_document: Option<String>,
    pub rewritten_query: Option<String>,
}

impl SearchQuery {
    pub fn new(original_query: impl Into<String>, channel_name: impl Into<String>) -> Self {
        let original_query = original_query.into();
        let query_type = crate::search::classifier::classify_query(&original_query);
        Self {
            query_id: Uuid::new_v4().to_string()[..8].to_string(),
            original_query,
            channel_name: channel_name.into(),
            query_type,
            hyde_document: None,
            rewritten_query: None,
        }
    }
}

/// Search pipeline configuration
///
/// `similarity_threshold` is the recall-oriented stage-1 floor;
/// `precision_threshold` only applies when re-ranking did not run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_results: usize,
    pub similarity_threshold: f32,
    pub precision_threshold: f32,
    pub enable_hyde: bool,
    pub enable_rewrite: bool,
    pub enable_rag_fusion: bool,
    pub enable_rerank: bool,
    /// Number of fusion sub-queries, clamped to 3..=5 at validation
    pub rag_fusion_queries: usize,
    pub rerank_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 12,
            similarity_threshold: 0.20,
            precision_threshold: 0.30,
            enable_hyde: true,
            enable_rewrite: true,
            enable_rag_fusion: true,
            enable_rerank: true,
            rag_fusion_queries: 4,
            rerank_top_k: 6,
        }
    }
}

impl SearchConfig {
    /// Build a config with explicit thresholds, rejecting inverted ones
    pub fn with_thresholds(similarity_threshold: f32, precision_threshold: f32) -> Result<Self> {
        let config = Self {
            similarity_threshold,
            precision_threshold,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the threshold-ordering invariant and normalize the fusion count
    pub fn validate(&self) -> Result<()> {
        if self.precision_threshold < self.similarity_threshold {
            return Err(RagError::Config(format!(
                "precision_threshold {} must be >= similarity_threshold {}",
                self.precision_threshold, self.similarity_threshold
            )));
        }
        if self.max_results == 0 {
            return Err(RagError::Config("max_results must be positive".to_string()));
        }
        Ok(())
    }

    /// Fusion sub-query count bounded to the useful 3-5 range
    pub fn fusion_query_count(&self) -> usize {
        self.rag_fusion_queries.clamp(3, 5)
    }
}

/// A retrieved transcript chunk with its provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
    pub video_id: String,
    pub title: String,
    pub content: String,
    /// Normalized relevance in [0,1]
    pub similarity: f32,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub search_method: SearchMethod,
    /// Post-fusion or post-rerank score, when one was computed
    pub rank_score: Option<f32>,
}

impl SearchDocument {
    /// Score used for final ordering: rank score when present, else similarity
    pub fn final_score(&self) -> f32 {
        self.rank_score.unwrap_or(self.similarity)
    }

    pub fn upload_date(&self) -> Option<&str> {
        self.metadata.get("upload").and_then(|v| v.as_str())
    }

    pub fn duration(&self) -> Option<&str> {
        self.metadata.get("duration").and_then(|v| v.as_str())
    }

    pub fn chunk_index(&self) -> Option<i64> {
        self.metadata.get("chunk_index").and_then(|v| v.as_i64())
    }
}

/// Outcome of the search pipeline for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query_id: String,
    pub channel_name: String,
    /// Ordered by final score descending, at most `max_results`
    pub documents: Vec<SearchDocument>,
    /// Unique documents found before filtering and truncation
    pub total_found: usize,
    pub search_time_ms: f64,
    pub hyde_used: bool,
    pub fusion_used: bool,
    pub rewrite_used: bool,
    pub rerank_used: bool,
}

impl SearchResult {
    /// Empty result shell for a query whose channel has no collection
    pub fn empty(query: &SearchQuery) -> Self {
        Self {
            query_id: query.query_id.clone(),
            channel_name: query.channel_name.clone(),
            documents: Vec::new(),
            total_found: 0,
            search_time_ms: 0.0,
            hyde_used: false,
            fusion_used: false,
            rewrite_used: false,
            rerank_used: false,
        }
    }

    pub fn average_similarity(&self) -> f32 {
        if self.documents.is_empty() {
            return 0.0;
        }
        self.documents.iter().map(|d| d.similarity).sum::<f32>() / self.documents.len() as f32
    }
}
