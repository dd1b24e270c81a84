//! Top-level RAG controller
//!
//! Drives one request through classify → configure → retrieve →
//! merge/filter → (rerank) → fallback → generate → assemble. Search and
//! answer configs are tuned from the query classification and from the
//! observed result quality. Any error reaching the controller boundary is
//! converted into a zero-confidence response; callers never see an
//! unhandled failure.

use crate::answer::{AnswerGenerator, ChannelPromptStore};
use crate::cache::{CacheStats, SemanticCache};
use crate::errors::Result;
use crate::llm::{CachedCompletionClient, CompletionClient};
use crate::search::classifier::is_fast_query;
use crate::search::merger::{sort_by_similarity, stage1_filter};
use crate::search::strategies::hits_to_documents;
use crate::search::SearchOrchestrator;
use crate::types::{
    AnswerConfig, AnswerResponse, ComponentHealth, DebugInfo, HealthStatus, QueryType, RagResponse,
    SearchConfig, SearchMethod, SearchQuery, SearchResult, TokenUsage,
};
use crate::vector::{channel_collection, VectorStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Soft latency target; overruns are logged, never aborted
pub const SOFT_BUDGET_MS: f64 = 500.0;

/// Confidence of the templated no-match response
const NO_MATCH_CONFIDENCE: f32 = 0.3;

/// Seed keywords for the fallback search when a channel prompt carries none
const DEFAULT_SEED_KEYWORDS: &[&str] = &["overview", "guide", "introduction"];

/// How many seed keywords the fallback tries
const FALLBACK_SEEDS: usize = 3;

/// Construction knobs for the controller
pub struct ControllerOptions {
    pub prompts_dir: Option<PathBuf>,
    pub default_search: SearchConfig,
    pub default_answer: AnswerConfig,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            prompts_dir: None,
            default_search: SearchConfig::default(),
            default_answer: AnswerConfig::default(),
        }
    }
}

/// Orchestrates retrieval and answer generation for caller queries
pub struct RagController {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn CompletionClient>,
    cache: Option<Arc<SemanticCache>>,
    orchestrator: SearchOrchestrator,
    generator: AnswerGenerator,
    prompts: Arc<ChannelPromptStore>,
    default_search: SearchConfig,
    default_answer: AnswerConfig,
}

impl RagController {
    pub fn new(
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn CompletionClient>,
        cache: Option<Arc<SemanticCache>>,
        options: ControllerOptions,
    ) -> Self {
        let cached_llm: Arc<dyn CompletionClient> = Arc::new(CachedCompletionClient::new(
            Arc::clone(&llm),
            cache.clone(),
        ));
        let prompts = Arc::new(ChannelPromptStore::new(options.prompts_dir));

        // strategy generation and answering go through the cache; rerank
        // scoring uses the raw client
        let orchestrator = SearchOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&cached_llm),
            Arc::clone(&llm),
        );
        let generator = AnswerGenerator::new(Arc::clone(&cached_llm), Arc::clone(&prompts));

        Self {
            store,
            llm,
            cache,
            orchestrator,
            generator,
            prompts,
            default_search: options.default_search,
            default_answer: options.default_answer,
        }
    }

    /// Answer one question against one channel's corpus
    pub async fn query(
        &self,
        text: &str,
        channel_name: &str,
        search_config: Option<SearchConfig>,
        answer_config: Option<AnswerConfig>,
        fast_mode: Option<bool>,
    ) -> RagResponse {
        let started = Instant::now();
        let mut query = SearchQuery::new(text, channel_name);
        let fast = fast_mode.unwrap_or(false) || is_fast_query(text);

        info!(
            "query {} '{}' on channel '{}' ({:?}, fast={})",
            query.query_id, text, channel_name, query.query_type, fast
        );

        let outcome = self
            .run(&mut query, search_config, answer_config, fast, started)
            .await;

        match outcome {
            Ok(response) => {
                if response.total_time_ms > SOFT_BUDGET_MS {
                    warn!(
                        "query {} exceeded the {:.0}ms soft budget: {:.1}ms",
                        response.query_id, SOFT_BUDGET_MS, response.total_time_ms
                    );
                }
                response
            }
            Err(e) => {
                warn!("query {} failed: {}", query.query_id, e);
                degraded_response(&query, fast, started, &e.to_string())
            }
        }
    }

    async fn run(
        &self,
        query: &mut SearchQuery,
        search_config: Option<SearchConfig>,
        answer_config: Option<AnswerConfig>,
        fast: bool,
        started: Instant,
    ) -> Result<RagResponse> {
        let search_config = self.effective_search_config(search_config, query.query_type, fast)?;

        let search_started = Instant::now();
        let mut search_result = self.orchestrator.search(query, &search_config).await?;
        if search_result.documents.is_empty() {
            search_result = self.keyword_fallback(query, &search_config).await;
        }
        let search_time_ms = search_started.elapsed().as_secs_f64() * 1000.0;

        if search_result.documents.is_empty() {
            return Ok(self.no_match_response(query, fast, started, search_time_ms));
        }

        let answer_config =
            self.effective_answer_config(answer_config, query, &search_result, fast);

        let answer_started = Instant::now();
        let answer = self
            .generator
            .generate(&query.original_query, &search_result, &answer_config)
            .await;
        let answer_time_ms = answer_started.elapsed().as_secs_f64() * 1000.0;

        Ok(assemble_response(
            query,
            fast,
            &search_result,
            answer,
            started.elapsed().as_secs_f64() * 1000.0,
            search_time_ms,
            answer_time_ms,
            self.cache.is_some(),
        ))
    }

    /// Derive the search config from classification when none was given
    fn effective_search_config(
        &self,
        provided: Option<SearchConfig>,
        query_type: QueryType,
        fast: bool,
    ) -> Result<SearchConfig> {
        let mut config = match provided {
            Some(config) => {
                config.validate()?;
                config
            }
            None => {
                let mut config = self.default_search.clone();
                match query_type {
                    QueryType::Simple => {
                        config.enable_rerank = false;
                        config.max_results = config.max_results.min(5);
                    }
                    QueryType::Factual => {
                        // accuracy first: raise both floors together
                        config.similarity_threshold = config.similarity_threshold.max(0.30);
                        config.precision_threshold =
                            config.precision_threshold.max(config.similarity_threshold + 0.05);
                    }
                    QueryType::Analytical | QueryType::Complex => {
                        config.enable_rerank = true;
                    }
                }
                config
            }
        };

        if fast {
            config.enable_rewrite = false;
            config.enable_rag_fusion = false;
            config.enable_rerank = false;
            config.max_results = config.max_results.min(3);
        }

        config.validate()?;
        Ok(config)
    }

    /// Derive the answer config from observed result quality
    fn effective_answer_config(
        &self,
        provided: Option<AnswerConfig>,
        query: &SearchQuery,
        search_result: &SearchResult,
        fast: bool,
    ) -> AnswerConfig {
        let mut config = provided.unwrap_or_else(|| {
            let mut config = self.default_answer.clone();
            let avg = search_result.average_similarity();
            if avg > 0.7 {
                config.enable_self_refine = false;
            }
            if search_result.documents.len() < 3 || avg < 0.4 {
                config.enable_react = true;
            }
            if query.query_type == QueryType::Complex {
                config.max_tokens = config.max_tokens.max(800);
            }
            config
        });

        if fast {
            config.enable_self_refine = false;
            config.enable_react = false;
            config.max_tokens = config.max_tokens.min(400);
        }
        config
    }

    /// One keyword search per channel seed keyword when every strategy
    /// came back empty
    async fn keyword_fallback(
        &self,
        query: &SearchQuery,
        config: &SearchConfig,
    ) -> SearchResult {
        let collection = channel_collection(&query.channel_name);
        if !self.store.has_collection(&collection).await {
            return SearchResult::empty(query);
        }

        let prompt = self.prompts.get(&query.channel_name);
        let seeds: Vec<String> = if prompt.expertise_keywords.is_empty() {
            DEFAULT_SEED_KEYWORDS.iter().map(|s| s.to_string()).collect()
        } else {
            prompt.expertise_keywords.clone()
        };

        let mut lists = Vec::new();
        for seed in seeds.iter().take(FALLBACK_SEEDS) {
            let probe = format!("{} {}", query.original_query, seed);
            match self.store.search(&collection, &probe, config.max_results).await {
                Ok(hits) => lists.push(hits_to_documents(hits, SearchMethod::Keyword)),
                Err(e) => warn!("fallback search '{}' failed: {}", seed, e),
            }
        }

        let merged = crate::search::merger::merge_and_deduplicate(lists);
        let total_found = merged.len();
        let mut documents = stage1_filter(merged, config);
        sort_by_similarity(&mut documents);
        documents.truncate(config.max_results);

        if !documents.is_empty() {
            info!(
                "keyword fallback recovered {} documents for query {}",
                documents.len(),
                query.query_id
            );
        }

        SearchResult {
            query_id: query.query_id.clone(),
            channel_name: query.channel_name.clone(),
            documents,
            total_found,
            search_time_ms: 0.0,
            hyde_used: false,
            fusion_used: false,
            rewrite_used: false,
            rerank_used: false,
        }
    }

    /// Templated response when nothing matched; no generation call is made
    fn no_match_response(
        &self,
        query: &SearchQuery,
        fast: bool,
        started: Instant,
        search_time_ms: f64,
    ) -> RagResponse {
        let prompt = self.prompts.get(&query.channel_name);
        let coverage = if prompt.expertise_keywords.is_empty() {
            "its indexed videos".to_string()
        } else {
            prompt.expertise_keywords.join(", ")
        };

        RagResponse {
            query_id: query.query_id.clone(),
            channel_name: query.channel_name.clone(),
            original_query: query.original_query.clone(),
            answer: format!(
                "No matching content was found in the {} channel for this question. \
                 The channel mainly covers: {}.",
                query.channel_name, coverage
            ),
            confidence: NO_MATCH_CONFIDENCE,
            total_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            search_time_ms,
            answer_time_ms: 0.0,
            documents_found: 0,
            sources_used: Vec::new(),
            search_quality: Default::default(),
            debug_info: DebugInfo {
                query_type: query.query_type,
                fast_mode: fast,
                self_refined: false,
                react_steps: Vec::new(),
                token_usage: TokenUsage::default(),
                cache_enabled: self.cache.is_some(),
                error: None,
            },
        }
    }

    /// Availability of the completion endpoint, vector store and cache
    pub async fn health_check(&self) -> HealthStatus {
        let completion = self.llm.health_check().await;
        let collections = self.store.list_collections().await;
        let vector_ok = collections.is_ok();
        let collection_count = collections.map(|c| c.len()).unwrap_or(0);
        let cache_ok = self.cache.is_some();

        let status = if completion && vector_ok {
            "healthy"
        } else {
            "degraded"
        };

        HealthStatus {
            status: status.to_string(),
            components: ComponentHealth {
                completion_endpoint: completion,
                vector_store: vector_ok,
                cache: cache_ok,
            },
            collections: collection_count,
            cache_hit_rate: self
                .cache
                .as_ref()
                .map(|c| c.stats().hit_rate())
                .unwrap_or(0.0),
        }
    }

    /// Channels with an indexed collection
    pub async fn list_channels(&self) -> Result<Vec<String>> {
        let collections = self.store.list_collections().await?;
        Ok(collections
            .into_iter()
            .map(|name| {
                name.strip_prefix(crate::vector::COLLECTION_PREFIX)
                    .unwrap_or(&name)
                    .to_string()
            })
            .collect())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map(|c| c.stats())
            .unwrap_or_default()
    }

    pub fn cache_clear(&self) -> bool {
        self.cache.as_ref().map(|c| c.clear()).unwrap_or(false)
    }

    pub fn cache_cleanup_expired(&self) -> usize {
        self.cache
            .as_ref()
            .map(|c| c.cleanup_expired())
            .unwrap_or(0)
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_response(
    query: &SearchQuery,
    fast: bool,
    search_result: &SearchResult,
    answer: AnswerResponse,
    total_time_ms: f64,
    search_time_ms: f64,
    answer_time_ms: f64,
    cache_enabled: bool,
) -> RagResponse {
    RagResponse {
        query_id: query.query_id.clone(),
        channel_name: query.channel_name.clone(),
        original_query: query.original_query.clone(),
        answer: answer.answer,
        confidence: answer.confidence,
        total_time_ms,
        search_time_ms,
        answer_time_ms,
        documents_found: search_result.documents.len(),
        sources_used: answer.sources_used,
        search_quality: crate::types::SearchQuality {
            hyde_used: search_result.hyde_used,
            fusion_used: search_result.fusion_used,
            rewrite_used: search_result.rewrite_used,
            rerank_used: search_result.rerank_used,
            avg_similarity: search_result.average_similarity(),
        },
        debug_info: DebugInfo {
            query_type: query.query_type,
            fast_mode: fast,
            self_refined: answer.self_refined,
            react_steps: answer.react_steps,
            token_usage: answer.token_usage,
            cache_enabled,
            error: None,
        },
    }
}

/// Degraded response carrying the error text; the caller still receives a
/// well-formed value
fn degraded_response(query: &SearchQuery, fast: bool, started: Instant, error: &str) -> RagResponse {
    RagResponse {
        query_id: query.query_id.clone(),
        channel_name: query.channel_name.clone(),
        original_query: query.original_query.clone(),
        answer: format!("The request could not be processed: {}", error),
        confidence: 0.0,
        total_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        search_time_ms: 0.0,
        answer_time_ms: 0.0,
        documents_found: 0,
        sources_used: Vec::new(),
        search_quality: Default::default(),
        debug_info: DebugInfo {
            query_type: query.query_type,
            fast_mode: fast,
            self_refined: false,
            react_steps: Vec::new(),
            token_usage: TokenUsage::default(),
            cache_enabled: false,
            error: Some(error.to_string()),
        },
    }
}
