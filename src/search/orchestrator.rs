//! Search pipeline orchestration
//!
//! Selects the pipeline mode, fans out the independent strategies
//! (original, HyDE, fusion sub-queries) under a semaphore bound, runs the
//! rewrite strategy after the original result it depends on, merges and
//! filters, and conditionally re-ranks. Every network call runs under a
//! soft timeout; a timed-out or failed call skips its strategy.

use crate::errors::Result;
use crate::llm::CompletionClient;
use crate::search::classifier::select_pipeline_mode;
use crate::search::fusion::{reciprocal_rank_fusion, RRF_K};
use crate::search::merger::{
    merge_and_deduplicate, sort_by_similarity, stage1_filter, stage2_filter,
};
use crate::search::reranker::ReRanker;
use crate::search::strategies::{
    generate_fusion_queries, generate_hyde, generate_rewrite, vector_search, StrategyContext,
};
use crate::types::{
    PipelineMode, SearchConfig, SearchDocument, SearchMethod, SearchQuery, SearchResult,
};
use crate::vector::{channel_collection, VectorStore};
use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default soft timeout per network call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(8);

/// Runs the multi-strategy search pipeline for one query
pub struct SearchOrchestrator {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn CompletionClient>,
    rerank_llm: Arc<dyn CompletionClient>,
    call_timeout: Duration,
}

impl SearchOrchestrator {
    /// `llm` is the cache-fronted client used for strategy generation;
    /// `rerank_llm` is the raw client, since scoring calls bypass the cache
    pub fn new(
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn CompletionClient>,
        rerank_llm: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            store,
            llm,
            rerank_llm,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Execute the pipeline; an unindexed channel yields an empty result
    /// so the controller can trigger its fallback
    pub async fn search(
        &self,
        query: &mut SearchQuery,
        config: &SearchConfig,
    ) -> Result<SearchResult> {
        config.validate()?;
        let started = Instant::now();

        let collection = channel_collection(&query.channel_name);
        if !self.store.has_collection(&collection).await {
            warn!("no collection for channel '{}'", query.channel_name);
            return Ok(SearchResult::empty(query));
        }

        let mode = select_pipeline_mode(&query.original_query, query.query_type);
        debug!(
            "query {} classified {:?}, pipeline mode {:?}",
            query.query_id, query.query_type, mode
        );

        let hyde_on = config.enable_hyde && mode != PipelineMode::Lightweight;
        let rewrite_on = config.enable_rewrite && mode != PipelineMode::Lightweight;
        let fusion_on = config.enable_rag_fusion && mode == PipelineMode::Comprehensive;

        let channel_name = query.channel_name.clone();
        let original_query = query.original_query.clone();
        let semaphore = Arc::new(Semaphore::new(config.fusion_query_count() + 2));
        let ctx = StrategyContext {
            store: self.store.as_ref(),
            llm: self.llm.as_ref(),
            collection: &collection,
            channel_name: &channel_name,
            max_results: config.max_results,
        };

        // Independent strategies fan out and join before the merge
        let original_fut = self.bounded(
            &semaphore,
            vector_search(&ctx, &original_query, SearchMethod::Original),
            "original search",
        );
        let hyde_fut = self.run_hyde(&ctx, &semaphore, &original_query, hyde_on);
        let fusion_fut = self.run_fusion(
            &ctx,
            &semaphore,
            &original_query,
            config.fusion_query_count(),
            fusion_on,
        );

        let (original, (hyde_doc, hyde_docs), fusion_docs) =
            tokio::join!(original_fut, hyde_fut, fusion_fut);

        // Rewrite depends on the best original hit as context
        let original = original.unwrap_or_default();
        let (rewritten, rewrite_docs) = if rewrite_on && !original.is_empty() {
            self.run_rewrite(&ctx, &semaphore, &original_query, &original).await
        } else {
            (None, None)
        };

        if let Some(doc) = hyde_doc {
            query.hyde_document = Some(doc);
        }
        if let Some(text) = rewritten {
            query.rewritten_query = Some(text);
        }

        let hyde_used = hyde_docs.as_ref().is_some_and(|d| !d.is_empty());
        let fusion_used = fusion_docs.as_ref().is_some_and(|d| !d.is_empty());
        let rewrite_used = rewrite_docs.as_ref().is_some_and(|d| !d.is_empty());

        let mut lists: Vec<Vec<SearchDocument>> = vec![original];
        if let Some(docs) = hyde_docs {
            lists.push(docs);
        }
        if let Some(docs) = fusion_docs {
            lists.push(docs);
        }
        if let Some(docs) = rewrite_docs {
            lists.push(docs);
        }

        let merged = merge_and_deduplicate(lists);
        let total_found = merged.len();
        let stage1 = stage1_filter(merged, config);

        let rerank_used =
            ReRanker::should_rerank(config.enable_rerank, query.query_type, stage1.len());

        let mut documents = if rerank_used {
            let reranker = ReRanker::new(Arc::clone(&self.rerank_llm), self.call_timeout);
            reranker
                .rerank(&original_query, &channel_name, stage1, config.rerank_top_k)
                .await
        } else {
            // without a rerank pass, fused rank scores are not comparable
            // to raw similarities, so ordering stays similarity-based
            let mut stage2 = stage2_filter(stage1, config);
            sort_by_similarity(&mut stage2);
            stage2
        };
        documents.truncate(config.max_results);

        let search_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            "query {} retrieved {} documents ({} unique) in {:.1}ms",
            query.query_id,
            documents.len(),
            total_found,
            search_time_ms
        );

        Ok(SearchResult {
            query_id: query.query_id.clone(),
            channel_name: query.channel_name.clone(),
            documents,
            total_found,
            search_time_ms,
            hyde_used,
            fusion_used,
            rewrite_used,
            rerank_used,
        })
    }

    /// HyDE: generate a hypothetical answer, then search with it
    async fn run_hyde(
        &self,
        ctx: &StrategyContext<'_>,
        semaphore: &Semaphore,
        query: &str,
        enabled: bool,
    ) -> (Option<String>, Option<Vec<SearchDocument>>) {
        if !enabled {
            return (None, None);
        }

        let Some(hyde_doc) = self
            .bounded(semaphore, generate_hyde(ctx, query), "hyde generation")
            .await
        else {
            return (None, None);
        };

        let docs = self
            .bounded(
                semaphore,
                vector_search(ctx, &hyde_doc, SearchMethod::Hyde),
                "hyde search",
            )
            .await;
        (Some(hyde_doc), docs)
    }

    /// RAG-Fusion: generate sub-queries, search each concurrently, fuse
    async fn run_fusion(
        &self,
        ctx: &StrategyContext<'_>,
        semaphore: &Semaphore,
        query: &str,
        count: usize,
        enabled: bool,
    ) -> Option<Vec<SearchDocument>> {
        if !enabled {
            return None;
        }

        let sub_queries = self
            .bounded(
                semaphore,
                generate_fusion_queries(ctx, query, count),
                "fusion query generation",
            )
            .await?;
        if sub_queries.is_empty() {
            return None;
        }

        let searches = sub_queries.iter().map(|sub_query| {
            self.bounded(
                semaphore,
                vector_search(ctx, sub_query, SearchMethod::Fusion),
                "fusion sub-query search",
            )
        });
        let ranked_lists: Vec<Vec<SearchDocument>> =
            join_all(searches).await.into_iter().flatten().collect();

        if ranked_lists.is_empty() {
            return None;
        }
        Some(reciprocal_rank_fusion(ranked_lists, RRF_K))
    }

    /// Query rewrite, seeded with an excerpt of the best original hit
    async fn run_rewrite(
        &self,
        ctx: &StrategyContext<'_>,
        semaphore: &Semaphore,
        original_query: &str,
        original_docs: &[SearchDocument],
    ) -> (Option<String>, Option<Vec<SearchDocument>>) {
        let context = original_docs.first().map(|d| d.content.as_str()).unwrap_or("");

        let Some(rewritten) = self
            .bounded(
                semaphore,
                generate_rewrite(ctx, original_query, context),
                "query rewrite",
            )
            .await
        else {
            return (None, None);
        };

        let rewritten = rewritten.trim().to_string();
        if rewritten.is_empty() || rewritten.eq_ignore_ascii_case(original_query.trim()) {
            debug!("rewrite identical to original, skipping");
            return (None, None);
        }

        let docs = self
            .bounded(
                semaphore,
                vector_search(ctx, &rewritten, SearchMethod::Rewritten),
                "rewritten search",
            )
            .await;
        (Some(rewritten), docs)
    }

    /// Run one network call under the request's concurrency bound and the
    /// per-call soft timeout; failures downgrade to a skipped strategy
    async fn bounded<T>(
        &self,
        semaphore: &Semaphore,
        fut: impl Future<Output = Result<T>>,
        what: &str,
    ) -> Option<T> {
        let Ok(_permit) = semaphore.acquire().await else {
            return None;
        };
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("{} failed, skipping: {}", what, e);
                None
            }
            Err(_) => {
                warn!(
                    "{} exceeded {}ms budget, skipping",
                    what,
                    self.call_timeout.as_millis()
                );
                None
            }
        }
    }
}
