//! Conditional LLM re-ranking pass
//!
//! Fires only for complex/analytical queries with enough stage-1
//! survivors. Up to six candidates each get one short scoring call; the
//! final score blends the model's judgment with the vector similarity
//! (`0.75 * cross + 0.25 * vector`) so a single noisy call cannot swing
//! the ordering completely. Scoring calls are never cached.

use crate::llm::{CompletionClient, CompletionRequest};
use crate::search::merger::sort_by_final_score;
use crate::types::{QueryType, SearchDocument};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Candidates considered from the stage-1 survivors
const RERANK_POOL: usize = 12;
/// Candidates that actually get a scoring call
const RERANK_SCORED: usize = 6;
/// Minimum stage-1 survivors for re-ranking to be worth the calls
const RERANK_MIN_CANDIDATES: usize = 5;

const CROSS_WEIGHT: f32 = 0.75;
const VECTOR_WEIGHT: f32 = 0.25;

/// LLM-scored precision re-ranker
pub struct ReRanker {
    llm: Arc<dyn CompletionClient>,
    call_timeout: Duration,
}

impl ReRanker {
    pub fn new(llm: Arc<dyn CompletionClient>, call_timeout: Duration) -> Self {
        Self { llm, call_timeout }
    }

    /// Whether the pass should run at all
    pub fn should_rerank(enabled: bool, query_type: QueryType, candidate_count: usize) -> bool {
        enabled
            && matches!(query_type, QueryType::Complex | QueryType::Analytical)
            && candidate_count >= RERANK_MIN_CANDIDATES
    }

    /// Score the top candidates and return them ordered by final score,
    /// truncated to `top_k`
    pub async fn rerank(
        &self,
        query: &str,
        channel_name: &str,
        candidates: Vec<SearchDocument>,
        top_k: usize,
    ) -> Vec<SearchDocument> {
        let mut pool: Vec<SearchDocument> = candidates.into_iter().take(RERANK_POOL).collect();
        let scored_count = pool.len().min(RERANK_SCORED);

        let score_futures = pool[..scored_count]
            .iter()
            .map(|document| self.score_document(query, channel_name, document));
        let cross_scores = join_all(score_futures).await;

        for (document, cross) in pool.iter_mut().zip(cross_scores) {
            let final_score = match cross {
                Some(cross) => CROSS_WEIGHT * cross + VECTOR_WEIGHT * document.similarity,
                // scoring call failed or was unparseable
                None => document.similarity,
            };
            document.rank_score = Some(final_score);
        }
        for document in pool.iter_mut().skip(scored_count) {
            document.rank_score = Some(document.similarity);
        }

        sort_by_final_score(&mut pool);
        pool.truncate(top_k);
        pool
    }

    async fn score_document(
        &self,
        query: &str,
        channel_name: &str,
        document: &SearchDocument,
    ) -> Option<f32> {
        let excerpt: String = document.content.chars().take(300).collect();
        let request = CompletionRequest::new(
            format!(
                "You judge how relevant a transcript chunk from the {} channel is to a question.",
                channel_name
            ),
            format!(
                "Question: {}\n\nTitle: {}\nUploaded: {}\nDuration: {}\nChunk: {}\nExcerpt: {}\n\n\
                 Reply with a single relevance score between 0 and 1.",
                query,
                document.title,
                document.upload_date().unwrap_or("unknown"),
                document.duration().unwrap_or("unknown"),
                document
                    .chunk_index()
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                excerpt
            ),
        )
        .with_temperature(0.1)
        .with_max_tokens(8);

        let reply = match tokio::time::timeout(self.call_timeout, self.llm.complete(&request)).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!("rerank scoring call failed for {}: {}", document.video_id, e);
                return None;
            }
            Err(_) => {
                warn!("rerank scoring call timed out for {}", document.video_id);
                return None;
            }
        };

        let score = parse_score(&reply);
        if score.is_none() {
            debug!("unparseable rerank score '{}' for {}", reply, document.video_id);
        }
        score
    }
}

/// Pull a [0,1] score out of the model's reply
fn parse_score(reply: &str) -> Option<f32> {
    let token = reply
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !(c.is_ascii_digit() || c == '.'));
    let value: f32 = token.parse().ok()?;
    if (0.0..=1.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RagError, Result};
    use crate::types::SearchMethod;
    use async_trait::async_trait;

    fn doc(video_id: &str, similarity: f32) -> SearchDocument {
        SearchDocument {
            video_id: video_id.to_string(),
            title: "title".to_string(),
            content: "content".to_string(),
            similarity,
            metadata: serde_json::Map::new(),
            search_method: SearchMethod::Original,
            rank_score: None,
        }
    }

    struct FixedScoreClient {
        reply: String,
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for FixedScoreClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            if self.fail {
                Err(RagError::CompletionApi("down".to_string()))
            } else {
                Ok(self.reply.clone())
            }
        }

        async fn health_check(&self) -> bool {
            !self.fail
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn reranker(reply: &str, fail: bool) -> ReRanker {
        ReRanker::new(
            Arc::new(FixedScoreClient {
                reply: reply.to_string(),
                fail,
            }),
            Duration::from_secs(2),
        )
    }

    #[test]
    fn test_should_rerank_conditions() {
        assert!(ReRanker::should_rerank(true, QueryType::Complex, 5));
        assert!(ReRanker::should_rerank(true, QueryType::Analytical, 8));
        assert!(!ReRanker::should_rerank(false, QueryType::Complex, 8));
        assert!(!ReRanker::should_rerank(true, QueryType::Simple, 8));
        assert!(!ReRanker::should_rerank(true, QueryType::Complex, 4));
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("0.85"), Some(0.85));
        assert_eq!(parse_score("0.85."), Some(0.85));
        assert_eq!(parse_score("Score: nonsense"), None);
        assert_eq!(parse_score("1.5"), None);
        assert_eq!(parse_score(""), None);
    }

    #[tokio::test]
    async fn test_rerank_blends_scores() {
        let reranker = reranker("0.8", false);
        let candidates = vec![doc("v1", 0.4), doc("v2", 0.6)];

        let ranked = reranker.rerank("q", "demo", candidates, 6).await;
        assert_eq!(ranked.len(), 2);

        // 0.75*0.8 + 0.25*0.6 = 0.75 beats 0.75*0.8 + 0.25*0.4 = 0.70
        assert_eq!(ranked[0].video_id, "v2");
        let expected = 0.75 * 0.8 + 0.25 * 0.6;
        assert!((ranked[0].rank_score.unwrap() - expected).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rerank_failure_falls_back_to_similarity() {
        let reranker = reranker("", true);
        let candidates = vec![doc("v1", 0.4), doc("v2", 0.9)];

        let ranked = reranker.rerank("q", "demo", candidates, 6).await;
        assert_eq!(ranked[0].video_id, "v2");
        assert_eq!(ranked[0].rank_score, Some(0.9));
    }

    #[tokio::test]
    async fn test_rerank_truncates_to_top_k() {
        let reranker = reranker("0.5", false);
        let candidates: Vec<SearchDocument> =
            (0..10).map(|i| doc(&format!("v{:02}", i), 0.5)).collect();

        let ranked = reranker.rerank("q", "demo", candidates, 3).await;
        assert_eq!(ranked.len(), 3);
    }

    #[tokio::test]
    async fn test_unscored_tail_keeps_similarity() {
        let reranker = reranker("0.1", false);
        // 8 candidates: only the first 6 get scoring calls
        let candidates: Vec<SearchDocument> =
            (0..8).map(|i| doc(&format!("v{:02}", i), 0.9 - i as f32 * 0.05)).collect();

        let ranked = reranker.rerank("q", "demo", candidates, 8).await;
        // Scored docs get 0.75*0.1 + 0.25*sim, well below the unscored
        // tail's raw similarity, so the tail leads
        assert_eq!(ranked[0].video_id, "v06");
    }
}
