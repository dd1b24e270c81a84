//! Retrieval strategies: original query, HyDE, query rewrite, RAG-Fusion
//!
//! Each strategy issues one or more vector-store calls, some preceded by a
//! completion call. A failed completion or search skips the strategy; it
//! is never retried and never aborts the request.

use crate::errors::Result;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::types::{SearchDocument, SearchMethod};
use crate::vector::{StoreHit, VectorStore};

/// Max generated tokens per strategy call
pub const HYDE_MAX_TOKENS: u32 = 100;
pub const REWRITE_MAX_TOKENS: u32 = 40;
pub const FUSION_MAX_TOKENS: u32 = 150;

/// How much of the best original hit feeds the rewrite prompt
const REWRITE_CONTEXT_CHARS: usize = 200;

/// Shared references every strategy call needs
pub struct StrategyContext<'a> {
    pub store: &'a dyn VectorStore,
    pub llm: &'a dyn CompletionClient,
    pub collection: &'a str,
    pub channel_name: &'a str,
    pub max_results: usize,
}

/// Convert raw store hits into tagged search documents
pub fn hits_to_documents(hits: Vec<StoreHit>, method: SearchMethod) -> Vec<SearchDocument> {
    hits.into_iter()
        .map(|hit| {
            let video_id = hit
                .metadata
                .get("video_id")
                .and_then(|v| v.as_str())
                .unwrap_or(&hit.id)
                .to_string();
            let title = hit
                .metadata
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Untitled")
                .to_string();

            SearchDocument {
                video_id,
                title,
                content: hit.content,
                similarity: hit.similarity.clamp(0.0, 1.0),
                metadata: hit.metadata,
                search_method: method,
                rank_score: None,
            }
        })
        .collect()
}

/// Vector-search one probe text against the channel collection
pub async fn vector_search(
    ctx: &StrategyContext<'_>,
    probe: &str,
    method: SearchMethod,
) -> Result<Vec<SearchDocument>> {
    let hits = ctx.store.search(ctx.collection, probe, ctx.max_results).await?;
    Ok(hits_to_documents(hits, method))
}

/// Generate a hypothetical ideal answer to use as the search probe
pub async fn generate_hyde(ctx: &StrategyContext<'_>, query: &str) -> Result<String> {
    let request = CompletionRequest::new(
        format!("You are an expert on the {} channel.", ctx.channel_name),
        format!(
            "Write a short hypothetical document that would perfectly answer the question \
             below, from this channel's point of view. Include concrete entities, numbers \
             and place names where plausible.\n\nQuestion: {}",
            query
        ),
    )
    .with_temperature(0.7)
    .with_max_tokens(HYDE_MAX_TOKENS);

    ctx.llm.complete(&request).await
}

/// Rewrite the query into a keyword-dense reformulation, given an excerpt
/// of the best original hit as context
pub async fn generate_rewrite(
    ctx: &StrategyContext<'_>,
    query: &str,
    context: &str,
) -> Result<String> {
    let excerpt: String = context.chars().take(REWRITE_CONTEXT_CHARS).collect();
    let request = CompletionRequest::new(
        format!(
            "You optimize search queries for the {} channel's transcript index.",
            ctx.channel_name
        ),
        format!(
            "Rewrite the question as a keyword-dense search query likely to match this \
             channel's transcripts. Reply with the query only.\n\nQuestion: {}\n\
             Channel context: {}",
            query, excerpt
        ),
    )
    .with_temperature(0.3)
    .with_max_tokens(REWRITE_MAX_TOKENS);

    ctx.llm.complete(&request).await
}

/// Generate paraphrased sub-queries for RAG-Fusion
pub async fn generate_fusion_queries(
    ctx: &StrategyContext<'_>,
    query: &str,
    count: usize,
) -> Result<Vec<String>> {
    let request = CompletionRequest::new(
        format!(
            "You generate alternative search queries for the {} channel's transcript index.",
            ctx.channel_name
        ),
        format!(
            "Write {} different rephrasings of the question below, each targeting a \
             different facet of it. One per line, no numbering.\n\nQuestion: {}",
            count, query
        ),
    )
    .with_temperature(0.8)
    .with_max_tokens(FUSION_MAX_TOKENS);

    let raw = ctx.llm.complete(&request).await?;
    Ok(parse_fusion_lines(&raw, query, count))
}

/// Split model output into sub-queries, stripping enumeration markers and
/// dropping lines identical to the original query
pub fn parse_fusion_lines(raw: &str, original: &str, count: usize) -> Vec<String> {
    raw.lines()
        .map(strip_enumeration)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.eq_ignore_ascii_case(original.trim()))
        .map(|line| line.to_string())
        .take(count)
        .collect()
}

fn strip_enumeration(line: &str) -> &str {
    line.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*' | ' '))
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fusion_strips_markers() {
        let raw = "1. best wards for rentals\n2) rental yield by ward\n- station proximity returns";
        let parsed = parse_fusion_lines(raw, "good areas", 5);
        assert_eq!(
            parsed,
            vec![
                "best wards for rentals",
                "rental yield by ward",
                "station proximity returns"
            ]
        );
    }

    #[test]
    fn test_parse_fusion_drops_original() {
        let raw = "good areas\nbest wards for rentals";
        let parsed = parse_fusion_lines(raw, "good areas", 5);
        assert_eq!(parsed, vec!["best wards for rentals"]);
    }

    #[test]
    fn test_parse_fusion_respects_count() {
        let raw = "a\nb\nc\nd\ne\nf";
        let parsed = parse_fusion_lines(raw, "q", 3);
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn test_parse_fusion_skips_blank_lines() {
        let raw = "\n  \nfirst query\n\nsecond query\n";
        let parsed = parse_fusion_lines(raw, "q", 5);
        assert_eq!(parsed, vec!["first query", "second query"]);
    }

    #[test]
    fn test_hits_to_documents_defaults() {
        let hit = StoreHit {
            id: "point-7".to_string(),
            content: "chunk text".to_string(),
            metadata: serde_json::Map::new(),
            similarity: 1.4,
        };

        let documents = hits_to_documents(vec![hit], SearchMethod::Original);
        assert_eq!(documents[0].video_id, "point-7");
        assert_eq!(documents[0].title, "Untitled");
        // clamped into [0,1]
        assert_eq!(documents[0].similarity, 1.0);
    }

    #[test]
    fn test_hits_to_documents_reads_metadata() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("video_id".to_string(), serde_json::json!("20240101_tour"));
        metadata.insert("title".to_string(), serde_json::json!("Ward tour"));

        let hit = StoreHit {
            id: "1".to_string(),
            content: "chunk".to_string(),
            metadata,
            similarity: 0.8,
        };

        let documents = hits_to_documents(vec![hit], SearchMethod::Hyde);
        assert_eq!(documents[0].video_id, "20240101_tour");
        assert_eq!(documents[0].title, "Ward tour");
        assert_eq!(documents[0].search_method, SearchMethod::Hyde);
    }
}
