//! Result merging and two-stage similarity filtering
//!
//! Merge keeps at most one document per video, the copy with the highest
//! similarity, tagged with the strategy that produced it. Stage 1 applies
//! the low recall-oriented floor before re-ranking gets a chance to fix
//! ordering; stage 2 applies the precision floor only when re-ranking did
//! not run.

use crate::types::{SearchConfig, SearchDocument};
use std::collections::HashMap;

/// Merge strategy result lists, deduplicating by video id
pub fn merge_and_deduplicate(lists: Vec<Vec<SearchDocument>>) -> Vec<SearchDocument> {
    let mut seen: HashMap<String, SearchDocument> = HashMap::new();

    for list in lists {
        for document in list {
            match seen.get(&document.video_id) {
                Some(existing) if existing.similarity >= document.similarity => {}
                _ => {
                    seen.insert(document.video_id.clone(), document);
                }
            }
        }
    }

    let mut merged: Vec<SearchDocument> = seen.into_values().collect();
    sort_by_similarity(&mut merged);
    merged
}

/// Stage 1: drop documents at or below the recall threshold
pub fn stage1_filter(documents: Vec<SearchDocument>, config: &SearchConfig) -> Vec<SearchDocument> {
    documents
        .into_iter()
        .filter(|d| d.similarity > config.similarity_threshold)
        .collect()
}

/// Stage 2: drop documents at or below the precision threshold
///
/// Callers skip this when re-ranking ran; rerank output is already
/// precision-vetted.
pub fn stage2_filter(documents: Vec<SearchDocument>, config: &SearchConfig) -> Vec<SearchDocument> {
    documents
        .into_iter()
        .filter(|d| d.similarity > config.precision_threshold)
        .collect()
}

/// Sort by similarity descending, video id as the deterministic tie-break
pub fn sort_by_similarity(documents: &mut [SearchDocument]) {
    documents.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.video_id.cmp(&b.video_id))
    });
}

/// Sort by final score (rank score when present) descending, video id
/// tie-break
pub fn sort_by_final_score(documents: &mut [SearchDocument]) {
    documents.sort_by(|a, b| {
        b.final_score()
            .partial_cmp(&a.final_score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.video_id.cmp(&b.video_id))
    });
}
