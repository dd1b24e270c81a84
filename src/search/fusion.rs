//! Reciprocal rank fusion over per-sub-query ranked lists
//!
//! Each sub-query's ranked list contributes `1/(k + rank + 1)` (rank
//! 0-based) to a document's cumulative score, k = 60. Ties are broken by
//! the best (lowest) rank a document achieved, then by video id so the
//! ordering is reproducible.

use crate::types::SearchDocument;
use std::collections::HashMap;

/// Standard RRF constant
pub const RRF_K: f32 = 60.0;

struct FusedEntry {
    document: SearchDocument,
    score: f32,
    best_rank: usize,
}

/// Fuse ranked lists into one list ordered by cumulative RRF score
///
/// The surviving copy of each video is the one with the highest vector
/// similarity; its `rank_score` is set to the fused score.
pub fn reciprocal_rank_fusion(lists: Vec<Vec<SearchDocument>>, k: f32) -> Vec<SearchDocument> {
    let mut fused: HashMap<String, FusedEntry> = HashMap::new();

    for list in lists {
        for (rank, document) in list.into_iter().enumerate() {
            let contribution = 1.0 / (k + rank as f32 + 1.0);
            match fused.get_mut(&document.video_id) {
                Some(entry) => {
                    entry.score += contribution;
                    entry.best_rank = entry.best_rank.min(rank);
                    if document.similarity > entry.document.similarity {
                        entry.document = document;
                    }
                }
                None => {
                    fused.insert(
                        document.video_id.clone(),
                        FusedEntry {
                            document,
                            score: contribution,
                            best_rank: rank,
                        },
                    );
                }
            }
        }
    }

    let mut entries: Vec<FusedEntry> = fused.into_values().collect();
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.best_rank.cmp(&b.best_rank))
            .then(a.document.video_id.cmp(&b.document.video_id))
    });

    entries
        .into_iter()
        .map(|entry| {
            let mut document = entry.document;
            document.rank_score = Some(entry.score);
            document
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchMethod;

    fn doc(video_id: &str, similarity: f32) -> SearchDocument {
        SearchDocument {
            video_id: video_id.to_string(),
            title: format!("title {}", video_id),
            content: "content".to_string(),
            similarity,
            metadata: serde_json::Map::new(),
            search_method: SearchMethod::Fusion,
            rank_score: None,
        }
    }

    #[test]
    fn test_rrf_worked_example() {
        // Lists [d1,d2,d3] and [d2,d1,d4] with k=60:
        // d1 = 1/61 + 1/62, d2 = 1/62 + 1/61 (tie), d4 = 1/63 (last)
        let lists = vec![
            vec![doc("d1", 0.9), doc("d2", 0.8), doc("d3", 0.7)],
            vec![doc("d2", 0.85), doc("d1", 0.75), doc("d4", 0.6)],
        ];

        let fused = reciprocal_rank_fusion(lists, RRF_K);
        assert_eq!(fused.len(), 4);

        let expected_top = 1.0 / 61.0 + 1.0 / 62.0;
        let score_of = |id: &str| {
            fused
                .iter()
                .find(|d| d.video_id == id)
                .unwrap()
                .rank_score
                .unwrap()
        };

        assert!((score_of("d1") - expected_top).abs() < 1e-6);
        assert!((score_of("d2") - expected_top).abs() < 1e-6);
        assert!((score_of("d4") - 1.0 / 63.0).abs() < 1e-6);

        // d1 and d2 tie on score and best rank (both reached rank 0),
        // so the video-id tie-break places d1 first; d4 is last
        assert_eq!(fused[0].video_id, "d1");
        assert_eq!(fused[1].video_id, "d2");
        assert_eq!(fused[3].video_id, "d4");
    }

    #[test]
    fn test_highest_similarity_copy_survives() {
        let lists = vec![vec![doc("d1", 0.5)], vec![doc("d1", 0.9)]];
        let fused = reciprocal_rank_fusion(lists, RRF_K);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].similarity, 0.9);
    }

    #[test]
    fn test_best_rank_breaks_score_ties() {
        // d_a: ranks 0 and 2; d_b: ranks 1 and 1 -> different scores, but
        // construct an exact tie instead: d_a ranks (0, 3), d_b ranks (3, 0)
        let lists = vec![
            vec![doc("d_a", 0.9), doc("x1", 0.8), doc("x2", 0.7), doc("d_b", 0.6)],
            vec![doc("d_b", 0.9), doc("y1", 0.8), doc("y2", 0.7), doc("d_a", 0.6)],
        ];
        let fused = reciprocal_rank_fusion(lists, RRF_K);
        let pos = |id: &str| fused.iter().position(|d| d.video_id == id).unwrap();
        // Equal scores and equal best rank (0), video id decides
        assert!(pos("d_a") < pos("d_b"));
    }

    #[test]
    fn test_empty_input() {
        let fused = reciprocal_rank_fusion(Vec::new(), RRF_K);
        assert!(fused.is_empty());
    }
}
