//! Context assembly from retrieved documents
//!
//! Builds the context block fed to the model: one header + excerpt per
//! document, appended until the character budget is reached.

use crate::types::SearchDocument;

/// Character budget for the whole context block
pub const DEFAULT_CONTEXT_BUDGET: usize = 2000;

/// Excerpt length per document
const EXCERPT_CHARS: usize = 400;

/// Assembled context plus which documents made it in
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub text: String,
    pub document_count: usize,
    pub video_ids: Vec<String>,
}

/// Build a character-budgeted context string from the top documents
pub fn build_context(documents: &[SearchDocument], budget: usize) -> AssembledContext {
    let mut parts = Vec::new();
    let mut video_ids = Vec::new();
    let mut used = 0;

    for (index, document) in documents.iter().enumerate() {
        let excerpt: String = document.content.chars().take(EXCERPT_CHARS).collect();
        let block = format!(
            "[Video {}] {} ({})\nUploaded: {} | Duration: {} | Chunk: {} | Similarity: {:.3}\n{}",
            index + 1,
            document.title,
            document.video_id,
            document.upload_date().unwrap_or("unknown"),
            document.duration().unwrap_or("unknown"),
            document
                .chunk_index()
                .map(|i| i.to_string())
                .unwrap_or_else(|| "-".to_string()),
            document.similarity,
            excerpt
        );

        if used + block.len() > budget && !parts.is_empty() {
            break;
        }
        used += block.len();
        video_ids.push(document.video_id.clone());
        parts.push(block);
    }

    AssembledContext {
        text: parts.join("\n---\n"),
        document_count: video_ids.len(),
        video_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchMethod;

    fn doc(video_id: &str, content: &str) -> SearchDocument {
        SearchDocument {
            video_id: video_id.to_string(),
            title: format!("Title {}", video_id),
            content: content.to_string(),
            similarity: 0.8,
            metadata: serde_json::Map::new(),
            search_method: SearchMethod::Original,
            rank_score: None,
        }
    }

    #[test]
    fn test_empty_documents() {
        let context = build_context(&[], DEFAULT_CONTEXT_BUDGET);
        assert_eq!(context.document_count, 0);
        assert!(context.text.is_empty());
    }

    #[test]
    fn test_includes_title_and_excerpt() {
        let context = build_context(&[doc("v1", "the chunk text")], DEFAULT_CONTEXT_BUDGET);
        assert_eq!(context.document_count, 1);
        assert!(context.text.contains("Title v1"));
        assert!(context.text.contains("the chunk text"));
        assert_eq!(context.video_ids, vec!["v1"]);
    }

    #[test]
    fn test_budget_stops_inclusion() {
        let documents = vec![doc("v1", &"a".repeat(300)), doc("v2", &"b".repeat(300))];
        let context = build_context(&documents, 450);
        assert_eq!(context.document_count, 1);
        assert_eq!(context.video_ids, vec!["v1"]);
    }

    #[test]
    fn test_first_document_always_included() {
        // even when a single block overflows the budget
        let documents = vec![doc("v1", &"a".repeat(800))];
        let context = build_context(&documents, 100);
        assert_eq!(context.document_count, 1);
    }

    #[test]
    fn test_metadata_defaults() {
        let context = build_context(&[doc("v1", "text")], DEFAULT_CONTEXT_BUDGET);
        assert!(context.text.contains("Uploaded: unknown"));
        assert!(context.text.contains("Chunk: -"));
    }
}
