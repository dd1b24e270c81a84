//! Qdrant-backed vector store adapter
//!
//! Each channel maps to one cosine-space collection named
//! `channel_<slug>`. Query text is embedded through the embeddings
//! endpoint, then searched against the channel collection; the ingestion
//! path (external to this crate) writes one point per transcript chunk
//! with `video_id`, `title`, `channel`, `upload`, `duration` and
//! `chunk_index` payload fields.

use crate::errors::{RagError, Result};
use crate::llm::EmbeddingClient;
use crate::vector::{StoreHit, VectorStore};
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{with_payload_selector::SelectorOptions, SearchPoints, WithPayloadSelector},
};
use serde_json::Value as JsonValue;

/// Vector store adapter over a Qdrant endpoint
pub struct QdrantStore {
    client: QdrantClient,
    embedder: EmbeddingClient,
}

impl QdrantStore {
    pub fn new(url: &str, embedder: EmbeddingClient) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| RagError::VectorStore(format!("failed to connect: {}", e)))?;

        Ok(Self { client, embedder })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(&self, collection: &str, query_text: &str, k: usize) -> Result<Vec<StoreHit>> {
        let vector = self.embedder.embed(query_text).await?;

        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: collection.to_string(),
                vector,
                limit: k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::VectorStore(format!("search failed: {}", e)))?;

        let hits = search_result
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let content = payload
                    .get("document")
                    .and_then(qdrant_value_to_string)
                    .unwrap_or_default();

                let mut metadata = serde_json::Map::new();
                for (key, value) in payload {
                    if key != "document" {
                        if let Some(json_val) = qdrant_to_json_value(&value) {
                            metadata.insert(key, json_val);
                        }
                    }
                }

                StoreHit {
                    id: point_id_to_string(&point.id),
                    content,
                    metadata,
                    // cosine collections report a similarity-shaped score
                    similarity: point.score.clamp(0.0, 1.0),
                }
            })
            .collect();

        Ok(hits)
    }

    async fn has_collection(&self, collection: &str) -> bool {
        match self.client.collection_info(collection).await {
            Ok(info) => info.result.is_some(),
            Err(_) => false,
        }
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| RagError::VectorStore(format!("failed to list collections: {}", e)))?;

        Ok(collections
            .collections
            .into_iter()
            .map(|c| c.name)
            .filter(|name| name.starts_with(crate::vector::COLLECTION_PREFIX))
            .collect())
    }
}

fn qdrant_to_json_value(value: &qdrant_client::qdrant::Value) -> Option<JsonValue> {
    use qdrant_client::qdrant::value::Kind;
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        _ => None,
    })
}

fn qdrant_value_to_string(value: &qdrant_client::qdrant::Value) -> Option<String> {
    use qdrant_client::qdrant::value::Kind;
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    })
}

fn point_id_to_string(point_id: &Option<qdrant_client::qdrant::PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    point_id
        .as_ref()
        .map(|id| match &id.point_id_options {
            Some(PointIdOptions::Num(n)) => n.to_string(),
            Some(PointIdOptions::Uuid(u)) => u.clone(),
            None => "unknown".to_string(),
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::DEFAULT_BASE_URL;

    fn test_store() -> QdrantStore {
        let embedder = EmbeddingClient::new(DEFAULT_BASE_URL, "nomic-embed-text").unwrap();
        QdrantStore::new("http://localhost:6334", embedder).unwrap()
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant and Ollama
    async fn test_list_collections_integration() {
        let store = test_store();
        let collections = store.list_collections().await.unwrap();
        assert!(collections.iter().all(|c| c.starts_with("channel_")));
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant
    async fn test_missing_collection() {
        let store = test_store();
        assert!(!store.has_collection("channel_does_not_exist").await);
    }
}
