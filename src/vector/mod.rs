//! Vector store abstraction over per-channel transcript collections

pub mod qdrant;

pub use qdrant::QdrantStore;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Prefix every channel collection carries in the store
pub const COLLECTION_PREFIX: &str = "channel_";

/// One raw hit from the store, before conversion into a `SearchDocument`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHit {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Normalized similarity in [0,1]
    pub similarity: f32,
}

/// Similarity search over isolated per-channel collections
///
/// The core never searches across channels in one call; a collection id
/// resolves 1:1 to a channel.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Top-k similarity search of `query_text` against one collection
    async fn search(&self, collection: &str, query_text: &str, k: usize) -> Result<Vec<StoreHit>>;

    /// Whether the collection exists (channel has indexed content)
    async fn has_collection(&self, collection: &str) -> bool;

    /// All channel collections currently indexed
    async fn list_collections(&self) -> Result<Vec<String>>;
}

/// Collection name for a channel: lowercase, non-alphanumerics collapsed
/// to underscores
pub fn channel_collection(channel_name: &str) -> String {
    let slug: String = channel_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}{}", COLLECTION_PREFIX, slug.trim_matches('_'))
}
