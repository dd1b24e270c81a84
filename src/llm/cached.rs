//! Cache-fronted completion client
//!
//! Wraps any `CompletionClient` with the semantic cache. HyDE, rewrite,
//! fusion-query and answer calls go through this wrapper; re-rank scoring
//! calls use the raw client directly because their prompts embed
//! candidate-position context that defeats content addressing.

use crate::cache::SemanticCache;
use crate::errors::Result;
use crate::llm::client::{CompletionClient, CompletionRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Completion client that consults the semantic cache before calling the
/// wrapped client, and stores successful replies afterwards
pub struct CachedCompletionClient {
    inner: Arc<dyn CompletionClient>,
    cache: Option<Arc<SemanticCache>>,
}

impl CachedCompletionClient {
    pub fn new(inner: Arc<dyn CompletionClient>, cache: Option<Arc<SemanticCache>>) -> Self {
        Self { inner, cache }
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }
}

#[async_trait]
impl CompletionClient for CachedCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let Some(cache) = &self.cache else {
            return self.inner.complete(request).await;
        };

        let model = self.inner.model();
        let prompt = request.prompt_text();

        if let Some(payload) = cache.get(model, request.temperature, &prompt, &request.user) {
            debug!("cache hit for completion call");
            return Ok(payload);
        }

        let reply = self.inner.complete(request).await?;
        cache.set(
            model,
            request.temperature,
            &prompt,
            &reply,
            &request.user,
            None,
        );
        Ok(reply)
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
