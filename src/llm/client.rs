//! HTTP clients for chat completion and text embedding
//!
//! Talks to an Ollama-compatible server:
//! - POST /api/chat for single-turn system+user completions (non-streaming)
//! - POST /api/embeddings for query embeddings

use crate::errors::{RagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Request timeout for completion calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One single-turn completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.7,
            max_tokens: 256,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Flattened prompt text used for cache keying
    pub fn prompt_text(&self) -> String {
        format!("SYSTEM: {}\nUSER: {}", self.system, self.user)
    }
}

/// Single-turn chat/completion interface
///
/// The pipeline only ever needs a system + user message pair and a text
/// reply; streaming is deliberately out of scope.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Whether the backing endpoint is reachable
    async fn health_check(&self) -> bool;

    /// Model identifier, used for cache keying
    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

/// Chat client for the Ollama API
#[derive(Debug, Clone)]
pub struct OllamaChatClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaChatClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionClient for OllamaChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.user.clone(),
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::CompletionApi(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RagError::CompletionApi(format!("HTTP {}: {}", status, text)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::CompletionApi(format!("unparseable response: {}", e)))?;

        Ok(chat.message.content.trim().to_string())
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding client used by the vector store adapter to turn query text
/// into a search vector
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let body = EmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::VectorStore(format!("embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::VectorStore(format!(
                "embedding endpoint returned HTTP {}",
                response.status()
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::VectorStore(format!("unparseable embedding: {}", e)))?;

        Ok(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OllamaChatClient::new(DEFAULT_BASE_URL, "qwen2.5:7b-instruct").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:11434");
        assert_eq!(client.model(), "qwen2.5:7b-instruct");
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let client = OllamaChatClient::new("http://localhost:11434/", "m").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("sys", "user")
            .with_temperature(0.1)
            .with_max_tokens(8);
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.max_tokens, 8);
        assert!(request.prompt_text().contains("SYSTEM: sys"));
        assert!(request.prompt_text().contains("USER: user"));
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Ollama running
    async fn test_complete_integration() {
        let client = OllamaChatClient::new(DEFAULT_BASE_URL, "qwen2.5:7b-instruct").unwrap();
        let request = CompletionRequest::new("You are terse.", "Say hi.").with_max_tokens(8);
        let reply = client.complete(&request).await.unwrap();
        assert!(!reply.is_empty());
    }
}
