//! Answer generation pipeline
//!
//! One completion call builds the structured answer from the retrieved
//! context; at most one self-refine call improves it when the model's own
//! confidence is low; an optional ReAct sufficiency check records whether
//! the retrieved set looked adequate. Completion failures never escape:
//! they become a structured zero-confidence answer.

use crate::answer::context::{build_context, DEFAULT_CONTEXT_BUDGET};
use crate::answer::extract::{extract_answer, ParsedAnswer};
use crate::answer::prompts::{render_schema_instruction, render_system_message, ChannelPromptStore};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::types::{AnswerConfig, AnswerResponse, ChannelPrompt, SearchResult, TokenUsage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Confidence above which self-refine is skipped
const REFINE_SKIP_CONFIDENCE: f32 = 0.8;
/// Retrieved sets below this average similarity trigger the ReAct check
const REACT_SIMILARITY_FLOOR: f32 = 0.4;
/// Sources reported when the answer cites none explicitly
const DEFAULT_SOURCE_COUNT: usize = 3;

const REFINE_MAX_TOKENS: u32 = 800;
const REACT_MAX_TOKENS: u32 = 100;

/// Query patterns that suggest the corpus alone may not suffice
const REACT_PATTERNS: &[&str] = &[
    "latest", "current", "right now", "today", "compare", " vs ", "versus", "predict", "forecast",
    "outlook", "recommend",
];

/// Factual-question markers for adaptive temperature
const FACTUAL_TEMP_SIGNALS: &[&str] = &[
    "when", "how much", "how many", "where", "who", "price", "cost", "date", "define",
    "definition", "meaning",
];

/// Analytical-question markers for adaptive temperature
const ANALYTICAL_TEMP_SIGNALS: &[&str] = &[
    "why", "how to", "compare", "difference", "strategy", "evaluate", "analysis", "future",
    "forecast", "recommend",
];

/// Builds structured answers from retrieved documents
pub struct AnswerGenerator {
    llm: Arc<dyn CompletionClient>,
    prompts: Arc<ChannelPromptStore>,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn CompletionClient>, prompts: Arc<ChannelPromptStore>) -> Self {
        Self { llm, prompts }
    }

    /// Generate the answer for one query; always returns a response
    pub async fn generate(
        &self,
        query: &str,
        search_result: &SearchResult,
        config: &AnswerConfig,
    ) -> AnswerResponse {
        let started = Instant::now();
        let channel_prompt = self.prompts.get(&search_result.channel_name);

        let mut react_steps = Vec::new();
        if config.enable_react && needs_sufficiency_check(query, search_result) {
            if let Some(step) = self.react_check(query, search_result, &channel_prompt).await {
                react_steps.push(step);
            }
        }

        let context = build_context(&search_result.documents, DEFAULT_CONTEXT_BUDGET);
        let system = render_system_message(&channel_prompt);
        let user = format!(
            "## Retrieved context ({} channel)\n{}\n\n## Available video ids\n{}\n\n\
             ## Question\n{}\n\n{}",
            search_result.channel_name,
            context.text,
            context.video_ids.join(", "),
            query,
            render_schema_instruction(config.style)
        );

        let temperature = answer_temperature(query, config);
        let request = CompletionRequest::new(system, user.clone())
            .with_temperature(temperature)
            .with_max_tokens(config.max_tokens);

        let initial_reply = match self.llm.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("answer generation failed: {}", e);
                return failure_response(search_result, react_steps, started, &e.to_string());
            }
        };

        let mut parsed = extract_answer(&initial_reply);
        let mut self_refined = false;
        let mut completion_text = initial_reply;

        if config.enable_self_refine && parsed.confidence <= REFINE_SKIP_CONFIDENCE {
            if let Some((refined_parsed, refined_text)) =
                self.self_refine(query, &parsed, &channel_prompt).await
            {
                parsed = refined_parsed;
                completion_text = refined_text;
                self_refined = true;
            }
        } else if parsed.confidence > REFINE_SKIP_CONFIDENCE {
            debug!("confidence {:.2} high enough, skipping self-refine", parsed.confidence);
        }

        let sources_used = attribute_sources(&parsed, search_result);
        let token_usage = TokenUsage::estimate(&user, &completion_text);

        AnswerResponse {
            query_id: search_result.query_id.clone(),
            answer: parsed.answer,
            confidence: parsed.confidence.clamp(0.0, 1.0),
            sources_used,
            generation_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            self_refined,
            react_steps,
            token_usage,
        }
    }

    /// One verification pass over the initial answer; returns the improved
    /// parse when the call succeeds
    async fn self_refine(
        &self,
        query: &str,
        initial: &ParsedAnswer,
        channel_prompt: &ChannelPrompt,
    ) -> Option<(ParsedAnswer, String)> {
        let initial_json = serde_json::json!({
            "answer": initial.answer,
            "key_points": initial.key_points,
            "sources": initial.sources,
            "confidence": initial.confidence,
            "summary": initial.summary,
        });

        let request = CompletionRequest::new(
            format!(
                "You review answer quality for the {} channel.",
                channel_prompt.channel_name
            ),
            format!(
                "Question: {}\n\nDraft answer (JSON):\n{}\n\nCheck completeness, source \
                 attribution and the confidence estimate, then return an improved JSON \
                 object of the identical shape.",
                query,
                serde_json::to_string_pretty(&initial_json).unwrap_or_default()
            ),
        )
        .with_temperature(0.5)
        .with_max_tokens(REFINE_MAX_TOKENS);

        match self.llm.complete(&request).await {
            Ok(reply) => {
                let parsed = extract_answer(&reply);
                if parsed.parsed {
                    Some((parsed, reply))
                } else {
                    debug!("self-refine reply unparseable, keeping initial answer");
                    None
                }
            }
            Err(e) => {
                warn!("self-refine failed, keeping initial answer: {}", e);
                None
            }
        }
    }

    /// Single sufficiency judgment, recorded as telemetry only
    async fn react_check(
        &self,
        query: &str,
        search_result: &SearchResult,
        channel_prompt: &ChannelPrompt,
    ) -> Option<String> {
        let preview = build_context(&search_result.documents, 500);
        let request = CompletionRequest::new(
            format!(
                "You judge whether retrieved {} channel content suffices to answer a question.",
                channel_prompt.channel_name
            ),
            format!(
                "Question: {}\n\nRetrieved content:\n{}\n\nReply with exactly \
                 \"SUFFICIENT\" or \"NEED_MORE_INFO: <missing information>\".",
                query, preview.text
            ),
        )
        .with_temperature(0.3)
        .with_max_tokens(REACT_MAX_TOKENS);

        match self.llm.complete(&request).await {
            Ok(reply) => Some(reply.trim().to_string()),
            Err(e) => {
                warn!("react check failed: {}", e);
                None
            }
        }
    }
}

/// Whether the ReAct sufficiency check is worth a call
fn needs_sufficiency_check(query: &str, search_result: &SearchResult) -> bool {
    if search_result.documents.len() < 2 {
        return true;
    }
    if search_result.average_similarity() < REACT_SIMILARITY_FLOOR {
        return true;
    }
    let lower = query.to_lowercase();
    REACT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Adaptive temperature: factual questions answered colder than
/// analytical ones
fn answer_temperature(query: &str, config: &AnswerConfig) -> f32 {
    if !config.enable_adaptive_temperature {
        return config.temperature;
    }

    let lower = query.to_lowercase();
    let factual = FACTUAL_TEMP_SIGNALS.iter().filter(|s| lower.contains(*s)).count();
    let analytical = ANALYTICAL_TEMP_SIGNALS.iter().filter(|s| lower.contains(*s)).count();

    if factual > analytical {
        config.factual_temperature
    } else if analytical > 0 {
        config.analytical_temperature
    } else {
        config.temperature
    }
}

/// Which retrieved videos the answer actually references; defaults to the
/// top retrieved ids when none are cited
fn attribute_sources(parsed: &ParsedAnswer, search_result: &SearchResult) -> Vec<String> {
    let haystack = format!("{} {}", parsed.answer, parsed.key_points.join(" "));

    let mut sources: Vec<String> = search_result
        .documents
        .iter()
        .filter(|d| haystack.contains(&d.video_id))
        .map(|d| d.video_id.clone())
        .collect();

    // explicit sources from the JSON that match retrieved documents
    for source in &parsed.sources {
        if search_result.documents.iter().any(|d| &d.video_id == source)
            && !sources.contains(source)
        {
            sources.push(source.clone());
        }
    }

    if sources.is_empty() {
        sources = search_result
            .documents
            .iter()
            .take(DEFAULT_SOURCE_COUNT)
            .map(|d| d.video_id.clone())
            .collect();
    }
    sources
}

/// Structured zero-confidence response for completion failures
fn failure_response(
    search_result: &SearchResult,
    react_steps: Vec<String>,
    started: Instant,
    error: &str,
) -> AnswerResponse {
    AnswerResponse {
        query_id: search_result.query_id.clone(),
        answer: format!("Answer generation is unavailable right now ({}).", error),
        confidence: 0.0,
        sources_used: Vec::new(),
        generation_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        self_refined: false,
        react_steps,
        token_usage: TokenUsage::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RagError, Result};
    use crate::types::{SearchDocument, SearchMethod};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedLlm {
        replies: Vec<String>,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for ScriptedLlm {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RagError::CompletionApi("down".to_string()));
            }
            Ok(self
                .replies
                .get(call.min(self.replies.len().saturating_sub(1)))
                .cloned()
                .unwrap_or_default())
        }

        async fn health_check(&self) -> bool {
            !self.fail
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn generator(replies: Vec<&str>, fail: bool) -> (AnswerGenerator, Arc<ScriptedLlm>) {
        let llm = Arc::new(ScriptedLlm {
            replies: replies.into_iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
            fail,
        });
        let generator = AnswerGenerator::new(
            llm.clone() as Arc<dyn CompletionClient>,
            Arc::new(ChannelPromptStore::new(None)),
        );
        (generator, llm)
    }

    fn doc(video_id: &str, similarity: f32) -> SearchDocument {
        SearchDocument {
            video_id: video_id.to_string(),
            title: format!("Title {}", video_id),
            content: "transcript text".to_string(),
            similarity,
            metadata: serde_json::Map::new(),
            search_method: SearchMethod::Original,
            rank_score: None,
        }
    }

    fn result_with(documents: Vec<SearchDocument>) -> SearchResult {
        SearchResult {
            query_id: "q1".to_string(),
            channel_name: "demo".to_string(),
            documents,
            total_found: 0,
            search_time_ms: 0.0,
            hyde_used: false,
            fusion_used: false,
            rewrite_used: false,
            rerank_used: false,
        }
    }

    #[tokio::test]
    async fn test_high_confidence_skips_refine() {
        let reply = r#"{"answer": "cited [v1]", "key_points": [], "sources": ["v1"], "confidence": 0.9, "summary": "s"}"#;
        let (generator, llm) = generator(vec![reply], false);
        let result = result_with(vec![doc("v1", 0.9), doc("v2", 0.8)]);
        let config = AnswerConfig::default();

        let answer = generator.generate("when was it built", &result, &config).await;
        assert_eq!(answer.confidence, 0.9);
        assert!(!answer.self_refined);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(answer.sources_used, vec!["v1"]);
    }

    #[tokio::test]
    async fn test_low_confidence_triggers_refine() {
        let initial = r#"{"answer": "draft", "confidence": 0.5}"#;
        let refined = r#"{"answer": "better", "confidence": 0.75, "sources": ["v1"]}"#;
        let (generator, llm) = generator(vec![initial, refined], false);
        let result = result_with(vec![doc("v1", 0.9), doc("v2", 0.8)]);
        let config = AnswerConfig::default();

        let answer = generator.generate("when was it built", &result, &config).await;
        assert!(answer.self_refined);
        assert_eq!(answer.answer, "better");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refine_failure_keeps_initial() {
        let initial = r#"{"answer": "draft", "confidence": 0.5}"#;
        let unparseable = "no json here";
        let (generator, _llm) = generator(vec![initial, unparseable], false);
        let result = result_with(vec![doc("v1", 0.9), doc("v2", 0.8)]);
        let config = AnswerConfig::default();

        let answer = generator.generate("when was it built", &result, &config).await;
        assert!(!answer.self_refined);
        assert_eq!(answer.answer, "draft");
    }

    #[tokio::test]
    async fn test_completion_failure_returns_zero_confidence() {
        let (generator, _llm) = generator(vec![], true);
        let result = result_with(vec![doc("v1", 0.9)]);
        let config = AnswerConfig::default();

        let answer = generator.generate("anything", &result, &config).await;
        assert_eq!(answer.confidence, 0.0);
        assert!(answer.answer.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_uncited_answer_defaults_to_top_sources() {
        let reply = r#"{"answer": "no ids mentioned", "confidence": 0.85}"#;
        let (generator, _llm) = generator(vec![reply], false);
        let result = result_with(vec![
            doc("v1", 0.9),
            doc("v2", 0.8),
            doc("v3", 0.7),
            doc("v4", 0.6),
        ]);
        let config = AnswerConfig::default();

        let answer = generator.generate("when was it built", &result, &config).await;
        assert_eq!(answer.sources_used, vec!["v1", "v2", "v3"]);
    }

    #[tokio::test]
    async fn test_react_check_on_sparse_results() {
        let react = "NEED_MORE_INFO: recent market data";
        let reply = r#"{"answer": "x", "confidence": 0.85}"#;
        let (generator, llm) = generator(vec![react, reply], false);
        let result = result_with(vec![doc("v1", 0.9)]); // fewer than 2 docs
        let mut config = AnswerConfig::default();
        config.enable_react = true;

        let answer = generator.generate("when was it built", &result, &config).await;
        assert_eq!(answer.react_steps, vec!["NEED_MORE_INFO: recent market data"]);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sufficiency_check_conditions() {
        let sparse = result_with(vec![doc("v1", 0.9)]);
        assert!(needs_sufficiency_check("anything", &sparse));

        let weak = result_with(vec![doc("v1", 0.2), doc("v2", 0.3)]);
        assert!(needs_sufficiency_check("anything", &weak));

        let strong = result_with(vec![doc("v1", 0.9), doc("v2", 0.8)]);
        assert!(!needs_sufficiency_check("how big is the unit", &strong));
        assert!(needs_sufficiency_check("latest prices please", &strong));
    }

    #[test]
    fn test_adaptive_temperature() {
        let config = AnswerConfig::default();
        assert_eq!(answer_temperature("when was it built", &config), config.factual_temperature);
        assert_eq!(
            answer_temperature("why do yields compress", &config),
            config.analytical_temperature
        );
        assert_eq!(answer_temperature("tokyo studio flats", &config), config.temperature);

        let mut fixed = AnswerConfig::default();
        fixed.enable_adaptive_temperature = false;
        assert_eq!(answer_temperature("when was it built", &fixed), fixed.temperature);
    }
}
