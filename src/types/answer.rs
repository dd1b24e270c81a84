//! Answer-side data model: generation config, channel personas, responses

use serde::{Deserialize, Serialize};

/// Presentation style requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    BulletPoints,
    Structured,
    Conversational,
}

impl AnswerStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStyle::BulletPoints => "bullet_points",
            AnswerStyle::Structured => "structured",
            AnswerStyle::Conversational => "conversational",
        }
    }
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    pub style: AnswerStyle,
    pub enable_self_refine: bool,
    pub enable_react: bool,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Pick a lower temperature for factual questions, higher for analytical
    pub enable_adaptive_temperature: bool,
    pub factual_temperature: f32,
    pub analytical_temperature: f32,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            style: AnswerStyle::BulletPoints,
            enable_self_refine: true,
            enable_react: false,
            max_tokens: 650,
            temperature: 0.7,
            enable_adaptive_temperature: true,
            factual_temperature: 0.4,
            analytical_temperature: 0.65,
        }
    }
}

/// Per-channel persona, produced by channel analysis and consumed read-only
///
/// Field lengths are capped at load so a bloated prompt file cannot inflate
/// every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPrompt {
    pub channel_name: String,
    pub persona: String,
    pub tone: String,
    pub system_prompt: String,
    pub expertise_keywords: Vec<String>,
}

pub const PERSONA_MAX_CHARS: usize = 100;
pub const TONE_MAX_CHARS: usize = 50;
pub const SYSTEM_PROMPT_MAX_CHARS: usize = 200;
pub const MAX_EXPERTISE_KEYWORDS: usize = 5;

impl ChannelPrompt {
    /// Generic persona used when no channel prompt file exists
    pub fn generic(channel_name: &str) -> Self {
        Self {
            channel_name: channel_name.to_string(),
            persona: format!("{} channel analyst", channel_name),
            tone: "friendly and precise".to_string(),
            system_prompt: format!(
                "You answer questions using only the indexed video transcripts of the {} channel.",
                channel_name
            ),
            expertise_keywords: Vec::new(),
        }
    }

    /// Enforce the per-field length caps
    pub fn truncated(mut self) -> Self {
        self.persona = truncate_chars(&self.persona, PERSONA_MAX_CHARS);
        self.tone = truncate_chars(&self.tone, TONE_MAX_CHARS);
        self.system_prompt = truncate_chars(&self.system_prompt, SYSTEM_PROMPT_MAX_CHARS);
        self.expertise_keywords.truncate(MAX_EXPERTISE_KEYWORDS);
        self
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Token accounting for one answer-generation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Rough estimate at ~4 chars per token
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        let prompt_tokens = prompt.len() / 4;
        let completion_tokens = completion.len() / 4;
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Output of the answer generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub query_id: String,
    pub answer: String,
    /// Model-reported confidence in [0,1]
    pub confidence: f32,
    pub sources_used: Vec<String>,
    pub generation_time_ms: f64,
    pub self_refined: bool,
    pub react_steps: Vec<String>,
    pub token_usage: TokenUsage,
}
