//! Lexical query classification and pipeline-mode selection
//!
//! Pure functions over fixed rule tables. Classification drives both the
//! choice of retrieval strategies and answer-configuration tuning.

use crate::types::{PipelineMode, QueryType};

/// Five complexity signal classes; each contributes at most one point
const COMPARISON_SIGNALS: &[&str] = &[
    "compare",
    "comparison",
    "versus",
    " vs ",
    "difference",
    "pros and cons",
    "analyze",
    "analysis",
    "evaluate",
    "which is better",
];

const CAUSAL_SIGNALS: &[&str] = &["why", "reason", "cause", "because of", "what led to"];

const PROCEDURAL_SIGNALS: &[&str] = &[
    "how to", "strategy", "method", "process", "steps", "approach", "plan for",
];

const FORECAST_SIGNALS: &[&str] = &["future", "forecast", "predict", "outlook", "expect", "trend"];

const SUPERLATIVE_SIGNALS: &[&str] = &["best", "most", "top", "highest", "cheapest", "worst"];

/// Markers that flag a fact-lookup question
const FACTUAL_MARKERS: &[&str] = &["when", "how much", "how many"];

/// Keywords that force the comprehensive pipeline regardless of type
const COMPREHENSIVE_KEYWORDS: &[&str] = &[
    "compare", "versus", " vs ", "strategy", "forecast", "predict", "outlook", "difference",
];

/// Patterns that force fast mode (quick definition lookups)
const FAST_PATTERNS: &[&str] = &["what is ", "what's ", "define ", "definition of", "meaning of", "quick"];

fn class_score(query: &str) -> u32 {
    let classes: [&[&str]; 5] = [
        COMPARISON_SIGNALS,
        CAUSAL_SIGNALS,
        PROCEDURAL_SIGNALS,
        FORECAST_SIGNALS,
        SUPERLATIVE_SIGNALS,
    ];

    classes
        .iter()
        .filter(|signals| signals.iter().any(|s| query.contains(s)))
        .count() as u32
}

fn question_marks(query: &str) -> usize {
    query.matches('?').count()
}

/// Classify a query's complexity from lexical features
///
/// Score = matched signal classes, +1 if longer than 50 chars, +1 if it
/// holds more than one question mark. Rules are evaluated in priority
/// order: complex, factual, analytical, simple.
pub fn classify_query(query: &str) -> QueryType {
    let query = query.to_lowercase();

    let mut score = class_score(&query);
    if query.len() > 50 {
        score += 1;
    }
    if question_marks(&query) > 1 {
        score += 1;
    }

    if score >= 2 {
        QueryType::Complex
    } else if FACTUAL_MARKERS.iter().any(|m| query.contains(m)) {
        QueryType::Factual
    } else if score == 1 {
        QueryType::Analytical
    } else {
        QueryType::Simple
    }
}

/// Map a classified query to the strategies worth running
///
/// Lightweight bounds the LLM call count for trivial lookups; the extra
/// comprehensive calls are spent only where multi-faceted intent is
/// likely.
pub fn select_pipeline_mode(query: &str, query_type: QueryType) -> PipelineMode {
    let lower = query.to_lowercase();

    if query_type == QueryType::Complex
        || COMPREHENSIVE_KEYWORDS.iter().any(|k| lower.contains(k))
        || query.len() > 60
        || question_marks(query) > 1
    {
        return PipelineMode::Comprehensive;
    }

    let lightweight_marker =
        lower.contains("what") || lower.contains("when") || lower.contains("how much");
    if matches!(query_type, QueryType::Simple | QueryType::Factual)
        && query.len() <= 30
        && lightweight_marker
    {
        return PipelineMode::Lightweight;
    }

    PipelineMode::Standard
}

/// Whether a query should force fast mode: very short, or a quick
/// definition lookup
pub fn is_fast_query(query: &str) -> bool {
    if query.len() < 10 {
        return true;
    }
    let lower = query.to_lowercase();
    FAST_PATTERNS.iter().any(|p| lower.contains(p))
}
