// src/summary/mod.rs
//! Summary generation: prompt building, model output coercion and the orchestrating pipeline.

pub mod coerce;
pub mod pipeline;
pub mod prompt;

use serde::{Deserialize, Serialize};

pub use coerce::{extract_json, extract_json_slice, ParseFailure, ParseFailureKind};
pub use pipeline::{SummaryError, SummaryOutcome, SummaryPipeline};
pub use prompt::{build_repair_prompt, build_summary_prompt, PromptPair};

/// Number of themes every valid summary carries.
pub const THEME_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub theme: String,
    /// Expected to stay under 25 words; not checked.
    pub summary: String,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
    pub evidence_quote: String,
}

/// Structured digest of recent feedback, as returned by `/summary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub date_range: String,
    pub total_items: u64,
    pub top_themes: Vec<Theme>,
}
