//! Journal entry analysis through the generative service.
//!
//! The assembler makes one structured request per entry and normalizes
//! whatever comes back into an [`AnalysisRecord`]. Remote failures never
//! escape: a failed call produces the fallback record.

mod milestone;
mod mood;

pub use milestone::{fallback_insights, MilestoneInsightsAssembler};
pub use mood::MoodScorer;

use crate::format::truncate_with_ellipsis;
use crate::llm::ResilientApiInvoker;
use crate::types::{coerce_f64, AnalysisRecord};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Growth tip used when the service gives none.
pub const DEFAULT_GROWTH_TIP: &str =
    "Keep reflecting on your thoughts and feelings. You're doing great by journaling!";

const SUMMARY_FALLBACK_CHARS: usize = 150;

/// Emotion sums within this distance of 1.0 are left as-is.
const NORMALIZE_TOLERANCE: f64 = 0.01;

const ANALYSIS_PROMPT: &str = r#"You are helping someone understand their own journal.
Read the entry below and respond with a single JSON object with exactly these keys:

- "emotions": object mapping emotion labels (for example joy, sadness, anger, fear, surprise,
  disgust, love, anxiety, relief, neutral, excitement, contentment, frustration, gratitude, hope)
  to intensities between 0.0 and 1.0 that sum to 1.0
- "coreConcerns": array of short category strings (for example "work", "relationships",
  "health", "financial", "personal growth", "stress/anxiety")
- "summary": one to three sentences capturing the main points and overall sentiment
- "growthTips": array of 3-5 concise, empathetic, actionable tips
- "keyPhrases": array of 5-10 concise key phrases taken from the entry

Return only the JSON object.

Journal entry:
"#;

pub struct JournalAnalysisAssembler {
    invoker: Arc<ResilientApiInvoker>,
}

impl JournalAnalysisAssembler {
    pub fn new(invoker: Arc<ResilientApiInvoker>) -> Self {
        Self { invoker }
    }

    /// Analyze one non-empty journal text.
    pub fn analyze(&self, text: &str) -> AnalysisRecord {
        let prompt = format!("{ANALYSIS_PROMPT}\"\"\"\n{text}\n\"\"\"");

        match self.invoker.invoke_structured(&prompt) {
            Some(reply) => assemble(text, &reply),
            None => {
                tracing::warn!(
                    text_chars = text.chars().count(),
                    "Journal analysis unavailable, returning fallback record"
                );
                fallback_record(text)
            }
        }
    }
}

/// Freeform reflection for an arbitrary prompt.
pub fn generate_reflection(invoker: &ResilientApiInvoker, prompt: &str) -> Option<String> {
    if prompt.trim().is_empty() {
        tracing::warn!("Empty reflection prompt");
        return None;
    }
    invoker.invoke_freeform(prompt)
}

/// Record returned when the service produced nothing usable.
pub fn fallback_record(text: &str) -> AnalysisRecord {
    AnalysisRecord::new(
        BTreeMap::new(),
        Vec::new(),
        truncate_with_ellipsis(text, SUMMARY_FALLBACK_CHARS),
        vec![DEFAULT_GROWTH_TIP.to_string()],
        Vec::new(),
    )
}

fn assemble(text: &str, reply: &Value) -> AnalysisRecord {
    if !reply.is_object() {
        tracing::warn!(kind = json_kind(reply), "Analysis reply is not an object");
    }

    let summary = match reply.get("summary") {
        Some(Value::String(s)) => s.clone(),
        other => {
            tracing::warn!(
                kind = other.map(json_kind).unwrap_or("missing"),
                "Analysis summary is not a string, using truncated text"
            );
            truncate_with_ellipsis(text, SUMMARY_FALLBACK_CHARS)
        }
    };

    AnalysisRecord::new(
        normalize_emotions(reply.get("emotions")),
        string_list(reply.get("coreConcerns"), "coreConcerns"),
        summary,
        string_list(reply.get("growthTips"), "growthTips"),
        string_list(reply.get("keyPhrases"), "keyPhrases"),
    )
}

/// Coerce emotion scores to non-negative floats and rescale to sum 1.0.
///
/// Scores that are not numbers (or numeric strings) become 0.0 and keep
/// their label.
pub fn normalize_emotions(value: Option<&Value>) -> BTreeMap<String, f64> {
    let Some(map) = value.and_then(Value::as_object) else {
        if let Some(other) = value {
            tracing::warn!(kind = json_kind(other), "Emotions are not an object, ignoring");
        }
        return BTreeMap::new();
    };

    let mut emotions: BTreeMap<String, f64> = map
        .iter()
        .map(|(label, raw)| {
            let score = match coerce_f64(raw) {
                Some(s) if s >= 0.0 => s,
                Some(s) => {
                    tracing::warn!(emotion = %label, score = s, "Negative emotion score, clamping to 0");
                    0.0
                }
                None => {
                    tracing::warn!(emotion = %label, raw = %raw, "Invalid emotion score, using 0");
                    0.0
                }
            };
            (label.clone(), score)
        })
        .collect();

    let total: f64 = emotions.values().sum();
    if total > 0.0 && (total - 1.0).abs() > NORMALIZE_TOLERANCE {
        tracing::info!(sum = total, "Normalizing emotion scores");
        for score in emotions.values_mut() {
            *score /= total;
        }
    }
    emotions
}

/// Array of strings from a loosely typed field.
///
/// Non-arrays become empty; scalar elements are rendered as text and
/// nested values are dropped.
pub fn string_list(value: Option<&Value>, field: &str) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                other => {
                    tracing::debug!(field, kind = json_kind(other), "Dropping non-scalar list item");
                    None
                }
            })
            .collect(),
        Some(other) => {
            tracing::warn!(field, kind = json_kind(other), "Expected a list, using empty");
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
