//! Core domain types for mindmirror
//!
//! Wire names are camelCase so records can be handed to the journaling
//! application as-is.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Entry** | One journal text written by a user |
//! | **DailyMetric** | Per-day aggregate of a user's entries (mood, volume) |
//! | **Anomaly** | A day whose mood or volume departs from the user's own baseline |
//! | **Theme** | A cluster of semantically similar entries, labelled by keywords |
//! | **Milestone** | A user goal with tasks, scored for progress by the generative service |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================
// Journal analysis
// ============================================

/// Structured insights for one journal entry.
///
/// Built only by the analysis assembler; the mood score is derived from the
/// emotions and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    mood_score: f64,
    emotions: BTreeMap<String, f64>,
    core_concerns: Vec<String>,
    summary: String,
    growth_tips: Vec<String>,
    key_phrases: Vec<String>,
}

impl AnalysisRecord {
    pub(crate) fn new(
        emotions: BTreeMap<String, f64>,
        core_concerns: Vec<String>,
        summary: String,
        growth_tips: Vec<String>,
        key_phrases: Vec<String>,
    ) -> Self {
        let mood_score = crate::analysis::MoodScorer::score(&emotions);
        Self {
            mood_score,
            emotions,
            core_concerns,
            summary,
            growth_tips,
            key_phrases,
        }
    }

    pub fn mood_score(&self) -> f64 {
        self.mood_score
    }

    /// Emotion label to normalized intensity
    pub fn emotions(&self) -> &BTreeMap<String, f64> {
        &self.emotions
    }

    pub fn core_concerns(&self) -> &[String] {
        &self.core_concerns
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn growth_tips(&self) -> &[String] {
        &self.growth_tips
    }

    pub fn key_phrases(&self) -> &[String] {
        &self.key_phrases
    }
}

// ============================================
// Daily metrics & anomalies
// ============================================

/// One day of aggregated journaling activity.
///
/// Numeric fields accept numbers or numeric strings; anything else is
/// treated as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetric {
    #[serde(deserialize_with = "lenient::date")]
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "lenient::number")]
    pub average_mood: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total_words: Option<f64>,
}

/// Which metric made a day unusual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Mood,
    Words,
}

/// A flagged day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub date: NaiveDate,
    /// Never empty
    #[serde(rename = "type")]
    pub kinds: Vec<AnomalyKind>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    pub message: String,
}

/// A single journal entry, as fed to daily aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntrySample {
    #[serde(deserialize_with = "lenient::date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub mood_score: Option<f64>,
}

// ============================================
// Clustering
// ============================================

/// Result of a clustering request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReport {
    pub num_clusters: usize,
    /// "Theme N" to keyword label
    pub cluster_themes: BTreeMap<String, String>,
    /// Cluster id per input text, in input order
    pub entry_clusters: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================
// Milestones
// ============================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneTask {
    pub description: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
}

/// A goal submitted for progress insights.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub completion_percentage: Option<f64>,
    #[serde(default)]
    pub tasks: Vec<MilestoneTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneInsights {
    pub remaining_work: String,
    pub performance_assessment: String,
    pub tips: Vec<String>,
    pub encouragement: String,
    pub suggested_new_tasks: Vec<String>,
    /// `SUCCESS`, `PARTIAL` or `ERROR`
    pub status: String,
}

mod lenient {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// `YYYY-MM-DD`, or a timestamp whose calendar day is used.
    pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(date);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.date_naive());
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(ts.date());
        }
        Err(D::Error::custom(format!("unrecognized date: {raw}")))
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(super::coerce_f64))
    }
}

/// Numbers and numeric strings become finite floats; everything else is `None`.
pub(crate) fn coerce_f64(value: &serde_json::Value) -> Option<f64> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}
