//! Scalar mood from an emotion distribution.

use std::collections::BTreeMap;

/// Maps emotion intensities to a single mood in [-1, 1].
///
/// The score is the intensity-weighted mean of fixed per-emotion valences.
/// Labels are matched case-insensitively; unknown labels have valence 0 but
/// still count toward the denominator.
pub struct MoodScorer;

impl MoodScorer {
    pub fn weight(label: &str) -> f64 {
        match label.to_lowercase().as_str() {
            "joy" | "love" => 1.0,
            "gratitude" => 0.9,
            "excitement" | "hope" => 0.8,
            "optimism" => 0.7,
            "caring" => 0.6,
            "surprise" | "amusement" | "pride" => 0.5,
            "relief" => 0.4,
            "curiosity" => 0.3,
            "annoyance" => -0.3,
            "embarrassment" => -0.4,
            "remorse" | "frustration" => -0.5,
            "disappointment" | "disgust" => -0.6,
            "fear" | "stress" => -0.7,
            "anger" => -0.8,
            "sadness" | "grief" => -1.0,
            _ => 0.0,
        }
    }

    /// Weighted mood, or exactly 0.0 when no emotion has positive intensity.
    pub fn score(emotions: &BTreeMap<String, f64>) -> f64 {
        let (weighted, total) = emotions
            .iter()
            .filter(|(_, s)| **s > 0.0)
            .fold((0.0, 0.0), |(weighted, total), (label, &s)| {
                (weighted + s * Self::weight(label), total + s)
            });

        if total > 0.0 {
            (weighted / total).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}
