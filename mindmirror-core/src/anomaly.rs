//! Unusual-day detection over daily journaling metrics.
//!
//! Each metric (mood, word volume) keeps an exponentially weighted mean and
//! variance, seeded from its first observation and updated incrementally:
//!
//! ```text
//! diff  = x - mean
//! incr  = α · diff
//! mean += incr
//! var   = (1 - α) · (var + diff · incr)
//! ```
//!
//! with `α = 2 / (span + 1)`. A day is scored against the state built from
//! the days before it, so an outlier cannot dilute its own baseline. A
//! single observation has no spread to compare against, so testing starts
//! once a metric has two prior values.

use crate::config::AnomalyConfig;
use crate::types::{Anomaly, AnomalyKind, AnomalyReport, DailyMetric, JournalEntrySample};
use chrono::NaiveDate;
use std::collections::BTreeMap;

const EPSILON: f64 = 1e-9;

/// Prior observations needed before a metric is tested at all.
const MIN_HISTORY: usize = 2;

const MSG_EMPTY: &str = "No daily data provided for anomaly detection.";
const MSG_NONE_FOUND: &str = "No significant anomalies detected in your recent journaling patterns.";

/// Streaming exponentially weighted mean and variance.
#[derive(Debug, Clone, Copy)]
struct Ewm {
    mean: f64,
    var: f64,
    count: usize,
}

impl Ewm {
    fn seed(x: f64) -> Self {
        Self {
            mean: x,
            var: 0.0,
            count: 1,
        }
    }

    fn update(&mut self, x: f64, alpha: f64) {
        self.count += 1;
        let diff = x - self.mean;
        let incr = alpha * diff;
        self.mean += incr;
        self.var = (1.0 - alpha) * (self.var + diff * incr);
    }

    fn std(&self) -> f64 {
        self.var.max(0.0).sqrt()
    }
}

/// Deviation of one observation from its baseline.
#[derive(Debug, Clone, Copy)]
struct Deviation {
    value: f64,
    mean: f64,
    /// `None` when the baseline has no spread
    z: Option<f64>,
}

impl Deviation {
    fn is_above(&self) -> bool {
        self.value > self.mean
    }
}

/// Score `x` against `baseline`, returning the deviation when it is unusual.
fn test_against(baseline: &Ewm, x: f64, threshold: f64) -> Option<Deviation> {
    let std = baseline.std();
    if std > EPSILON {
        let z = (x - baseline.mean) / std;
        (z.abs() > threshold).then_some(Deviation {
            value: x,
            mean: baseline.mean,
            z: Some(z),
        })
    } else if (x - baseline.mean).abs() > EPSILON {
        // A flat baseline makes any change notable.
        Some(Deviation {
            value: x,
            mean: baseline.mean,
            z: None,
        })
    } else {
        None
    }
}

/// Flags days whose mood or writing volume departs from the user's baseline.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    alpha: f64,
    mood_threshold: f64,
    words_threshold: f64,
    min_days: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(&AnomalyConfig::default())
    }
}

impl AnomalyDetector {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            alpha: config.alpha(),
            mood_threshold: config.mood_threshold,
            words_threshold: config.words_threshold,
            min_days: config.min_days,
        }
    }

    /// Scan `metrics` (any order) for unusual days.
    pub fn detect(&self, metrics: &[DailyMetric]) -> AnomalyReport {
        if metrics.is_empty() {
            return AnomalyReport {
                anomalies: Vec::new(),
                message: MSG_EMPTY.to_string(),
            };
        }
        if metrics.len() < self.min_days {
            tracing::info!(days = metrics.len(), min_days = self.min_days, "Too few days for anomaly detection");
            return AnomalyReport {
                anomalies: Vec::new(),
                message: format!(
                    "Not enough data for anomaly detection (need at least {} days).",
                    self.min_days
                ),
            };
        }

        let mut days: Vec<&DailyMetric> = metrics.iter().collect();
        days.sort_by_key(|m| m.date);

        let mut mood: Option<Ewm> = None;
        let mut words: Option<Ewm> = None;
        let mut anomalies = Vec::new();

        for day in days {
            let mood_dev = self.step(&mut mood, day.average_mood, self.mood_threshold);
            let words_dev = self.step(&mut words, day.total_words, self.words_threshold);

            if let Some(anomaly) = describe(day.date, mood_dev, words_dev) {
                tracing::info!(date = %anomaly.date, message = %anomaly.message, "Anomaly detected");
                anomalies.push(anomaly);
            }
        }

        let message = if anomalies.is_empty() {
            MSG_NONE_FOUND.to_string()
        } else {
            format!("Detected {} unusual journaling patterns.", anomalies.len())
        };
        AnomalyReport { anomalies, message }
    }

    /// Test `value` against the prior state, then fold it in.
    fn step(&self, state: &mut Option<Ewm>, value: Option<f64>, threshold: f64) -> Option<Deviation> {
        let x = value.filter(|v| v.is_finite())?;
        match state {
            None => {
                *state = Some(Ewm::seed(x));
                None
            }
            Some(baseline) if baseline.count < MIN_HISTORY => {
                baseline.update(x, self.alpha);
                None
            }
            Some(baseline) => {
                let deviation = test_against(baseline, x, threshold);
                tracing::debug!(
                    value = x,
                    mean = baseline.mean,
                    std = baseline.std(),
                    flagged = deviation.is_some(),
                    "Scored metric"
                );
                baseline.update(x, self.alpha);
                deviation
            }
        }
    }
}

fn describe(date: NaiveDate, mood: Option<Deviation>, words: Option<Deviation>) -> Option<Anomaly> {
    let mut kinds = Vec::new();
    let mut parts = Vec::new();

    if let Some(dev) = mood {
        kinds.push(AnomalyKind::Mood);
        let direction = if dev.is_above() { "higher" } else { "lower" };
        parts.push(format!(
            "Your average mood was significantly {direction} than usual ({:.2} vs. a typical {:.2}{}).",
            dev.value,
            dev.mean,
            z_note(dev.z)
        ));
    }
    if let Some(dev) = words {
        kinds.push(AnomalyKind::Words);
        let direction = if dev.is_above() { "more" } else { "less" };
        parts.push(format!(
            "You wrote much {direction} than usual ({:.0} vs. a typical {:.0}{}).",
            dev.value,
            dev.mean,
            z_note(dev.z)
        ));
    }

    (!kinds.is_empty()).then(|| Anomaly {
        date,
        kinds,
        message: parts.join(" "),
    })
}

fn z_note(z: Option<f64>) -> String {
    match z {
        Some(z) => format!(", {:.1} standard deviations", z.abs()),
        None => ", after a steady stretch".to_string(),
    }
}

/// Collapse entries into one metric per calendar day, ordered by date.
///
/// Mood is the mean of the entries that carry a score; volume is the total
/// character count of the day's texts.
pub fn aggregate_daily(entries: &[JournalEntrySample]) -> Vec<DailyMetric> {
    #[derive(Default)]
    struct Acc {
        mood_sum: f64,
        mood_count: usize,
        chars: usize,
    }

    let mut by_day: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
    for entry in entries {
        let acc = by_day.entry(entry.date).or_default();
        if let Some(mood) = entry.mood_score.filter(|m| m.is_finite()) {
            acc.mood_sum += mood;
            acc.mood_count += 1;
        }
        acc.chars += entry.text.chars().count();
    }

    by_day
        .into_iter()
        .map(|(date, acc)| DailyMetric {
            date,
            average_mood: (acc.mood_count > 0).then(|| acc.mood_sum / acc.mood_count as f64),
            total_words: Some(acc.chars as f64),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    fn metric(n: u32, mood: Option<f64>, words: Option<f64>) -> DailyMetric {
        DailyMetric {
            date: day(n),
            average_mood: mood,
            total_words: words,
        }
    }

    #[test]
    fn empty_input_has_message() {
        let report = AnomalyDetector::default().detect(&[]);
        assert!(report.anomalies.is_empty());
        assert_eq!(report.message, MSG_EMPTY);
    }

    #[test]
    fn too_few_days_is_insufficient() {
        let metrics: Vec<_> = (1..=6).map(|n| metric(n, Some(0.5), Some(100.0))).collect();
        let report = AnomalyDetector::default().detect(&metrics);
        assert!(report.anomalies.is_empty());
        assert!(report.message.contains("Not enough data"));
    }

    #[test]
    fn mood_jump_after_flat_week_is_flagged() {
        let mut metrics: Vec<_> = (1..=6).map(|n| metric(n, Some(0.5), Some(200.0))).collect();
        metrics.push(metric(7, Some(0.9), Some(200.0)));

        let report = AnomalyDetector::default().detect(&metrics);
        assert_eq!(report.anomalies.len(), 1);
        let anomaly = &report.anomalies[0];
        assert_eq!(anomaly.date, day(7));
        assert_eq!(anomaly.kinds, vec![AnomalyKind::Mood]);
        assert!(anomaly.message.contains("higher"));
        assert_eq!(report.message, "Detected 1 unusual journaling patterns.");
    }

    #[test]
    fn second_observation_is_never_flagged() {
        let words = [100.0, 104.0, 98.0, 102.0, 101.0, 99.0, 103.0, 100.0];
        let metrics: Vec<_> = words
            .iter()
            .enumerate()
            .map(|(i, &w)| metric(i as u32 + 1, Some(0.3), Some(w)))
            .collect();

        let report = AnomalyDetector::default().detect(&metrics);
        assert!(report.anomalies.iter().all(|a| a.date != day(2)), "{report:?}");
        assert!(report.anomalies.iter().all(|a| !a.kinds.contains(&AnomalyKind::Mood)));
    }

    #[test]
    fn two_point_flat_history_flags_a_change() {
        let mut metrics: Vec<_> = (1..=6).map(|n| metric(n, Some(0.5), None)).collect();
        metrics.push(metric(7, Some(0.5), Some(200.0)));
        metrics.push(metric(8, Some(0.5), Some(200.0)));
        metrics.push(metric(9, Some(0.5), Some(260.0)));

        let report = AnomalyDetector::default().detect(&metrics);
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].date, day(9));
        assert_eq!(report.anomalies[0].kinds, vec![AnomalyKind::Words]);
    }

    #[test]
    fn constant_days_have_no_anomalies() {
        let metrics: Vec<_> = (1..=10).map(|n| metric(n, Some(0.2), Some(300.0))).collect();
        let report = AnomalyDetector::default().detect(&metrics);
        assert!(report.anomalies.is_empty());
        assert_eq!(report.message, MSG_NONE_FOUND);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut metrics: Vec<_> = (1..=6).map(|n| metric(n, Some(0.5), Some(200.0))).collect();
        metrics.push(metric(7, Some(-0.4), Some(20.0)));
        let sorted = AnomalyDetector::default().detect(&metrics);

        metrics.reverse();
        let reversed = AnomalyDetector::default().detect(&metrics);
        assert_eq!(sorted, reversed);

        let anomaly = &sorted.anomalies[0];
        assert_eq!(anomaly.kinds, vec![AnomalyKind::Mood, AnomalyKind::Words]);
        assert!(anomaly.message.contains("lower"));
        assert!(anomaly.message.contains("less"));
    }

    #[test]
    fn detection_is_idempotent() {
        let metrics: Vec<_> = (1..=12)
            .map(|n| metric(n, Some((n as f64 * 0.7).sin()), Some(100.0 + n as f64 * 13.0)))
            .collect();
        let detector = AnomalyDetector::default();
        assert_eq!(detector.detect(&metrics), detector.detect(&metrics));
    }

    #[test]
    fn missing_values_skip_the_metric() {
        let mut metrics: Vec<_> = (1..=6).map(|n| metric(n, Some(0.5), Some(200.0))).collect();
        metrics.push(metric(7, None, Some(200.0)));
        metrics.push(metric(8, Some(0.5), None));
        let report = AnomalyDetector::default().detect(&metrics);
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn missing_values_do_not_move_the_baseline() {
        let mut metrics: Vec<_> = (1..=7).map(|n| metric(n, Some(0.5), None)).collect();
        metrics.push(metric(8, Some(0.5), Some(500.0)));
        // First word observation seeds the baseline and is never tested.
        let report = AnomalyDetector::default().detect(&metrics);
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn noisy_baseline_uses_z_scores() {
        let moods = [0.1, 0.3, 0.2, 0.4, 0.2, 0.3, 0.25, 0.3];
        let mut metrics: Vec<_> = moods
            .iter()
            .enumerate()
            .map(|(i, &m)| metric(i as u32 + 1, Some(m), Some(200.0)))
            .collect();
        metrics.push(metric(9, Some(0.32), Some(200.0)));
        metrics.push(metric(10, Some(-0.9), Some(200.0)));

        let report = AnomalyDetector::default().detect(&metrics);
        let flagged: Vec<_> = report.anomalies.iter().map(|a| a.date).collect();
        assert!(flagged.contains(&day(10)));
        assert!(!flagged.contains(&day(9)));
    }

    #[test]
    fn ewm_matches_closed_form() {
        let alpha = 0.25;
        let mut ewm = Ewm::seed(1.0);
        ewm.update(3.0, alpha);
        // diff 2, incr 0.5 -> mean 1.5, var 0.75 * (0 + 1.0) = 0.75
        assert!((ewm.mean - 1.5).abs() < 1e-12);
        assert!((ewm.var - 0.75).abs() < 1e-12);
    }

    #[test]
    fn aggregates_by_day() {
        let entries = vec![
            JournalEntrySample { date: day(2), text: "abc".to_string(), mood_score: Some(0.5) },
            JournalEntrySample { date: day(1), text: "hello".to_string(), mood_score: None },
            JournalEntrySample { date: day(2), text: "de".to_string(), mood_score: Some(-0.1) },
        ];
        let daily = aggregate_daily(&entries);

        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, day(1));
        assert_eq!(daily[0].average_mood, None);
        assert_eq!(daily[0].total_words, Some(5.0));
        assert!((daily[1].average_mood.unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(daily[1].total_words, Some(5.0));
    }
}
