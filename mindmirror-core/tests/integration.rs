//! Integration tests for mindmirror analysis, anomaly and clustering flows
//!
//! Remote services are replaced by in-process transports and the offline
//! hashing embedder, so nothing here touches the network.

use mindmirror_core::analysis::{fallback_insights, DEFAULT_GROWTH_TIP};
use mindmirror_core::anomaly::aggregate_daily;
use mindmirror_core::clustering::{ClusterManager, FsModelStore, SqliteModelStore};
use mindmirror_core::embedding::HashingEmbedder;
use mindmirror_core::llm::transport::{
    GenerateRequest, LlmTransport, TransportError, TransportResponse,
};
use mindmirror_core::llm::{RateLimitedGate, RateLimits, RetryPolicy};
use mindmirror_core::{
    AnomalyDetector, AnomalyKind, DailyMetric, JournalAnalysisAssembler, JournalEntrySample,
    MilestoneInsightsAssembler, MilestoneRequest, ResilientApiInvoker,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

type Outcome = Result<TransportResponse, TransportError>;

/// Plays back queued outcomes, then refuses every connection.
struct QueuedTransport {
    queue: Mutex<VecDeque<Outcome>>,
    calls: Arc<Mutex<usize>>,
}

impl QueuedTransport {
    fn new(outcomes: Vec<Outcome>) -> (Self, Arc<Mutex<usize>>) {
        let calls = Arc::new(Mutex::new(0));
        let transport = Self {
            queue: Mutex::new(outcomes.into()),
            calls: Arc::clone(&calls),
        };
        (transport, calls)
    }
}

impl LlmTransport for QueuedTransport {
    fn send(&self, _request: &GenerateRequest) -> Outcome {
        *self.calls.lock().unwrap() += 1;
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("refused".to_string())))
    }
}

/// Wrap `text` in a generateContent response envelope
fn reply(text: &str) -> Outcome {
    Ok(TransportResponse {
        status: 200,
        body: json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }).to_string(),
    })
}

fn invoker(transport: QueuedTransport) -> Arc<ResilientApiInvoker> {
    mindmirror_core::logging::init_test();
    let gate = Arc::new(RateLimitedGate::new(RateLimits {
        requests_per_window: 100,
        tokens_per_window: 1_000_000,
        window: Duration::from_secs(60),
    }));
    let retry = RetryPolicy {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
    };
    Arc::new(ResilientApiInvoker::new(Box::new(transport), gate, retry))
}

fn cluster_manager(dir: &TempDir) -> ClusterManager {
    mindmirror_core::logging::init_test();
    ClusterManager::new(
        Box::new(HashingEmbedder::new(256).unwrap()),
        Box::new(FsModelStore::new(dir.path())),
    )
}

// ============================================
// Journal Analysis Tests
// ============================================

#[test]
fn test_analysis_after_transient_failures() {
    let unavailable = || {
        Ok(TransportResponse {
            status: 503,
            body: "overloaded".to_string(),
        })
    };
    let body = json!({
        "emotions": {"anxiety": 3, "hope": 1},
        "coreConcerns": ["work"],
        "summary": "Nervous about the review but hopeful.",
        "growthTips": ["Prepare notes tonight"],
        "keyPhrases": ["performance review"]
    });
    let (transport, calls) = QueuedTransport::new(vec![
        unavailable(),
        unavailable(),
        reply(&format!("```json\n{body}\n```")),
    ]);
    let invoker = invoker(transport);
    let assembler = JournalAnalysisAssembler::new(Arc::clone(&invoker));

    let record = assembler.analyze("My review is tomorrow and I'm nervous, but hopeful.");

    assert_eq!(*calls.lock().unwrap(), 3);
    assert_eq!(invoker.gate().snapshot().total_admitted, 3);
    assert_eq!(record.summary(), "Nervous about the review but hopeful.");
    assert!((record.emotions()["anxiety"] - 0.75).abs() < 1e-9);
    // anxiety carries no valence, hope 0.8
    assert!((record.mood_score() - 0.25 * 0.8).abs() < 1e-9);

    let json = serde_json::to_value(&record).unwrap();
    assert!(json.get("moodScore").is_some());
    assert!(json.get("growthTips").is_some());
}

#[test]
fn test_analysis_falls_back_when_unreachable() {
    let (transport, calls) = QueuedTransport::new(Vec::new());
    let invoker = invoker(transport);
    let assembler = JournalAnalysisAssembler::new(Arc::clone(&invoker));

    let record = assembler.analyze("Quiet evening.");

    assert_eq!(*calls.lock().unwrap(), 5);
    assert_eq!(invoker.gate().snapshot().total_admitted, 5);
    assert_eq!(record.summary(), "Quiet evening.");
    assert_eq!(record.growth_tips(), [DEFAULT_GROWTH_TIP.to_string()]);
    assert_eq!(record.mood_score(), 0.0);
}

#[test]
fn test_milestone_insights_end_to_end() {
    let request: MilestoneRequest = serde_json::from_value(json!({
        "title": "Run a half marathon",
        "completionPercentage": "40",
        "tasks": [{"description": "Long run", "status": "DONE"}]
    }))
    .unwrap();
    assert_eq!(request.completion_percentage, Some(40.0));

    let body = json!({
        "remainingWork": "Build up to 18km.",
        "performanceAssessment": "Steady progress.",
        "tips": ["Rest on Mondays"],
        "encouragement": "Keep going!",
        "suggestedNewTasks": ["Book the race"]
    });
    let (transport, _) = QueuedTransport::new(vec![reply(&body.to_string())]);
    let insights = MilestoneInsightsAssembler::new(invoker(transport)).insights(&request);
    assert_eq!(insights.status, "SUCCESS");
    assert_eq!(insights.suggested_new_tasks, vec!["Book the race".to_string()]);

    let (transport, _) = QueuedTransport::new(vec![Ok(TransportResponse {
        status: 403,
        body: "forbidden".to_string(),
    })]);
    let insights = MilestoneInsightsAssembler::new(invoker(transport)).insights(&request);
    assert_eq!(insights, fallback_insights());
}

// ============================================
// Anomaly Detection Tests
// ============================================

#[test]
fn test_anomaly_detection_from_json_payload() {
    mindmirror_core::logging::init_test();
    let mut payload: Vec<_> = (1..=9)
        .map(|d| json!({"date": format!("2024-03-{d:02}"), "averageMood": 0.4, "totalWords": "250"}))
        .collect();
    payload.push(json!({"date": "2024-03-10", "averageMood": -0.7, "totalWords": 250}));
    let metrics: Vec<DailyMetric> = serde_json::from_value(json!(payload)).unwrap();

    let report = AnomalyDetector::default().detect(&metrics);

    assert_eq!(report.anomalies.len(), 1);
    let anomaly = &report.anomalies[0];
    assert_eq!(anomaly.date.to_string(), "2024-03-10");
    assert_eq!(anomaly.kinds, vec![AnomalyKind::Mood]);
    assert!(anomaly.message.contains("lower"), "{}", anomaly.message);
    assert_eq!(report.message, "Detected 1 unusual journaling patterns.");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["anomalies"][0]["type"], json!(["mood"]));
}

#[test]
fn test_anomaly_detection_needs_history() {
    let detector = AnomalyDetector::default();
    assert_eq!(
        detector.detect(&[]).message,
        "No daily data provided for anomaly detection."
    );

    let entries: Vec<JournalEntrySample> = (1..=3)
        .map(|d| JournalEntrySample {
            date: chrono::NaiveDate::from_ymd_opt(2024, 5, d).unwrap(),
            text: "short note".to_string(),
            mood_score: Some(0.1),
        })
        .collect();
    let report = detector.detect(&aggregate_daily(&entries));
    assert!(report.anomalies.is_empty());
    assert!(report.message.starts_with("Not enough data"));
}

// ============================================
// Clustering Tests
// ============================================

#[test]
fn test_cluster_three_entries_into_two_themes() {
    let dir = TempDir::new().unwrap();
    let manager = cluster_manager(&dir);
    let texts = [
        "Stressful deadline at work, the project manager wants the report",
        "Another work deadline, the project report is late",
        "Peaceful hike in the mountains with my dog, sunny trail",
    ];

    let report = manager.cluster_entries("alice", &texts, 2).unwrap();

    assert_eq!(report.num_clusters, 2);
    assert_eq!(report.entry_clusters.len(), 3);
    assert!(report.entry_clusters.contains(&0));
    assert!(report.entry_clusters.contains(&1));
    assert_eq!(report.entry_clusters[0], report.entry_clusters[1]);
    assert_eq!(
        report.cluster_themes.keys().cloned().collect::<Vec<_>>(),
        vec!["Theme 1".to_string(), "Theme 2".to_string()]
    );

    let work_theme = format!("Theme {}", report.entry_clusters[0] + 1);
    assert!(report.cluster_themes[&work_theme].contains("work")
        || report.cluster_themes[&work_theme].contains("deadline")
        || report.cluster_themes[&work_theme].contains("project")
        || report.cluster_themes[&work_theme].contains("report"));
}

#[test]
fn test_model_survives_manager_restart() {
    let dir = TempDir::new().unwrap();
    let texts = ["garden tomatoes ripening", "tomatoes and garden weeds", "late train commute"];

    let trained = cluster_manager(&dir).train("bob", &texts, 2).unwrap().unwrap();

    let reopened = cluster_manager(&dir);
    let loaded = reopened.load("bob").unwrap().unwrap();
    assert_eq!(loaded, trained);
    assert_eq!(reopened.predict(&loaded, &texts).unwrap(), trained.labels);
}

#[test]
fn test_train_degenerate_inputs() {
    let dir = TempDir::new().unwrap();
    let manager = cluster_manager(&dir);

    assert!(manager.train("carol", &["only entry"], 3).unwrap().is_none());
    let model = manager
        .train("carol", &["rainy day", "sunny beach", "snowy peak"], 8)
        .unwrap()
        .unwrap();
    assert_eq!(model.n_clusters, 3);

    let report = manager.cluster_entries("carol", &["lonely entry"], 3).unwrap();
    assert_eq!(report.num_clusters, 0);
    assert!(report.message.is_some());
}

#[test]
fn test_sqlite_store_backs_cluster_manager() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("models.db");
    let texts = ["coffee with friends", "friends and coffee downtown", "tax paperwork due"];

    let manager = ClusterManager::new(
        Box::new(HashingEmbedder::new(128).unwrap()),
        Box::new(SqliteModelStore::open(&db_path).unwrap()),
    );
    let trained = manager.train("dave", &texts, 2).unwrap().unwrap();
    drop(manager);

    let manager = ClusterManager::new(
        Box::new(HashingEmbedder::new(128).unwrap()),
        Box::new(SqliteModelStore::open(&db_path).unwrap()),
    );
    assert_eq!(manager.load("dave").unwrap(), Some(trained));
    assert!(manager.load("erin").unwrap().is_none());
}
