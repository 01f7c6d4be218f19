//! Per-user grouping of journal entries into themes.
//!
//! ## Lifecycle
//!
//! Each user has at most one model. [`ClusterManager::train`] embeds the
//! user's texts, fits k-means and replaces any stored model; later calls can
//! [`load`](ClusterManager::load) it back, [`predict`](ClusterManager::predict)
//! cluster ids for texts and derive theme labels. Models are never deleted
//! implicitly.

pub mod kmeans;
pub mod store;
pub mod text;
pub mod themes;

pub use kmeans::{KMeansModel, KMeansParams};
pub use store::{FsModelStore, ModelStore, SqliteModelStore};

use crate::config::{ClusteringConfig, Config, StoreBackend};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::pos::{LexiconTagger, PosTagger};
use crate::types::ClusterReport;
use serde_json::Value;
use std::collections::BTreeMap;

const MSG_TOO_FEW_ENTRIES: &str = "You need at least 2 journal entries to perform clustering.";
const MSG_TOO_FEW_CLUSTERS: &str =
    "Not enough distinct entries or clusters requested to form meaningful themes.";
const MSG_GENERIC_THEMES: &str =
    "Clustering successful, but specific themes could not be extracted. Displaying general themes.";

/// Requested cluster count from loosely typed input.
///
/// Integers and integer strings are accepted (floats truncate, negatives
/// become 0); anything else yields `default`.
pub fn parse_cluster_count(value: Option<&Value>, default: usize) -> usize {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(k) => usize::try_from(k).unwrap_or(0),
        None => {
            tracing::warn!(?value, default, "Invalid or missing cluster count, using default");
            default
        }
    }
}

pub struct ClusterManager {
    embedder: Box<dyn Embedder>,
    store: Box<dyn ModelStore>,
    tagger: Box<dyn PosTagger>,
    settings: ClusteringConfig,
}

impl ClusterManager {
    pub fn new(embedder: Box<dyn Embedder>, store: Box<dyn ModelStore>) -> Self {
        Self {
            embedder,
            store,
            tagger: Box::new(LexiconTagger),
            settings: ClusteringConfig::default(),
        }
    }

    /// Build a manager from the `[embedding]` and `[clustering]` sections.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let store: Box<dyn ModelStore> = match config.clustering.store {
            StoreBackend::Filesystem => Box::new(FsModelStore::new(config.models_dir())),
            StoreBackend::Sqlite => Box::new(SqliteModelStore::open(&Config::model_db_path())?),
        };
        tracing::info!(
            embedder = embedder.name(),
            store = ?config.clustering.store,
            "Cluster manager initialized"
        );
        Ok(Self::new(embedder, store).with_settings(config.clustering.clone()))
    }

    pub fn with_settings(mut self, settings: ClusteringConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_tagger(mut self, tagger: Box<dyn PosTagger>) -> Self {
        self.tagger = tagger;
        self
    }

    pub fn settings(&self) -> &ClusteringConfig {
        &self.settings
    }

    /// Fit and persist a model for `user_id`.
    ///
    /// Returns `None` when there is nothing to train on or fewer than two
    /// clusters would result. `requested_k` is clamped to the number of
    /// texts.
    pub fn train(&self, user_id: &str, texts: &[&str], requested_k: usize) -> Result<Option<KMeansModel>> {
        if texts.is_empty() {
            tracing::warn!(user_id, "No texts to train on");
            return Ok(None);
        }
        let k = requested_k.min(texts.len());
        if k <= 1 {
            tracing::warn!(user_id, requested_k, texts = texts.len(), "Too few clusters to train");
            return Ok(None);
        }

        let vectors = self.embedder.embed(texts)?;
        let params = KMeansParams {
            n_clusters: k,
            n_init: self.settings.n_init,
            max_iter: self.settings.max_iter,
            seed: self.settings.seed,
            ..KMeansParams::new(k)
        };
        let model = kmeans::fit(&vectors, &params)?;

        self.store.save(user_id, &bincode::serialize(&model)?)?;
        tracing::info!(
            user_id,
            n_clusters = model.n_clusters,
            texts = texts.len(),
            inertia = model.inertia,
            "Trained clustering model"
        );
        Ok(Some(model))
    }

    /// Reload the persisted model for `user_id`.
    pub fn load(&self, user_id: &str) -> Result<Option<KMeansModel>> {
        match self.store.load(user_id)? {
            Some(blob) => Ok(Some(bincode::deserialize(&blob)?)),
            None => Ok(None),
        }
    }

    /// Cluster id for each text under `model`.
    pub fn predict(&self, model: &KMeansModel, texts: &[&str]) -> Result<Vec<usize>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.embedder.embed(texts)?;
        model.predict(&vectors)
    }

    /// Theme label per cluster, from the texts the model was trained on.
    pub fn label_clusters(
        &self,
        model: &KMeansModel,
        texts: &[&str],
        num_keywords: usize,
    ) -> BTreeMap<String, String> {
        themes::label_clusters(
            &model.labels,
            model.n_clusters,
            texts,
            num_keywords,
            self.tagger.as_ref(),
        )
    }

    /// Train, assign and label in one request.
    pub fn cluster_entries(&self, user_id: &str, texts: &[&str], requested_k: usize) -> Result<ClusterReport> {
        if user_id.trim().is_empty() {
            return Err(Error::Clustering("user id is required".to_string()));
        }
        if texts.len() < 2 {
            tracing::warn!(user_id, texts = texts.len(), "Not enough entries for clustering");
            return Ok(empty_report(MSG_TOO_FEW_ENTRIES));
        }

        let Some(model) = self.train(user_id, texts, requested_k)? else {
            return Ok(empty_report(MSG_TOO_FEW_CLUSTERS));
        };

        let entry_clusters = self.predict(&model, texts)?;
        let mut cluster_themes = self.label_clusters(&model, texts, self.settings.num_keywords);
        let mut message = None;

        if cluster_themes.is_empty() {
            tracing::warn!(user_id, "No themes extracted, using general labels");
            cluster_themes = (0..model.n_clusters)
                .map(|id| (themes::theme_key(id), themes::general_theme(id)))
                .collect();
            message = Some(MSG_GENERIC_THEMES.to_string());
        }

        Ok(ClusterReport {
            num_clusters: model.n_clusters,
            cluster_themes,
            entry_clusters,
            message,
        })
    }
}

fn empty_report(message: &str) -> ClusterReport {
    ClusterReport {
        message: Some(message.to_string()),
        ..ClusterReport::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Counts batches so tests can see when embedding happens.
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: Arc<AtomicUsize>,
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(texts)
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn manager(dir: &TempDir) -> (ClusterManager, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let embedder = CountingEmbedder {
            inner: HashingEmbedder::new(128).unwrap(),
            calls: Arc::clone(&calls),
        };
        let store = FsModelStore::new(dir.path());
        (ClusterManager::new(Box::new(embedder), Box::new(store)), calls)
    }

    const TEXTS: [&str; 4] = [
        "Long day at work, the project deadline is stressing me out",
        "Work meeting about the project deadline ran late again",
        "Walked on the beach at sunset, calm ocean waves",
        "Sunset swim in the ocean, the beach was calm",
    ];

    #[test]
    fn parse_cluster_count_is_lenient() {
        assert_eq!(parse_cluster_count(Some(&json!(3)), 5), 3);
        assert_eq!(parse_cluster_count(Some(&json!("4")), 5), 4);
        assert_eq!(parse_cluster_count(Some(&json!(2.9)), 5), 2);
        assert_eq!(parse_cluster_count(Some(&json!(-2)), 5), 0);
        assert_eq!(parse_cluster_count(Some(&json!("many")), 5), 5);
        assert_eq!(parse_cluster_count(Some(&json!(null)), 5), 5);
        assert_eq!(parse_cluster_count(None, 5), 5);
    }

    #[test]
    fn train_rejects_degenerate_input_without_embedding() {
        let dir = TempDir::new().unwrap();
        let (manager, calls) = manager(&dir);

        assert!(manager.train("u1", &[], 3).unwrap().is_none());
        for k in [0, 1, 2, 10] {
            assert!(manager.train("u1", &["only one entry"], k).unwrap().is_none());
        }
        assert!(manager.train("u1", &TEXTS, 1).unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(manager.load("u1").unwrap().is_none());
    }

    #[test]
    fn train_clamps_k_and_persists() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir);

        let model = manager.train("u1", &TEXTS[..3], 10).unwrap().unwrap();
        assert_eq!(model.n_clusters, 3);
        assert_eq!(model.labels.len(), 3);
        assert_eq!(manager.load("u1").unwrap(), Some(model));
        assert!(manager.load("someone-else").unwrap().is_none());
    }

    #[test]
    fn retrain_overwrites_model() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir);

        manager.train("u1", &TEXTS, 3).unwrap();
        let second = manager.train("u1", &TEXTS, 2).unwrap().unwrap();
        assert_eq!(manager.load("u1").unwrap().unwrap().n_clusters, 2);
        assert_eq!(manager.load("u1").unwrap(), Some(second));
    }

    #[test]
    fn similar_entries_share_a_cluster() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir);

        let report = manager.cluster_entries("u1", &TEXTS, 2).unwrap();
        assert_eq!(report.num_clusters, 2);
        let ids = &report.entry_clusters;
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[2], ids[3]);
        assert_ne!(ids[0], ids[2]);
        assert_eq!(report.cluster_themes.len(), 2);
        assert!(report.message.is_none());
    }

    #[test]
    fn too_few_entries_reports_message() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir);

        let report = manager.cluster_entries("u1", &["just one"], 5).unwrap();
        assert_eq!(report.num_clusters, 0);
        assert!(report.entry_clusters.is_empty());
        assert_eq!(report.message.as_deref(), Some(MSG_TOO_FEW_ENTRIES));

        let report = manager.cluster_entries("u1", &TEXTS, 1).unwrap();
        assert_eq!(report.message.as_deref(), Some(MSG_TOO_FEW_CLUSTERS));
        assert!(report.cluster_themes.is_empty());
    }

    #[test]
    fn missing_user_is_an_error() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir);
        assert!(manager.cluster_entries(" ", &TEXTS, 2).is_err());
    }

    #[test]
    fn predict_re_embeds() {
        let dir = TempDir::new().unwrap();
        let (manager, calls) = manager(&dir);

        let model = manager.train("u1", &TEXTS, 2).unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let ids = manager.predict(&model, &TEXTS).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ids, model.labels);
    }
}
