//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/mindmirror/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/mindmirror/` (~/.config/mindmirror/)
//! - Data: `$XDG_DATA_HOME/mindmirror/` (~/.local/share/mindmirror/)
//! - State/Logs: `$XDG_STATE_HOME/mindmirror/` (~/.local/state/mindmirror/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Generative service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Outbound quota for the generative service
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry policy for the generative service
    #[serde(default)]
    pub retry: RetryConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Clustering configuration
    #[serde(default)]
    pub clustering: ClusteringConfig,

    /// Anomaly detection configuration
    #[serde(default)]
    pub anomaly: AnomalyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generative service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// API base URL, or a full `...:generateContent` URL used verbatim
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    /// Model name, substituted into `{endpoint}/models/{model}:generateContent`
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// API key (can also use GEMINI_API_KEY)
    pub api_key: Option<String>,
    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Output token cap sent with each request
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            timeout_secs: default_llm_timeout(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl LlmConfig {
    /// API key from config, falling back to the GEMINI_API_KEY env var
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// URL of the `generateContent` call for the configured model
    pub fn generate_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        if endpoint.ends_with(":generateContent") {
            endpoint.to_string()
        } else {
            format!("{endpoint}/models/{}:generateContent", self.model)
        }
    }
}

fn default_llm_endpoint() -> String {
    GEMINI_ENDPOINT.to_string()
}

fn default_llm_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    2048
}

/// Dual sliding-window quota for outbound generative calls
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_rpm")]
    pub requests_per_minute: usize,
    #[serde(default = "default_tpm")]
    pub tokens_per_minute: u64,
    /// Window length in seconds (both windows share it)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Characters per token used for the cost estimate
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_rpm(),
            tokens_per_minute: default_tpm(),
            window_secs: default_window_secs(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

fn default_rpm() -> usize {
    30_000
}

fn default_tpm() -> u64 {
    30_000_000
}

fn default_window_secs() -> u64 {
    60
}

fn default_chars_per_token() -> usize {
    4
}

/// Retry policy configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

/// Supported embedding providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAI,
    /// Local Ollama server
    Ollama,
    /// Offline feature-hashing embedder (no model, lexical only)
    Hashing,
}

impl EmbeddingProvider {
    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            EmbeddingProvider::OpenAI => "https://api.openai.com/v1",
            EmbeddingProvider::Ollama => "http://localhost:11434",
            EmbeddingProvider::Hashing => "",
        }
    }
}

/// Embedding service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProvider,
    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// API key (can also use EMBEDDING_API_KEY)
    pub api_key: Option<String>,
    /// Vector dimension (used by the hashing embedder)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            endpoint: None,
            model: default_embedding_model(),
            api_key: None,
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| self.provider.default_endpoint().to_string())
    }

    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("EMBEDDING_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

fn default_embedding_provider() -> EmbeddingProvider {
    EmbeddingProvider::Ollama
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_embedding_timeout() -> u64 {
    60
}

/// Model store backends
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Filesystem,
    Sqlite,
}

/// Clustering configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ClusteringConfig {
    /// Cluster count used when a request does not carry a valid one
    #[serde(default = "default_clusters")]
    pub default_clusters: usize,
    /// Keywords considered per theme label
    #[serde(default = "default_num_keywords")]
    pub num_keywords: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// k-means restarts
    #[serde(default = "default_n_init")]
    pub n_init: usize,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_store_backend")]
    pub store: StoreBackend,
    /// Override for the model directory (filesystem backend)
    pub models_dir: Option<PathBuf>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            default_clusters: default_clusters(),
            num_keywords: default_num_keywords(),
            seed: default_seed(),
            n_init: default_n_init(),
            max_iter: default_max_iter(),
            store: default_store_backend(),
            models_dir: None,
        }
    }
}

fn default_clusters() -> usize {
    5
}

fn default_num_keywords() -> usize {
    5
}

fn default_seed() -> u64 {
    42
}

fn default_n_init() -> usize {
    10
}

fn default_max_iter() -> usize {
    300
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Filesystem
}

/// Anomaly detection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AnomalyConfig {
    /// EWMA span in days
    #[serde(default = "default_span")]
    pub span: usize,
    /// |z| above which mood is flagged
    #[serde(default = "default_mood_threshold")]
    pub mood_threshold: f64,
    /// |z| above which word count is flagged
    #[serde(default = "default_words_threshold")]
    pub words_threshold: f64,
    /// Minimum number of days before detection runs
    #[serde(default = "default_min_days")]
    pub min_days: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            span: default_span(),
            mood_threshold: default_mood_threshold(),
            words_threshold: default_words_threshold(),
            min_days: default_min_days(),
        }
    }
}

impl AnomalyConfig {
    /// Smoothing factor derived from the span
    pub fn alpha(&self) -> f64 {
        2.0 / (self.span as f64 + 1.0)
    }
}

fn default_span() -> usize {
    7
}

fn default_mood_threshold() -> f64 {
    1.0
}

fn default_words_threshold() -> f64 {
    1.5
}

fn default_min_days() -> usize {
    7
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.requests_per_minute == 0 || self.rate_limit.tokens_per_minute == 0 {
            return Err(Error::Config(
                "rate_limit.requests_per_minute and tokens_per_minute must be positive".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.chars_per_token == 0 {
            return Err(Error::Config(
                "rate_limit.window_secs and chars_per_token must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(Error::Config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".to_string(),
            ));
        }
        if self.anomaly.span == 0 {
            return Err(Error::Config("anomaly.span must be at least 1".to_string()));
        }
        if !(0.8..=1.5).contains(&self.anomaly.mood_threshold) {
            return Err(Error::Config(
                "anomaly.mood_threshold must be between 0.8 and 1.5".to_string(),
            ));
        }
        if !(1.0..=2.0).contains(&self.anomaly.words_threshold) {
            return Err(Error::Config(
                "anomaly.words_threshold must be between 1.0 and 2.0".to_string(),
            ));
        }
        if self.clustering.n_init == 0 || self.clustering.max_iter == 0 {
            return Err(Error::Config(
                "clustering.n_init and clustering.max_iter must be positive".to_string(),
            ));
        }
        if self.embedding.provider == EmbeddingProvider::Hashing && self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be positive for the hashing provider".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/mindmirror/config.toml` (~/.config/mindmirror/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("mindmirror").join("config.toml")
    }

    /// Returns the data directory path
    ///
    /// `$XDG_DATA_HOME/mindmirror/` (~/.local/share/mindmirror/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("mindmirror")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/mindmirror/` (~/.local/state/mindmirror/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("mindmirror")
    }

    /// Returns the per-user model directory for the filesystem store
    pub fn models_dir(&self) -> PathBuf {
        self.clustering
            .models_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("user_models"))
    }

    /// Returns the SQLite model store path
    ///
    /// `$XDG_DATA_HOME/mindmirror/models.db`
    pub fn model_db_path() -> PathBuf {
        Self::data_dir().join("models.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/mindmirror/mindmirror.log` (~/.local/state/mindmirror/mindmirror.log)
    /// Returns today's log file; the appender rotates daily on UTC dates
    pub fn log_path() -> PathBuf {
        Self::state_dir().join(format!(
            "mindmirror.{}.log",
            chrono::Utc::now().format("%Y-%m-%d")
        ))
    }
}
