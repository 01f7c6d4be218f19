//! # mindmirror-core
//!
//! Core library for mindmirror - insights over a personal journal.
//!
//! This library provides:
//! - Entry analysis (emotions, concerns, summary, tips) through a
//!   rate-limited, retrying generative API client
//! - Anomaly detection over daily mood and word-count series
//! - Per-user clustering of entries into labelled themes
//! - Milestone coaching insights
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Every remote call goes through one shared
//! [`RateLimitedGate`](llm::RateLimitedGate), so all callers in a process
//! draw from the same request and token budgets. Remote failures never
//! escape the analysis layer; callers get a fallback record instead.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mindmirror_core::analysis::JournalAnalysisAssembler;
//! use mindmirror_core::llm::{RateLimitedGate, ResilientApiInvoker};
//! use mindmirror_core::Config;
//! use std::sync::Arc;
//!
//! let config = Config::load().expect("failed to load config");
//! let gate = Arc::new(RateLimitedGate::from_config(&config.rate_limit));
//! let invoker = ResilientApiInvoker::from_config(&config, gate).expect("failed to build client");
//!
//! let record = JournalAnalysisAssembler::new(Arc::new(invoker)).analyze("Slept well, busy day.");
//! println!("mood {}", record.mood_score());
//! ```

// Re-export commonly used items at the crate root
pub use analysis::{JournalAnalysisAssembler, MilestoneInsightsAssembler, MoodScorer};
pub use anomaly::AnomalyDetector;
pub use clustering::ClusterManager;
pub use config::Config;
pub use error::{Error, Result};
pub use llm::{RateLimitedGate, ResilientApiInvoker};
pub use types::*;

// Public modules
pub mod analysis;
pub mod anomaly;
pub mod clustering;
pub mod config;
pub mod embedding;
pub mod error;
pub mod format;
pub mod llm;
pub mod logging;
pub mod pos;
pub mod types;
