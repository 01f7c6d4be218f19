//! Retry classification and backoff for generative calls.

use super::transport::TransportError;
use crate::config::RetryConfig;
use std::time::Duration;

/// Why a single attempt did not produce a usable HTTP success.
#[derive(Debug)]
pub enum AttemptError {
    Transport(TransportError),
    Http { status: u16, body: String },
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Transport(err) => write!(f, "{err}"),
            AttemptError::Http { status, .. } => write!(f, "HTTP {status}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    FailFast,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Timeouts, connection failures (including mid-exchange drops), 429 and
    /// 5xx are transient. Requests that cannot be built fail fast.
    pub fn classify(&self, error: &AttemptError) -> RetryDecision {
        match error {
            AttemptError::Transport(TransportError::Timeout)
            | AttemptError::Transport(TransportError::Connect(_))
            | AttemptError::Transport(TransportError::Interrupted(_)) => RetryDecision::Retry,
            AttemptError::Transport(TransportError::Request(_)) => RetryDecision::FailFast,
            AttemptError::Http { status, .. } if *status == 429 || *status >= 500 => {
                RetryDecision::Retry
            }
            AttemptError::Http { .. } => RetryDecision::FailFast,
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
