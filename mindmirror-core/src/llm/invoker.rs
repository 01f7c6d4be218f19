//! Gated, retrying caller for the generative service.
//!
//! Every attempt (retries included) first passes through the shared
//! [`RateLimitedGate`]. Failures never cross this boundary: they are logged
//! and surface as `None`.

use super::parse::{parse_reply, LlmReply, ResponseFormat};
use super::rate_limit::RateLimitedGate;
use super::retry::{AttemptError, RetryDecision, RetryPolicy};
use super::transport::{GeminiTransport, GenerateRequest, LlmTransport};
use crate::config::Config;
use crate::error::Result;
use crate::format::log_preview;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const LOG_BODY_CHARS: usize = 500;

pub struct ResilientApiInvoker {
    transport: Box<dyn LlmTransport>,
    gate: Arc<RateLimitedGate>,
    retry: RetryPolicy,
    chars_per_token: usize,
    temperature: f32,
    timeout: Duration,
}

impl ResilientApiInvoker {
    pub fn new(transport: Box<dyn LlmTransport>, gate: Arc<RateLimitedGate>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            gate,
            retry,
            chars_per_token: 4,
            temperature: 0.7,
            timeout: Duration::from_secs(120),
        }
    }

    /// Build an invoker over the HTTP transport described by `config`.
    pub fn from_config(config: &Config, gate: Arc<RateLimitedGate>) -> Result<Self> {
        let transport = GeminiTransport::new(&config.llm)?;
        Ok(Self::new(
            Box::new(transport),
            gate,
            RetryPolicy::from_config(&config.retry),
        )
        .with_chars_per_token(config.rate_limit.chars_per_token)
        .with_defaults(config.llm.temperature, config.llm.timeout()))
    }

    pub fn with_chars_per_token(mut self, chars_per_token: usize) -> Self {
        self.chars_per_token = chars_per_token.max(1);
        self
    }

    /// Temperature and timeout used by the `invoke_*` shorthands.
    pub fn with_defaults(mut self, temperature: f32, timeout: Duration) -> Self {
        self.temperature = temperature;
        self.timeout = timeout;
        self
    }

    pub fn gate(&self) -> &Arc<RateLimitedGate> {
        &self.gate
    }

    pub fn estimate_tokens(&self, prompt: &str) -> u64 {
        (prompt.chars().count() / self.chars_per_token) as u64
    }

    pub fn invoke_structured(&self, prompt: &str) -> Option<Value> {
        self.invoke(prompt, ResponseFormat::Structured, self.temperature, self.timeout)
            .and_then(LlmReply::into_structured)
    }

    pub fn invoke_freeform(&self, prompt: &str) -> Option<String> {
        self.invoke(prompt, ResponseFormat::Freeform, self.temperature, self.timeout)
            .and_then(LlmReply::into_text)
    }

    /// Send one prompt, retrying transient failures.
    ///
    /// Returns `None` when attempts are exhausted, the failure is not
    /// retryable, the reply was blocked, or a structured reply could not be
    /// decoded.
    pub fn invoke(
        &self,
        prompt: &str,
        format: ResponseFormat,
        temperature: f32,
        timeout: Duration,
    ) -> Option<LlmReply> {
        let request = GenerateRequest {
            prompt: prompt.to_string(),
            format,
            temperature,
            timeout,
        };
        let estimated_tokens = self.estimate_tokens(prompt);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.gate.acquire(estimated_tokens);
            tracing::info!(
                attempt,
                timeout_secs = timeout.as_secs_f64(),
                ?format,
                "Calling generative service"
            );

            let failure = match self.transport.send(&request) {
                Ok(resp) if resp.is_success() => {
                    tracing::debug!(
                        status = resp.status,
                        body = %log_preview(&resp.body, LOG_BODY_CHARS),
                        "Generative service replied"
                    );
                    return match parse_reply(&resp.body, format) {
                        Ok(reply) => Some(reply),
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                prompt = %log_preview(prompt, 100),
                                "Generative reply rejected"
                            );
                            None
                        }
                    };
                }
                Ok(resp) => AttemptError::Http {
                    status: resp.status,
                    body: resp.body,
                },
                Err(e) => AttemptError::Transport(e),
            };

            let status = match &failure {
                AttemptError::Http { status, .. } => Some(*status),
                AttemptError::Transport(_) => None,
            };
            let body = match &failure {
                AttemptError::Http { body, .. } => log_preview(body, LOG_BODY_CHARS),
                AttemptError::Transport(_) => String::new(),
            };

            match self.retry.classify(&failure) {
                RetryDecision::FailFast => {
                    tracing::error!(attempt, ?status, %body, error = %failure, "Non-retriable generative service failure");
                    return None;
                }
                RetryDecision::Retry if !self.retry.has_attempts_left(attempt) => {
                    tracing::error!(attempt, ?status, %body, error = %failure, "Generative service failed after all retries");
                    return None;
                }
                RetryDecision::Retry => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        ?status,
                        %body,
                        error = %failure,
                        wait_ms = delay.as_millis() as u64,
                        "Transient generative service failure, retrying"
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}
