//! Wire transport for the generative service.
//!
//! [`LlmTransport`] performs exactly one HTTP exchange and reports either the
//! raw status/body or a transport-level failure. Retry, gating and reply
//! parsing live in the invoker so transports stay trivially mockable.

use super::parse::ResponseFormat;
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};
use std::time::Duration;

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// One outbound generation call.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub format: ResponseFormat,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Raw HTTP outcome of a completed exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before a complete response was received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    /// The connection broke mid-exchange (reset, closed early, truncated body)
    #[error("connection interrupted: {0}")]
    Interrupted(String),
    /// The request could not be built or sent at all
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::Request(err.to_string())
        } else if err.is_request() || err.is_body() || err.is_decode() {
            TransportError::Interrupted(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Single-exchange interface to the generative service.
pub trait LlmTransport: Send + Sync {
    fn send(&self, request: &GenerateRequest) -> std::result::Result<TransportResponse, TransportError>;
}

/// Build the `generateContent` payload for a request.
pub fn build_request_body(request: &GenerateRequest, max_output_tokens: u32) -> Value {
    let mut generation_config = json!({
        "temperature": request.temperature,
        "maxOutputTokens": max_output_tokens,
    });
    if request.format == ResponseFormat::Structured {
        generation_config["responseMimeType"] = Value::from("application/json");
    }

    let safety_settings: Vec<Value> = HARM_CATEGORIES
        .iter()
        .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
        .collect();

    json!({
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        "generationConfig": generation_config,
        "safetySettings": safety_settings,
    })
}

/// HTTP transport for the Gemini `generateContent` endpoint.
pub struct GeminiTransport {
    endpoint: String,
    api_key: Option<String>,
    max_output_tokens: u32,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl GeminiTransport {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.resolved_api_key();
        if api_key.is_none() {
            tracing::warn!("No generative service API key configured (llm.api_key or GEMINI_API_KEY)");
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Llm(format!("failed to build tokio runtime: {e}")))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.generate_url(),
            api_key,
            max_output_tokens: config.max_output_tokens,
            runtime,
            http,
        })
    }

    fn headers(&self) -> std::result::Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = self.api_key.as_deref() {
            let value = HeaderValue::from_str(key)
                .map_err(|e| TransportError::Request(format!("invalid api key header: {e}")))?;
            headers.insert("x-goog-api-key", value);
        }
        Ok(headers)
    }
}

impl LlmTransport for GeminiTransport {
    fn send(&self, request: &GenerateRequest) -> std::result::Result<TransportResponse, TransportError> {
        let headers = self.headers()?;
        let body = build_request_body(request, self.max_output_tokens);

        self.runtime.block_on(async {
            let resp = self
                .http
                .post(&self.endpoint)
                .headers(headers)
                .timeout(request.timeout)
                .json(&body)
                .send()
                .await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            Ok::<_, TransportError>(TransportResponse { status, body })
        })
    }
}
