//! Text embedding backends.
//!
//! Clustering only needs `embed(texts) -> vectors`; which model produces
//! them is a deployment choice. HTTP backends speak the OpenAI-compatible
//! `/embeddings` API or Ollama's `/api/embed`; the hashing backend runs
//! offline with no model at all.

use crate::clustering::text::is_stopword;
use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::format::log_preview;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Batch text embedding.
pub trait Embedder: Send + Sync {
    /// One vector per input text, in order, all of the same dimension.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Short identifier for logs
    fn name(&self) -> &str;
}

/// Create the embedder selected by `config`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Box::new(HashingEmbedder::new(config.dimension)?)),
        EmbeddingProvider::OpenAI | EmbeddingProvider::Ollama => {
            Ok(Box::new(HttpEmbedder::new(config)?))
        }
    }
}

// ============================================
// HTTP
// ============================================

pub struct HttpEmbedder {
    provider: EmbeddingProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Embedding(format!("failed to build tokio runtime: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Embedding(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            provider: config.provider,
            endpoint: config.resolved_endpoint().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.resolved_api_key(),
            runtime,
            http,
        })
    }

    fn url(&self) -> String {
        match self.provider {
            EmbeddingProvider::Ollama => format!("{}/api/embed", self.endpoint),
            _ => format!("{}/embeddings", self.endpoint),
        }
    }

    async fn post(&self, texts: &[&str]) -> Result<String> {
        let mut req = self.http.post(self.url()).json(&EmbedRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = self.api_key.as_deref() {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("{} request failed: {e}", self.name())))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Embedding(format!("{} read body failed: {e}", self.name())))?;
        if !status.is_success() {
            return Err(Error::Embedding(format!(
                "{} returned {}: {}",
                self.name(),
                status.as_u16(),
                log_preview(&body, 300)
            )));
        }
        Ok(body)
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = self.runtime.block_on(self.post(texts))?;
        let vectors = match self.provider {
            EmbeddingProvider::Ollama => serde_json::from_str::<OllamaResponse>(&body)?.embeddings,
            _ => {
                let mut data = serde_json::from_str::<OpenAiResponse>(&body)?.data;
                data.sort_by_key(|d| d.index);
                data.into_iter().map(|d| d.embedding).collect()
            }
        };

        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "{} returned {} vectors for {} texts",
                self.name(),
                vectors.len(),
                texts.len()
            )));
        }
        tracing::debug!(
            embedder = self.name(),
            count = vectors.len(),
            dimension = vectors.first().map(Vec::len).unwrap_or(0),
            "Embedded texts"
        );
        Ok(vectors)
    }

    fn name(&self) -> &str {
        match self.provider {
            EmbeddingProvider::Ollama => "ollama",
            _ => "openai",
        }
    }
}

// ============================================
// Hashing
// ============================================

/// Offline embedder using signed feature hashing over content words.
///
/// Purely lexical: texts sharing vocabulary land close together. Vectors
/// are L2-normalized; a text with no content words maps to the zero vector.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config("embedding dimension must be positive".to_string()));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let tokens = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1 && !is_stopword(t));

        for token in tokens {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let first = embedder.embed(&["Morning run by the river"]).unwrap();
        let second = embedder.embed(&["Morning run by the river"]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].len(), 64);
        assert!((cosine(&first[0], &first[0]) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let v = embedder
            .embed(&[
                "work deadline project meeting",
                "project meeting at work ran late",
                "beach sunset swimming holiday",
            ])
            .unwrap();
        assert!(cosine(&v[0], &v[1]) > cosine(&v[0], &v[2]));
    }

    #[test]
    fn stopword_only_text_is_zero() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let v = embedder.embed(&["the and of"]).unwrap();
        assert!(v[0].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn factory_selects_provider() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Hashing,
            dimension: 32,
            ..Default::default()
        };
        assert_eq!(create_embedder(&config).unwrap().name(), "hashing");

        let config = EmbeddingConfig::default();
        assert_eq!(create_embedder(&config).unwrap().name(), "ollama");
    }
}
