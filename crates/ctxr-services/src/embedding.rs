//! Embedding backends.
//!
//! The HTTP backend talks to any OpenAI-compatible embeddings endpoint.
//! The hashed backend is deterministic and offline; it exists for tests
//! and air-gapped runs, selected via `APP_USE_FAKE_EMBEDDINGS`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ctxr_core::error::{Error, Result};
use ctxr_core::traits::Embedder;

use crate::retry::{with_retries, CallError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub max_batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for HttpEmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_secs: 30,
            max_batch_size: 100,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        if let Some(key) = &api_key {
            let auth = format!("Bearer {key}");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|e| Error::InvalidConfig(format!("invalid api key: {e}")))?,
            );
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        info!(endpoint = %config.endpoint, model = %config.model, "http embedder ready");
        Ok(Self { client, config })
    }

    fn request_batch(&self, texts: &[&str]) -> std::result::Result<Vec<Vec<f32>>, CallError> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts.to_vec(),
            encoding_format: "float",
        };
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    CallError::Transient(e.to_string())
                } else {
                    CallError::Fatal(Error::Embedding(e.to_string()))
                }
            })?;
        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(CallError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CallError::Fatal(Error::Embedding(format!(
                "HTTP {status}: {body}"
            ))));
        }
        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| CallError::Fatal(Error::Embedding(format!("bad response: {e}"))))?;
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        if data.len() != texts.len() {
            return Err(CallError::Fatal(Error::Embedding(format!(
                "asked for {} embeddings, got {}",
                texts.len(),
                data.len()
            ))));
        }
        Ok(data.into_iter().map(|d| normalize(&d.embedding)).collect())
    }
}

impl Embedder for HttpEmbedder {
    fn dim(&self) -> usize {
        self.config.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut all = Vec::with_capacity(texts.len());
        for batch in refs.chunks(self.config.max_batch_size.max(1)) {
            debug!(batch = batch.len(), "requesting embeddings");
            let embeddings =
                with_retries(&self.config.retry, Error::Embedding, || {
                    self.request_batch(batch)
                })?;
            all.extend(embeddings);
        }
        Ok(all)
    }
}

/// Deterministic offline embedder: each whitespace token is hashed into
/// one dimension, then the vector is L2-normalized. Not semantically
/// meaningful, but stable across runs and platforms.
pub struct HashedEmbedder {
    dim: usize,
}

impl HashedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for HashedEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let mut v = vec![0f32; self.dim];
            for (i, token) in text.split_whitespace().enumerate() {
                let mut hasher = XxHash64::with_seed(0);
                token.to_lowercase().hash(&mut hasher);
                let h = hasher.finish();
                let idx = (h as usize) % self.dim;
                let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
                v[idx] += val + (i as f32 % 3.0) * 0.01;
            }
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
            for x in &mut v {
                *x /= norm;
            }
            out.push(v);
        }
        Ok(out)
    }
}

fn normalize(embedding: &[f32]) -> Vec<f32> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        embedding.iter().map(|x| x / norm).collect()
    } else {
        embedding.to_vec()
    }
}

/// Pick the embedding backend: hashed when `APP_USE_FAKE_EMBEDDINGS` is
/// set, the HTTP backend otherwise.
pub fn default_embedder(config: HttpEmbedderConfig) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        info!(dim = config.dimensions, "using hashed offline embedder");
        return Ok(Arc::new(HashedEmbedder::new(config.dimensions)));
    }
    Ok(Arc::new(HttpEmbedder::new(config)?))
}
