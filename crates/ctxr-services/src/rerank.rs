//! Reranking backends.
//!
//! The HTTP backend calls a Cohere-style rerank endpoint. The overlap
//! backend scores candidates by query-token containment; it is the
//! deterministic offline stand-in.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ctxr_core::error::{Error, Result};
use ctxr_core::traits::{Reranker, RerankInput};
use ctxr_core::types::RankedResult;

use crate::retry::{with_retries, CallError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct RerankConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Retain each candidate's pre-rerank engine score in
    /// `RankedResult::prior_score` next to the rerank score. Ordering
    /// comes from the reranker either way.
    pub keep_original_score: bool,
    pub retry: RetryPolicy,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.cohere.com/v1/rerank".to_string(),
            api_key: None,
            model: "rerank-english-v3.0".to_string(),
            timeout_secs: 30,
            keep_original_score: true,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

pub struct HttpReranker {
    client: Client,
    config: RerankConfig,
}

impl HttpReranker {
    pub fn new(config: RerankConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("COHERE_API_KEY").ok());
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
        info!(endpoint = %config.endpoint, model = %config.model, "http reranker ready");
        Ok(Self { client, config })
    }

    fn rerank_once(
        &self,
        query: &str,
        candidates: &[RerankInput],
        top_n: usize,
    ) -> std::result::Result<Vec<RankedResult>, CallError> {
        let request = RerankRequest {
            model: &self.config.model,
            query,
            documents: candidates.iter().map(|c| c.text.as_str()).collect(),
            top_n,
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
                    CallError::Fatal(Error::Rerank(e.to_string()))
                }
            })?;
        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(CallError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CallError::Fatal(Error::Rerank(format!(
                "HTTP {status}: {body}"
            ))));
        }
        let parsed: RerankResponse = response
            .json()
            .map_err(|e| CallError::Fatal(Error::Rerank(format!("bad response: {e}"))))?;
        let mut ranked = Vec::with_capacity(parsed.results.len());
        for r in parsed.results {
            let candidate = candidates.get(r.index).ok_or_else(|| {
                CallError::Fatal(Error::Rerank(format!(
                    "response references candidate {} of {}",
                    r.index,
                    candidates.len()
                )))
            })?;
            ranked.push(RankedResult {
                chunk_id: candidate.chunk_id.clone(),
                score: r.relevance_score,
                prior_score: self
                    .config
                    .keep_original_score
                    .then_some(candidate.prior_score),
            });
        }
        Ok(ranked)
    }
}

impl Reranker for HttpReranker {
    fn rerank(
        &self,
        query: &str,
        candidates: &[RerankInput],
        top_n: usize,
    ) -> Result<Vec<RankedResult>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        debug!(candidates = candidates.len(), top_n, "reranking");
        let mut ranked = with_retries(&self.config.retry, Error::Rerank, || {
            self.rerank_once(query, candidates, top_n)
        })?;
        ranked.truncate(top_n);
        Ok(ranked)
    }
}

/// Lexical-overlap reranker: score is the fraction of query tokens
/// contained in the candidate text. Deterministic; ties keep candidate
/// order (stable sort).
pub struct OverlapReranker;

impl Reranker for OverlapReranker {
    fn rerank(
        &self,
        query: &str,
        candidates: &[RerankInput],
        top_n: usize,
    ) -> Result<Vec<RankedResult>> {
        let query_lower = query.to_lowercase();
        let query_words: Vec<&str> = query_lower.split_whitespace().collect();
        if query_words.is_empty() {
            return Err(Error::Rerank("empty query".to_string()));
        }
        let mut ranked: Vec<RankedResult> = candidates
            .iter()
            .map(|c| {
                let text_lower = c.text.to_lowercase();
                let mut overlap = 0.0;
                for word in &query_words {
                    if text_lower.contains(word) {
                        overlap += 1.0;
                    }
                }
                RankedResult {
                    chunk_id: c.chunk_id.clone(),
                    score: overlap / query_words.len() as f32,
                    prior_score: Some(c.prior_score),
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_n);
        Ok(ranked)
    }
}

/// Pick the rerank backend: overlap when `APP_USE_FAKE_RERANK` is set,
/// the HTTP backend otherwise.
pub fn default_reranker(config: RerankConfig) -> Result<Arc<dyn Reranker>> {
    let use_fake = std::env::var("APP_USE_FAKE_RERANK")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        info!("using lexical-overlap offline reranker");
        return Ok(Arc::new(OverlapReranker));
    }
    Ok(Arc::new(HttpReranker::new(config)?))
}
