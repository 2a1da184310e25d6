//! Text-generation backends for enrichment contexts and gold questions.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ctxr_core::error::{Error, Result};
use ctxr_core::prompts::{chunk_body, QUESTIONS_MARKER};
use ctxr_core::traits::Generator;

use crate::retry::{with_retries, CallError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for HttpGeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completion client.
pub struct HttpGenerator {
    client: Client,
    config: HttpGeneratorConfig,
}

impl HttpGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self> {
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
        info!(endpoint = %config.endpoint, model = %config.model, "http generator ready");
        Ok(Self { client, config })
    }

    fn complete_once(
        &self,
        prompt: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> std::result::Result<String, CallError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature,
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
                    CallError::Fatal(generation_error(e.to_string()))
                }
            })?;
        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(CallError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CallError::Fatal(generation_error(format!(
                "HTTP {status}: {body}"
            ))));
        }
        let parsed: ChatResponse = response
            .json()
            .map_err(|e| CallError::Fatal(generation_error(format!("bad response: {e}"))))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }
}

impl Generator for HttpGenerator {
    fn complete(&self, prompt: &str, max_tokens: usize, temperature: f32) -> Result<String> {
        debug!(prompt_chars = prompt.len(), max_tokens, "generating completion");
        let wrap = |reason: String| generation_error(reason);
        let text = with_retries(&self.config.retry, wrap, || {
            self.complete_once(prompt, max_tokens, temperature)
        })?;
        let trimmed = text.trim().to_string();
        if trimmed.is_empty() {
            return Err(generation_error("empty completion".to_string()));
        }
        Ok(trimmed)
    }
}

/// Deterministic offline generator. Recognizes the pipeline's two prompt
/// templates by their markers and produces extractive stand-in output:
/// a situating sentence built from the chunk's opening words, or a
/// numbered question list. For air-gapped runs and fixtures only.
pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    fn opening_words(text: &str, n: usize) -> String {
        text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
    }
}

impl Generator for ExtractiveGenerator {
    fn complete(&self, prompt: &str, _max_tokens: usize, _temperature: f32) -> Result<String> {
        let chunk = chunk_body(prompt)
            .ok_or_else(|| generation_error("prompt carries no chunk body".to_string()))?;
        if prompt.contains(QUESTIONS_MARKER) {
            let n = prompt
                .split("exactly ")
                .nth(1)
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|tok| tok.parse::<usize>().ok())
                .unwrap_or(2);
            let opening = Self::opening_words(chunk, 8);
            let lines: Vec<String> = (1..=n)
                .map(|i| format!("{i}. What does the passage beginning \"{opening}\" state (part {i})?"))
                .collect();
            Ok(lines.join("\n"))
        } else {
            Ok(format!(
                "This chunk, beginning \"{}\", is part of the surrounding document.",
                Self::opening_words(chunk, 8)
            ))
        }
    }
}

fn generation_error(reason: String) -> Error {
    // The backend cannot know which chunk it is serving; callers attach
    // the id via Error::for_chunk.
    Error::Generation {
        chunk_id: String::new(),
        reason,
    }
}

/// Pick the generation backend: extractive when `APP_USE_FAKE_GENERATION`
/// is set, the HTTP backend otherwise.
pub fn default_generator(config: HttpGeneratorConfig) -> Result<Arc<dyn Generator>> {
    let use_fake = std::env::var("APP_USE_FAKE_GENERATION")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        info!("using extractive offline generator");
        return Ok(Arc::new(ExtractiveGenerator));
    }
    Ok(Arc::new(HttpGenerator::new(config)?))
}
