//! Configuration loader.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*`
//! env vars, plus typed sections for the pipeline knobs.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("failed to get '{key}': {e}")))
    }

    /// Extract a typed section, falling back to its defaults when the
    /// section is absent from every source.
    pub fn section<T>(&self, key: &str) -> T
    where
        T: serde::de::DeserializeOwned + Default,
    {
        self.figment.extract_inner(key).unwrap_or_default()
    }
}

/// Chunk splitter knobs. Sizes are in whitespace tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 51,
        }
    }
}

impl SplitterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be non-zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Hybrid retrieval knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates requested from the vector sub-retriever.
    pub vector_k: usize,
    /// Candidates requested from the lexical sub-retriever.
    pub lexical_k: usize,
    /// Final result count after reranking.
    pub top_n: usize,
    /// Collapse duplicate chunk ids before reranking. Off by default:
    /// the reranker then sees both engines' evidence for a chunk.
    pub dedupe_candidates: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_k: 10,
            lexical_k: 10,
            top_n: 5,
            dedupe_candidates: false,
        }
    }
}

/// Evaluation harness knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Questions generated per chunk for the gold set.
    pub questions_per_chunk: usize,
    /// Bounded fan-out for per-question retrieval.
    pub concurrency: usize,
    /// Ranked-list depth requested from each retriever under test.
    pub retrieve_k: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            questions_per_chunk: 2,
            concurrency: 4,
            retrieve_k: 5,
        }
    }
}
