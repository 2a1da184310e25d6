//! Contextual enrichment: attach an LLM-generated situating context to
//! each chunk before embedding.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use ctxr_core::error::{Error, Result};
use ctxr_core::prompts;
use ctxr_core::traits::{DocumentSource, Generator};
use ctxr_core::types::{Chunk, ChunkId, DocId, CONTEXT_KEY};

#[derive(Debug, Clone)]
pub struct EnricherConfig {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.0,
        }
    }
}

/// A chunk that could not be enriched, with the typed cause.
#[derive(Debug)]
pub struct ChunkFailure {
    pub chunk_id: ChunkId,
    pub error: Error,
}

/// Outcome of one enrichment run. Partial success is explicit: callers
/// must check `failures` before indexing `enriched`.
#[derive(Debug, Default)]
pub struct EnrichmentReport {
    pub enriched: Vec<Chunk>,
    pub failures: Vec<ChunkFailure>,
}

impl EnrichmentReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Serial enrichment pass over chunks.
///
/// Holds a per-run, append-only cache of full document texts so each
/// source document is fetched at most once regardless of how many chunks
/// reference it. The cache lives exactly as long as the enricher.
pub struct Enricher {
    source: Arc<dyn DocumentSource>,
    generator: Arc<dyn Generator>,
    config: EnricherConfig,
    cache: HashMap<DocId, String>,
    progress: Option<ProgressFn>,
}

impl Enricher {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        generator: Arc<dyn Generator>,
        config: EnricherConfig,
    ) -> Self {
        Self {
            source,
            generator,
            config,
            cache: HashMap::new(),
            progress: None,
        }
    }

    /// Observational per-chunk progress signal `(done, total)`.
    pub fn with_progress(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Enrich every chunk, producing copies with a `"context"` metadata
    /// entry. Output order matches input order 1:1 for the successful
    /// chunks; fetch and consistency failures are collected per chunk
    /// instead of aborting the batch. Generation failures abort the run
    /// with the offending chunk id attached.
    pub fn enrich(&mut self, chunks: &[Chunk]) -> Result<EnrichmentReport> {
        let total = chunks.len();
        let mut report = EnrichmentReport::default();
        for (i, chunk) in chunks.iter().enumerate() {
            match self.document_text(chunk) {
                Ok(doc_text) => {
                    let doc_text = doc_text.to_string();
                    report.enriched.push(self.enrich_one(chunk, &doc_text)?);
                }
                Err(e @ (Error::Fetch { .. } | Error::Consistency { .. })) => {
                    debug!(chunk = %chunk.id, error = %e, "skipping chunk, source unavailable");
                    report.failures.push(ChunkFailure {
                        chunk_id: chunk.id.clone(),
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
            if let Some(p) = &self.progress {
                p(i + 1, total);
            }
        }
        info!(
            enriched = report.enriched.len(),
            failed = report.failures.len(),
            "enrichment run finished"
        );
        Ok(report)
    }

    fn enrich_one(&self, chunk: &Chunk, doc_text: &str) -> Result<Chunk> {
        let prompt = prompts::situating_context(doc_text, &chunk.content);
        let completion = self
            .generator
            .complete(&prompt, self.config.max_tokens, self.config.temperature)
            .map_err(|e| e.for_chunk(&chunk.id))?;
        let context = completion.trim().to_string();
        if context.is_empty() {
            return Err(Error::Generation {
                chunk_id: chunk.id.clone(),
                reason: "empty situating context".to_string(),
            });
        }
        let mut enriched = chunk.clone();
        enriched.metadata.insert(CONTEXT_KEY.to_string(), context);
        Ok(enriched)
    }

    /// Full text of the chunk's source document, fetched lazily and
    /// memoized for the rest of the run.
    fn document_text(&mut self, chunk: &Chunk) -> Result<&str> {
        if !self.cache.contains_key(&chunk.doc_id) {
            let text = self
                .source
                .fetch(&chunk.doc_id)
                .map_err(|e| e.for_chunk(&chunk.id))?;
            debug!(doc = %chunk.doc_id, chars = text.len(), "cached document text");
            self.cache.insert(chunk.doc_id.clone(), text);
        }
        self.cache
            .get(&chunk.doc_id)
            .map(String::as_str)
            .ok_or_else(|| Error::Operation("document cache lost an entry".to_string()))
    }
}
