//! Hybrid retrieval: fuse vector and lexical candidates, then rerank.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use ctxr_core::config::RetrievalConfig;
use ctxr_core::error::{Error, Result, Stage};
use ctxr_core::traits::{CandidateRetriever, Reranker, RerankInput, Retriever};
use ctxr_core::types::{Chunk, ChunkId, RankedResult, RetrievalCandidate};

/// Combines a vector sub-retriever and a lexical sub-retriever, then
/// asks the reranker for the final ordering.
///
/// Both sub-retrievals run unconditionally; by default their candidate
/// lists are concatenated without deduplication, so the reranker sees a
/// chunk once per engine that surfaced it. Stateless across calls and
/// safe to invoke concurrently.
pub struct HybridRetriever {
    name: String,
    vector: Arc<dyn CandidateRetriever>,
    lexical: Arc<dyn CandidateRetriever>,
    reranker: Arc<dyn Reranker>,
    chunk_texts: Arc<HashMap<ChunkId, String>>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        name: impl Into<String>,
        vector: Arc<dyn CandidateRetriever>,
        lexical: Arc<dyn CandidateRetriever>,
        reranker: Arc<dyn Reranker>,
        chunk_texts: Arc<HashMap<ChunkId, String>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            name: name.into(),
            vector,
            lexical,
            reranker,
            chunk_texts,
            config,
        }
    }

    /// Text lookup handed to the reranker, keyed by chunk id. Uses the
    /// enrichment-aware text so the reranker scores what was indexed.
    pub fn chunk_text_map(chunks: &[Chunk]) -> Arc<HashMap<ChunkId, String>> {
        Arc::new(
            chunks
                .iter()
                .map(|c| (c.id.clone(), c.embedding_text()))
                .collect(),
        )
    }

    fn candidates(&self, query: &str) -> Result<Vec<RetrievalCandidate>> {
        let mut candidates = self
            .vector
            .retrieve_candidates(query, self.config.vector_k)
            .map_err(|e| e.at_stage(Stage::Vector))?;
        let lexical = self
            .lexical
            .retrieve_candidates(query, self.config.lexical_k)
            .map_err(|e| e.at_stage(Stage::Lexical))?;
        candidates.extend(lexical);
        if self.config.dedupe_candidates {
            let mut seen = HashSet::new();
            candidates.retain(|c| seen.insert(c.chunk_id.clone()));
        }
        Ok(candidates)
    }
}

impl Retriever for HybridRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RankedResult>> {
        let candidates = self.candidates(query)?;
        debug!(query, candidates = candidates.len(), "fused candidate set");
        let inputs = candidates
            .iter()
            .map(|c| {
                let text = self.chunk_texts.get(&c.chunk_id).cloned().ok_or_else(|| {
                    Error::Index(format!("candidate '{}' missing from chunk store", c.chunk_id))
                })?;
                Ok(RerankInput {
                    chunk_id: c.chunk_id.clone(),
                    text,
                    prior_score: c.score,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut ranked = self
            .reranker
            .rerank(query, &inputs, k)
            .map_err(|e| e.at_stage(Stage::Rerank))?;
        // Enforce the output contract regardless of backend: stable
        // descending order, bounded length.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        Ok(ranked)
    }
}
