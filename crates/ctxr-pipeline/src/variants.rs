//! Retriever variants compared by the evaluation harness.

use std::collections::HashSet;
use std::sync::Arc;

use ctxr_core::config::RetrievalConfig;
use ctxr_core::error::{Error, Result, Stage};
use ctxr_core::traits::{CandidateRetriever, Embedder, Retriever, VectorIndexer};
use ctxr_core::types::{RankedResult, RetrievalCandidate};

/// Embeds the query and searches one vector index. Serves both as a
/// standalone variant and as the vector sub-retriever of the hybrids.
pub struct VectorRetriever {
    name: String,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorIndexer>,
}

impl VectorRetriever {
    pub fn new(
        name: impl Into<String>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorIndexer>,
    ) -> Self {
        Self {
            name: name.into(),
            embedder,
            store,
        }
    }
}

impl CandidateRetriever for VectorRetriever {
    fn retrieve_candidates(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
        let mut vectors = self.embedder.embed_batch(&[query.to_string()])?;
        if vectors.is_empty() {
            return Err(Error::Embedding("no query embedding returned".to_string()));
        }
        let query_vec = vectors.remove(0);
        self.store.search_vec(&query_vec, k)
    }
}

impl Retriever for VectorRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RankedResult>> {
        let candidates = self
            .retrieve_candidates(query, k)
            .map_err(|e| e.at_stage(Stage::Vector))?;
        Ok(candidates
            .into_iter()
            .take(k)
            .map(|c| RankedResult {
                chunk_id: c.chunk_id,
                score: c.score,
                prior_score: None,
            })
            .collect())
    }
}

/// Vector + lexical concatenation without a rerank pass. Engine-native
/// scores are not cross-comparable, so the fused list is stable-sorted
/// descending to produce a deterministic total order.
pub struct FusionRetriever {
    name: String,
    vector: Arc<dyn CandidateRetriever>,
    lexical: Arc<dyn CandidateRetriever>,
    config: RetrievalConfig,
}

impl FusionRetriever {
    pub fn new(
        name: impl Into<String>,
        vector: Arc<dyn CandidateRetriever>,
        lexical: Arc<dyn CandidateRetriever>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            name: name.into(),
            vector,
            lexical,
            config,
        }
    }
}

impl Retriever for FusionRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RankedResult>> {
        let mut candidates = self
            .vector
            .retrieve_candidates(query, self.config.vector_k)
            .map_err(|e| e.at_stage(Stage::Vector))?;
        let lexical = self
            .lexical
            .retrieve_candidates(query, self.config.lexical_k)
            .map_err(|e| e.at_stage(Stage::Lexical))?;
        candidates.extend(lexical);
        // Without a reranker to collapse duplicates, keep the first
        // (higher-priority) occurrence of each chunk.
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.chunk_id.clone()));
        let mut ranked: Vec<RankedResult> = candidates
            .into_iter()
            .map(|c| RankedResult {
                chunk_id: c.chunk_id,
                score: c.score,
                prior_score: None,
            })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        Ok(ranked)
    }
}
