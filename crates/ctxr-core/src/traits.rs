//! Capability seams between the pipeline and its collaborators.
//!
//! Every external service (document fetch, embedding, generation, rerank)
//! and every retriever variant sits behind one of these traits so the
//! enricher, hybrid retriever and evaluation harness stay backend-agnostic.

use crate::error::Result;
use crate::types::{Chunk, ChunkId, EmbeddingRecord, RankedResult, RetrievalCandidate};

/// Resolves a source document id to its full plain text.
pub trait DocumentSource: Send + Sync {
    fn fetch(&self, id: &str) -> Result<String>;
}

/// Text-generation capability (enrichment contexts, gold questions).
pub trait Generator: Send + Sync {
    fn complete(&self, prompt: &str, max_tokens: usize, temperature: f32) -> Result<String>;
}

/// Fixed-dimension text embedding. The same instance must embed both
/// chunks at index time and queries at retrieval time.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub trait TextIndexer: Send + Sync {
    fn index(&self, chunks: &[Chunk]) -> Result<()>;
    fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>>;
}

pub trait VectorIndexer: Send + Sync {
    /// `chunks` and `records` are paired 1:1 by position and chunk id.
    fn index(&self, chunks: &[Chunk], records: &[EmbeddingRecord]) -> Result<()>;
    fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievalCandidate>>;
}

/// A sub-retriever feeding the hybrid fusion: query in, scored
/// candidates out.
pub trait CandidateRetriever: Send + Sync {
    fn retrieve_candidates(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>>;
}

/// One (chunk id, text) pair handed to a reranker.
#[derive(Debug, Clone)]
pub struct RerankInput {
    pub chunk_id: ChunkId,
    pub text: String,
    pub prior_score: f32,
}

/// Cross-encoder style second-pass scoring. Implementations must be
/// deterministic: equal scores keep candidate order.
pub trait Reranker: Send + Sync {
    fn rerank(
        &self,
        query: &str,
        candidates: &[RerankInput],
        top_n: usize,
    ) -> Result<Vec<RankedResult>>;
}

/// A complete retriever variant as seen by the evaluation harness.
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RankedResult>>;
}
