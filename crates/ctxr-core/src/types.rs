//! Domain types shared by the enrichment, indexing and retrieval stages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type DocId = String;
pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Metadata key the enricher writes its situating context under.
pub const CONTEXT_KEY: &str = "context";

/// A source document, immutable once loaded.
///
/// `id` is the stable source identifier (URI or relative path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
}

/// A bounded span of a source document, the atomic unit of retrieval.
///
/// - `id`: `"{doc_id}:{chunk_index}"`, globally unique
/// - `doc_id`: back-reference to the source [`Document`] (not ownership)
/// - `chunk_index`: ordinal position within the document
/// - `start_token`: token offset of the window start within the document
/// - `metadata`: free-form string map; the enricher adds a `"context"` key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: DocId,
    pub chunk_index: usize,
    pub start_token: usize,
    pub content: String,
    pub metadata: Meta,
}

impl Chunk {
    /// The situating context attached by the enricher, if any.
    pub fn context(&self) -> Option<&str> {
        self.metadata.get(CONTEXT_KEY).map(String::as_str)
    }

    /// Text to embed and lexically index: context-prefixed when enriched,
    /// the raw chunk content otherwise.
    pub fn embedding_text(&self) -> String {
        match self.context() {
            Some(ctx) if !ctx.is_empty() => format!("{ctx}\n\n{}", self.content),
            _ => self.content.clone(),
        }
    }
}

/// One embedding per chunk. `embedded_text` records the exact text the
/// vector was computed from when it differs from the chunk content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
    pub embedded_text: Option<String>,
}

/// Indicates which sub-retriever produced a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Lexical,
}

/// A per-query candidate before reranking. `score` is engine-specific
/// but higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// Final ranked output, most relevant first. After a rerank pass,
/// `prior_score` retains the candidate's pre-rerank score alongside the
/// reranker's; `None` when no earlier scoring stage ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub prior_score: Option<f32>,
}

/// Gold evaluation fixture: a question whose expected-relevant chunk is
/// known. Immutable and shared across all retriever variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaPair {
    pub chunk_id: ChunkId,
    pub question: String,
}

/// One aggregated metric row for one retriever. `value` is in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub retriever: String,
    pub metric: String,
    pub value: f32,
}
