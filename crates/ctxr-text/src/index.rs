use std::path::{Path, PathBuf};

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{doc, Index, TantivyDocument};
use tracing::debug;

use ctxr_core::error::{Error, Result};
use ctxr_core::traits::{CandidateRetriever, TextIndexer};
use ctxr_core::types::{Chunk, RetrievalCandidate, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer};

/// BM25 index over chunk text. Indexes the enrichment-aware
/// [`Chunk::embedding_text`] so context-prefixed chunks are searchable
/// by their situating context too.
pub struct LexicalIndex {
    index: Index,
    id_field: tantivy::schema::Field,
    doc_id_field: tantivy::schema::Field,
    text_field: tantivy::schema::Field,
}

impl LexicalIndex {
    /// Create a fresh index directory, replacing any previous one.
    pub fn create(index_dir: PathBuf) -> Result<Self> {
        let schema = build_schema();
        if index_dir.exists() {
            std::fs::remove_dir_all(&index_dir)?;
        }
        std::fs::create_dir_all(&index_dir)?;
        let index = Index::create_in_dir(&index_dir, schema.clone())
            .map_err(|e| Error::Index(e.to_string()))?;
        Self::from_index(index, schema)
    }

    /// Open an existing index directory.
    pub fn open(index_dir: &Path) -> Result<Self> {
        let index = Index::open_in_dir(index_dir).map_err(|e| Error::Index(e.to_string()))?;
        let schema = index.schema();
        Self::from_index(index, schema)
    }

    /// In-memory index, used by tests and one-shot runs.
    pub fn in_memory() -> Result<Self> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema.clone());
        Self::from_index(index, schema)
    }

    fn from_index(index: Index, schema: tantivy::schema::Schema) -> Result<Self> {
        register_tokenizer(&index);
        let id_field = schema
            .get_field("id")
            .map_err(|e| Error::Index(e.to_string()))?;
        let doc_id_field = schema
            .get_field("doc_id")
            .map_err(|e| Error::Index(e.to_string()))?;
        let text_field = schema
            .get_field("text")
            .map_err(|e| Error::Index(e.to_string()))?;
        Ok(Self {
            index,
            id_field,
            doc_id_field,
            text_field,
        })
    }
}

impl TextIndexer for LexicalIndex {
    fn index(&self, chunks: &[Chunk]) -> Result<()> {
        let mut writer = self
            .index
            .writer(50_000_000)
            .map_err(|e| Error::Index(e.to_string()))?;
        for c in chunks {
            let d = doc!(
                self.id_field => c.id.clone(),
                self.doc_id_field => c.doc_id.clone(),
                self.text_field => c.embedding_text(),
            );
            writer
                .add_document(d)
                .map_err(|e| Error::Index(e.to_string()))?;
        }
        writer.commit().map_err(|e| Error::Index(e.to_string()))?;
        debug!(count = chunks.len(), "committed chunks to lexical index");
        Ok(())
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
        let reader = self.index.reader().map_err(|e| Error::Index(e.to_string()))?;
        let searcher = reader.searcher();
        let qp = QueryParser::for_index(&self.index, vec![self.text_field]);
        // Lenient parse: natural-language questions carry punctuation the
        // query grammar does not accept.
        let (q, _errors) = qp.parse_query_lenient(query);
        let top_docs = searcher
            .search(&q, &TopDocs::with_limit(k))
            .map_err(|e| Error::Index(e.to_string()))?;
        let mut hits = Vec::new();
        for (score, addr) in top_docs {
            let d: TantivyDocument = searcher.doc(addr).map_err(|e| Error::Index(e.to_string()))?;
            let id = d
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            hits.push(RetrievalCandidate {
                chunk_id: id,
                score,
                source: SourceKind::Lexical,
            });
        }
        Ok(hits)
    }
}

impl CandidateRetriever for LexicalIndex {
    fn retrieve_candidates(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
        TextIndexer::search(self, query, k)
    }
}
