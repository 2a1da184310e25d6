//! ctxr-text
//!
//! Tantivy-based BM25 index over chunk text, the lexical half of the
//! hybrid retriever.

pub mod index;
pub mod tantivy_utils;

pub use index::LexicalIndex;
