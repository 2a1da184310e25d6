//! ctxr-vector
//!
//! LanceDB-backed vector store. The table is also the persisted pipeline
//! state: it round-trips chunk id, content, metadata and embedding, so a
//! restarted run can reload instead of re-embedding.

pub mod schema;
pub mod store;

pub use store::LanceVectorStore;
