//! ctxr-services
//!
//! Backends for the pipeline's external capabilities: document loading,
//! embedding, text generation and reranking. Each capability has a remote
//! HTTP backend and a deterministic offline stand-in selected by env, so
//! the pipeline runs both against real services and air-gapped.

pub mod embedding;
pub mod generate;
pub mod html;
pub mod loader;
pub mod rerank;
pub mod retry;

pub use embedding::{default_embedder, HashedEmbedder, HttpEmbedder, HttpEmbedderConfig};
pub use generate::{default_generator, ExtractiveGenerator, HttpGenerator, HttpGeneratorConfig};
pub use loader::{FileLoader, HttpLoader, InMemoryCorpus, LoaderConfig};
pub use rerank::{default_reranker, HttpReranker, OverlapReranker, RerankConfig};
