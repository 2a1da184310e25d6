//! ctxr-pipeline
//!
//! The pipeline's core stages: contextual enrichment, hybrid
//! retrieval-and-rerank, gold-set generation and the evaluation harness.

pub mod enrich;
pub mod eval;
pub mod golden;
pub mod hybrid;
pub mod variants;

pub use enrich::{Enricher, EnricherConfig, EnrichmentReport};
pub use eval::EvaluationHarness;
pub use golden::QuestionGenerator;
pub use hybrid::HybridRetriever;
pub use variants::{FusionRetriever, VectorRetriever};
