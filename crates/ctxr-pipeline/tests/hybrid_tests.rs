use std::collections::HashMap;
use std::sync::Arc;

use ctxr_core::config::RetrievalConfig;
use ctxr_core::error::{Error, Result, Stage};
use ctxr_core::traits::{CandidateRetriever, Reranker, RerankInput, Retriever};
use ctxr_core::types::{ChunkId, RankedResult, RetrievalCandidate, SourceKind};
use ctxr_pipeline::HybridRetriever;
use ctxr_services::rerank::OverlapReranker;

struct StaticCandidates {
    hits: Vec<RetrievalCandidate>,
}

impl StaticCandidates {
    fn new(source: SourceKind, ids: &[(&str, f32)]) -> Self {
        Self {
            hits: ids
                .iter()
                .map(|(id, score)| RetrievalCandidate {
                    chunk_id: (*id).to_string(),
                    score: *score,
                    source,
                })
                .collect(),
        }
    }
}

impl CandidateRetriever for StaticCandidates {
    fn retrieve_candidates(&self, _query: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

struct FailingCandidates;

impl CandidateRetriever for FailingCandidates {
    fn retrieve_candidates(&self, _query: &str, _k: usize) -> Result<Vec<RetrievalCandidate>> {
        Err(Error::Index("segment unreadable".to_string()))
    }
}

struct FailingReranker;

impl Reranker for FailingReranker {
    fn rerank(
        &self,
        _query: &str,
        _candidates: &[RerankInput],
        _top_n: usize,
    ) -> Result<Vec<RankedResult>> {
        Err(Error::Rerank("backend down".to_string()))
    }
}

fn texts(entries: &[(&str, &str)]) -> Arc<HashMap<ChunkId, String>> {
    Arc::new(
        entries
            .iter()
            .map(|(id, text)| ((*id).to_string(), (*text).to_string()))
            .collect(),
    )
}

fn vector_side() -> Arc<dyn CandidateRetriever> {
    Arc::new(StaticCandidates::new(
        SourceKind::Vector,
        &[("a", 0.9), ("b", 0.8), ("c", 0.7)],
    ))
}

fn lexical_side() -> Arc<dyn CandidateRetriever> {
    Arc::new(StaticCandidates::new(
        SourceKind::Lexical,
        &[("b", 12.0), ("d", 8.0)],
    ))
}

fn chunk_texts() -> Arc<HashMap<ChunkId, String>> {
    texts(&[
        ("a", "ferrets are mustelids"),
        ("b", "ferrets sleep most of the day"),
        ("c", "badgers dig setts"),
        ("d", "weasels hunt voles"),
    ])
}

fn hybrid(config: RetrievalConfig) -> HybridRetriever {
    HybridRetriever::new(
        "hybrid",
        vector_side(),
        lexical_side(),
        Arc::new(OverlapReranker),
        chunk_texts(),
        config,
    )
}

#[test]
fn results_are_bounded_and_sorted_descending() {
    let retriever = hybrid(RetrievalConfig::default());
    let results = retriever.retrieve("ferrets sleep", 3).expect("retrieve");
    assert!(results.len() <= 3);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    // "b" matches both query tokens and must lead.
    assert_eq!(results[0].chunk_id, "b");
}

#[test]
fn results_carry_the_candidates_engine_scores() {
    let retriever = hybrid(RetrievalConfig::default());
    let results = retriever.retrieve("ferrets sleep", 10).expect("retrieve");
    // Every candidate came from a scoring engine, so every result must
    // retain that score next to the rerank score.
    assert!(results.iter().all(|r| r.prior_score.is_some()));
    let top = results.iter().find(|r| r.chunk_id == "b").expect("b ranked");
    assert!(top.prior_score == Some(0.8) || top.prior_score == Some(12.0));
}

#[test]
fn duplicates_reach_the_reranker_by_default() {
    let retriever = hybrid(RetrievalConfig::default());
    // k large enough to not truncate "b"'s second occurrence away.
    let results = retriever.retrieve("ferrets sleep", 10).expect("retrieve");
    let b_count = results.iter().filter(|r| r.chunk_id == "b").count();
    assert_eq!(b_count, 2, "both engines' evidence for b survives");
}

#[test]
fn dedupe_toggle_collapses_duplicates_before_rerank() {
    let retriever = hybrid(RetrievalConfig {
        dedupe_candidates: true,
        ..RetrievalConfig::default()
    });
    let results = retriever.retrieve("ferrets sleep", 10).expect("retrieve");
    let mut ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), results.len(), "no chunk id appears twice");
}

#[test]
fn repeated_queries_are_deterministic() {
    let retriever = hybrid(RetrievalConfig::default());
    let first = retriever.retrieve("ferrets sleep", 5).expect("retrieve");
    let second = retriever.retrieve("ferrets sleep", 5).expect("retrieve");
    let ids = |rs: &[RankedResult]| rs.iter().map(|r| r.chunk_id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn vector_stage_failures_are_attributed() {
    let retriever = HybridRetriever::new(
        "hybrid",
        Arc::new(FailingCandidates),
        lexical_side(),
        Arc::new(OverlapReranker),
        chunk_texts(),
        RetrievalConfig::default(),
    );
    match retriever.retrieve("ferrets", 5) {
        Err(Error::Retrieval { stage, .. }) => assert_eq!(stage, Stage::Vector),
        other => panic!("expected vector-stage error, got {other:?}"),
    }
}

#[test]
fn lexical_stage_failures_are_attributed() {
    let retriever = HybridRetriever::new(
        "hybrid",
        vector_side(),
        Arc::new(FailingCandidates),
        Arc::new(OverlapReranker),
        chunk_texts(),
        RetrievalConfig::default(),
    );
    match retriever.retrieve("ferrets", 5) {
        Err(Error::Retrieval { stage, .. }) => assert_eq!(stage, Stage::Lexical),
        other => panic!("expected lexical-stage error, got {other:?}"),
    }
}

#[test]
fn rerank_failures_are_attributed() {
    let retriever = HybridRetriever::new(
        "hybrid",
        vector_side(),
        lexical_side(),
        Arc::new(FailingReranker),
        chunk_texts(),
        RetrievalConfig::default(),
    );
    match retriever.retrieve("ferrets", 5) {
        Err(Error::Retrieval { stage, .. }) => assert_eq!(stage, Stage::Rerank),
        other => panic!("expected rerank-stage error, got {other:?}"),
    }
}

#[test]
fn candidate_missing_from_chunk_store_is_an_error() {
    let retriever = HybridRetriever::new(
        "hybrid",
        vector_side(),
        lexical_side(),
        Arc::new(OverlapReranker),
        texts(&[("a", "only a is known")]),
        RetrievalConfig::default(),
    );
    assert!(matches!(retriever.retrieve("ferrets", 5), Err(Error::Index(_))));
}
