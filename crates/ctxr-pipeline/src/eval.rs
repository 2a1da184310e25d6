//! Retrieval-quality metrics and the evaluation harness.

use std::sync::Arc;

use futures::StreamExt;
use tracing::info;

use ctxr_core::config::EvalConfig;
use ctxr_core::error::{Error, Result};
use ctxr_core::traits::Retriever;
use ctxr_core::types::{ChunkId, EvaluationRecord, QaPair, RankedResult};

pub const METRICS: [&str; 3] = ["hit_rate", "mrr", "recall"];

/// 1.0 if any expected chunk appears in the results, else 0.0.
pub fn hit_rate(expected: &[ChunkId], results: &[RankedResult]) -> f32 {
    if results.iter().any(|r| expected.contains(&r.chunk_id)) {
        1.0
    } else {
        0.0
    }
}

/// Reciprocal of the 1-indexed rank of the first expected chunk, or 0.0.
pub fn mrr(expected: &[ChunkId], results: &[RankedResult]) -> f32 {
    for (i, r) in results.iter().enumerate() {
        if expected.contains(&r.chunk_id) {
            return 1.0 / (i as f32 + 1.0);
        }
    }
    0.0
}

/// |expected ∩ returned| / |expected|. Generic over multi-chunk gold
/// sets; equal to hit_rate when one chunk is expected.
pub fn recall(expected: &[ChunkId], results: &[RankedResult]) -> f32 {
    if expected.is_empty() {
        return 0.0;
    }
    let found = expected
        .iter()
        .filter(|id| results.iter().any(|r| &r.chunk_id == *id))
        .count();
    found as f32 / expected.len() as f32
}

/// Scores retriever variants against a shared gold set.
///
/// Per-question retrievals run with bounded concurrency; results are
/// collected back in gold-set order before aggregation, so output is
/// reproducible for a fixed gold set.
pub struct EvaluationHarness {
    concurrency: usize,
    retrieve_k: usize,
}

impl EvaluationHarness {
    pub fn new(config: &EvalConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            retrieve_k: config.retrieve_k,
        }
    }

    /// One row per metric, mean-aggregated over all QA pairs.
    pub fn evaluate(
        &self,
        retriever: Arc<dyn Retriever>,
        gold: &[QaPair],
    ) -> Result<Vec<EvaluationRecord>> {
        if gold.is_empty() {
            return Err(Error::InvalidConfig("empty gold set".to_string()));
        }
        let result_lists = self.retrieve_all(Arc::clone(&retriever), gold)?;

        let mut sums = [0.0f32; 3];
        for (qa, results) in gold.iter().zip(result_lists.iter()) {
            let expected = std::slice::from_ref(&qa.chunk_id);
            sums[0] += hit_rate(expected, results);
            sums[1] += mrr(expected, results);
            sums[2] += recall(expected, results);
        }
        let n = gold.len() as f32;
        let records = METRICS
            .iter()
            .zip(sums.iter())
            .map(|(metric, sum)| EvaluationRecord {
                retriever: retriever.name().to_string(),
                metric: (*metric).to_string(),
                value: sum / n,
            })
            .collect();
        info!(retriever = retriever.name(), questions = gold.len(), "evaluated");
        Ok(records)
    }

    /// Evaluate several variants against the same gold set.
    pub fn evaluate_all(
        &self,
        retrievers: &[Arc<dyn Retriever>],
        gold: &[QaPair],
    ) -> Result<Vec<EvaluationRecord>> {
        let mut records = Vec::with_capacity(retrievers.len() * METRICS.len());
        for retriever in retrievers {
            records.extend(self.evaluate(Arc::clone(retriever), gold)?);
        }
        Ok(records)
    }

    /// Run every question through the retriever, bounded fan-out,
    /// ordered collection.
    fn retrieve_all(
        &self,
        retriever: Arc<dyn Retriever>,
        gold: &[QaPair],
    ) -> Result<Vec<Vec<RankedResult>>> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let k = self.retrieve_k;
        rt.block_on(async {
            let tasks = gold.iter().map(|qa| {
                let retriever = Arc::clone(&retriever);
                let question = qa.question.clone();
                async move {
                    let q = question.clone();
                    tokio::task::spawn_blocking(move || retriever.retrieve(&q, k))
                        .await
                        .map_err(|e| Error::Operation(format!("evaluation task: {e}")))?
                        .map_err(|e| Error::Evaluation {
                            question,
                            source: Box::new(e),
                        })
                }
            });
            futures::stream::iter(tasks)
                .buffered(self.concurrency)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(ids: &[&str]) -> Vec<RankedResult> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| RankedResult {
                chunk_id: (*id).to_string(),
                score: 1.0 - i as f32 * 0.1,
                prior_score: None,
            })
            .collect()
    }

    #[test]
    fn hit_rate_is_binary() {
        let expected = vec!["c1".to_string()];
        assert_eq!(hit_rate(&expected, &results(&["a", "c1", "b"])), 1.0);
        assert_eq!(hit_rate(&expected, &results(&["a", "b"])), 0.0);
    }

    #[test]
    fn mrr_uses_one_indexed_rank() {
        let expected = vec!["c1".to_string()];
        assert_eq!(mrr(&expected, &results(&["c1", "a"])), 1.0);
        assert!((mrr(&expected, &results(&["a", "b", "c1"])) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(mrr(&expected, &results(&["a", "b"])), 0.0);
    }

    #[test]
    fn mrr_bounds_follow_hit_rate() {
        let expected = vec!["c1".to_string()];
        let rs = results(&["a", "b", "c", "c1", "e"]);
        let k = rs.len() as f32;
        assert!(mrr(&expected, &rs) >= hit_rate(&expected, &rs) / k);
    }

    #[test]
    fn recall_generalizes_over_gold_sets() {
        let expected = vec!["c1".to_string(), "c2".to_string()];
        assert_eq!(recall(&expected, &results(&["c1", "x"])), 0.5);
        assert_eq!(recall(&expected, &results(&["c1", "c2"])), 1.0);
        assert_eq!(recall(&expected, &results(&["x"])), 0.0);
        // single-chunk gold degenerates to hit_rate
        let single = vec!["c1".to_string()];
        let rs = results(&["a", "c1"]);
        assert_eq!(recall(&single, &rs), hit_rate(&single, &rs));
    }
}
