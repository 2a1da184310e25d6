use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ctxr_core::config::SplitterConfig;
use ctxr_core::error::{Error, Result};
use ctxr_core::splitter::ChunkSplitter;
use ctxr_core::traits::{DocumentSource, Generator};
use ctxr_core::types::Document;
use ctxr_pipeline::{Enricher, EnricherConfig};
use ctxr_services::generate::ExtractiveGenerator;
use ctxr_services::loader::InMemoryCorpus;

/// Counts fetches per document id so memoization is observable.
struct CountingSource {
    docs: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl CountingSource {
    fn new(docs: &[Document]) -> Self {
        Self {
            docs: docs.iter().map(|d| (d.id.clone(), d.text.clone())).collect(),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl DocumentSource for CountingSource {
    fn fetch(&self, id: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.docs.get(id).cloned().ok_or_else(|| Error::Fetch {
            source_id: id.to_string(),
            reason: "unknown document".to_string(),
        })
    }
}

/// Fails generation for chunks whose content holds a marker token.
struct FlakyGenerator;

impl Generator for FlakyGenerator {
    fn complete(&self, prompt: &str, _max_tokens: usize, _temperature: f32) -> Result<String> {
        if prompt.contains("POISON") {
            return Err(Error::Generation {
                chunk_id: String::new(),
                reason: "backend refused".to_string(),
            });
        }
        Ok("a situating sentence".to_string())
    }
}

fn corpus() -> Vec<Document> {
    vec![
        Document {
            id: "guide.txt".to_string(),
            text: (0..40).map(|i| format!("alpha{i}")).collect::<Vec<_>>().join(" "),
        },
        Document {
            id: "manual.txt".to_string(),
            text: (0..40).map(|i| format!("beta{i}")).collect::<Vec<_>>().join(" "),
        },
    ]
}

fn split(docs: &[Document]) -> Vec<ctxr_core::types::Chunk> {
    ChunkSplitter::new(SplitterConfig {
        chunk_size: 10,
        chunk_overlap: 2,
    })
    .expect("valid config")
    .split_all(docs)
}

#[test]
fn enrichment_adds_context_and_preserves_content_and_order() {
    let docs = corpus();
    let chunks = split(&docs);
    let source = Arc::new(InMemoryCorpus::from_documents(&docs));
    let mut enricher = Enricher::new(source, Arc::new(ExtractiveGenerator), EnricherConfig::default());

    let report = enricher.enrich(&chunks).expect("enrich");
    assert!(report.is_complete());
    assert_eq!(report.enriched.len(), chunks.len());
    for (original, enriched) in chunks.iter().zip(report.enriched.iter()) {
        assert_eq!(enriched.id, original.id, "output order matches input order");
        assert_eq!(enriched.content, original.content, "chunk content untouched");
        let ctx = enriched.context().expect("context attached");
        assert!(!ctx.is_empty());
        assert!(enriched.embedding_text().starts_with(ctx));
        assert!(enriched.embedding_text().ends_with(&original.content));
    }
    // Inputs themselves stay unenriched.
    assert!(chunks.iter().all(|c| c.context().is_none()));
}

#[test]
fn document_fetches_are_memoized_per_run() {
    let docs = corpus();
    let chunks = split(&docs);
    assert!(chunks.len() > docs.len(), "several chunks per document");
    let source = Arc::new(CountingSource::new(&docs));
    let mut enricher = Enricher::new(
        Arc::clone(&source) as Arc<dyn DocumentSource>,
        Arc::new(ExtractiveGenerator),
        EnricherConfig::default(),
    );

    enricher.enrich(&chunks).expect("enrich");
    assert_eq!(
        source.fetches.load(Ordering::SeqCst),
        docs.len(),
        "one fetch per document regardless of chunk count"
    );
}

#[test]
fn unfetchable_documents_fail_per_chunk_not_per_run() {
    let docs = corpus();
    let mut chunks = split(&docs);
    // Point one chunk at a document the source does not have.
    chunks[1].doc_id = "missing.txt".to_string();
    let source = Arc::new(CountingSource::new(&docs));
    let mut enricher = Enricher::new(source, Arc::new(ExtractiveGenerator), EnricherConfig::default());

    let report = enricher.enrich(&chunks).expect("partial enrich");
    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].chunk_id, chunks[1].id);
    assert!(matches!(report.failures[0].error, Error::Fetch { .. }));
    assert_eq!(report.enriched.len(), chunks.len() - 1);
}

#[test]
fn corpus_miss_is_a_consistency_error_carrying_both_ids() {
    let docs = corpus();
    let mut chunks = split(&docs);
    chunks[0].doc_id = "phantom.txt".to_string();
    let source = Arc::new(InMemoryCorpus::from_documents(&docs));
    let mut enricher = Enricher::new(source, Arc::new(ExtractiveGenerator), EnricherConfig::default());

    let report = enricher.enrich(&chunks).expect("partial enrich");
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0].error {
        Error::Consistency { chunk_id, doc_id } => {
            assert_eq!(chunk_id, &chunks[0].id);
            assert_eq!(doc_id, "phantom.txt");
        }
        other => panic!("expected consistency error, got {other}"),
    }
}

#[test]
fn generation_failure_aborts_with_the_offending_chunk_id() {
    let doc = Document {
        id: "d".to_string(),
        text: "one two three four five six seven eight POISON ten eleven twelve".to_string(),
    };
    let chunks = ChunkSplitter::new(SplitterConfig {
        chunk_size: 4,
        chunk_overlap: 0,
    })
    .expect("valid config")
    .split(&doc);
    let poisoned = chunks
        .iter()
        .find(|c| c.content.contains("POISON"))
        .expect("marker chunk")
        .id
        .clone();
    let source = Arc::new(InMemoryCorpus::from_documents(std::slice::from_ref(&doc)));
    let mut enricher = Enricher::new(source, Arc::new(FlakyGenerator), EnricherConfig::default());

    match enricher.enrich(&chunks) {
        Err(Error::Generation { chunk_id, .. }) => assert_eq!(chunk_id, poisoned),
        other => panic!("expected generation error, got {other:?}"),
    }
}

#[test]
fn progress_signal_counts_every_chunk() {
    let docs = corpus();
    let chunks = split(&docs);
    let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let source = Arc::new(InMemoryCorpus::from_documents(&docs));
    let mut enricher = Enricher::new(source, Arc::new(ExtractiveGenerator), EnricherConfig::default())
        .with_progress(move |done, total| sink.lock().unwrap().push((done, total)));

    enricher.enrich(&chunks).expect("enrich");
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), chunks.len());
    assert_eq!(*seen.last().unwrap(), (chunks.len(), chunks.len()));
    assert!(seen.windows(2).all(|w| w[0].0 + 1 == w[1].0));
}
