use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use ctxr_core::config::{Config, EvalConfig, RetrievalConfig, SplitterConfig};
use ctxr_core::splitter::ChunkSplitter;
use ctxr_core::traits::{CandidateRetriever, Embedder, Retriever, TextIndexer, VectorIndexer};
use ctxr_core::types::{Chunk, EmbeddingRecord};
use ctxr_pipeline::{
    Enricher, EnricherConfig, EvaluationHarness, FusionRetriever, HybridRetriever,
    QuestionGenerator, VectorRetriever,
};
use ctxr_services::{
    default_embedder, default_generator, default_reranker, loader::load_documents, FileLoader,
    HttpEmbedderConfig, HttpGeneratorConfig, InMemoryCorpus, RerankConfig,
};
use ctxr_text::LexicalIndex;
use ctxr_vector::LanceVectorStore;

const PLAIN_TABLE: &str = "chunks_plain";
const CONTEXTUAL_TABLE: &str = "chunks_contextual";
const VARIANTS: [&str; 4] = [
    "baseline-vector",
    "contextual-vector",
    "contextual-fusion",
    "contextual-rerank",
];

struct Paths {
    docs_dir: PathBuf,
    tantivy_dir: PathBuf,
    lancedb_dir: PathBuf,
}

impl Paths {
    fn from_config(config: &Config) -> Self {
        Self {
            docs_dir: PathBuf::from(
                config
                    .get::<String>("data.docs_dir")
                    .unwrap_or_else(|_| "data/docs".to_string()),
            ),
            tantivy_dir: PathBuf::from(
                config
                    .get::<String>("data.tantivy_index_dir")
                    .unwrap_or_else(|_| "data/indexes/tantivy".to_string()),
            ),
            lancedb_dir: PathBuf::from(
                config
                    .get::<String>("data.lancedb_dir")
                    .unwrap_or_else(|_| "data/indexes/lancedb".to_string()),
            ),
        }
    }
}

fn embedder_config(config: &Config) -> HttpEmbedderConfig {
    let mut c = HttpEmbedderConfig::default();
    if let Ok(v) = config.get::<String>("embedding.endpoint") {
        c.endpoint = v;
    }
    if let Ok(v) = config.get::<String>("embedding.model") {
        c.model = v;
    }
    if let Ok(v) = config.get::<usize>("embedding.dimensions") {
        c.dimensions = v;
    }
    c
}

fn generator_config(config: &Config) -> HttpGeneratorConfig {
    let mut c = HttpGeneratorConfig::default();
    if let Ok(v) = config.get::<String>("generation.endpoint") {
        c.endpoint = v;
    }
    if let Ok(v) = config.get::<String>("generation.model") {
        c.model = v;
    }
    c
}

fn rerank_config(config: &Config) -> RerankConfig {
    let mut c = RerankConfig::default();
    if let Ok(v) = config.get::<String>("rerank.endpoint") {
        c.endpoint = v;
    }
    if let Ok(v) = config.get::<String>("rerank.model") {
        c.model = v;
    }
    if let Ok(v) = config.get::<bool>("rerank.keep_original_score") {
        c.keep_original_score = v;
    }
    c
}

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {prog} <command> [args...]");
    eprintln!("  ingest [data_dir]                  load, split, enrich and index a corpus");
    eprintln!("  query \"<text>\" [--variant NAME]    retrieve against an ingested corpus");
    eprintln!("  evaluate                           score every retriever variant");
    eprintln!("Variants: {}", VARIANTS.join(", "));
    std::process::exit(1);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let config = Config::load().context("loading config")?;
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        usage(&prog);
    }
    let cmd = args.remove(0);
    match cmd.as_str() {
        "ingest" => ingest(&config, &args),
        "query" => query(&config, &args),
        "evaluate" => evaluate(&config),
        _ => {
            eprintln!("Unknown command: {cmd}");
            usage(&prog);
        }
    }
}

fn ingest(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let paths = Paths::from_config(config);
    let data_dir = args
        .iter()
        .find(|a| !a.starts_with('-'))
        .map_or(paths.docs_dir.clone(), PathBuf::from);
    println!("Ingesting from {}", data_dir.display());

    let loader = FileLoader::new(data_dir.clone());
    let ids = loader.list_ids();
    if ids.is_empty() {
        bail!("no .txt documents under {}", data_dir.display());
    }
    let docs = load_documents(&loader, &ids)?;
    let splitter_cfg: SplitterConfig = config.section("splitter");
    let chunks = ChunkSplitter::new(splitter_cfg)?.split_all(&docs);
    println!("Loaded {} documents, split into {} chunks", docs.len(), chunks.len());

    let embedder = default_embedder(embedder_config(config))?;
    if paths.lancedb_dir.exists() {
        fs::remove_dir_all(&paths.lancedb_dir)?;
    }
    fs::create_dir_all(&paths.lancedb_dir)?;

    let plain_store = LanceVectorStore::connect(&paths.lancedb_dir, PLAIN_TABLE, embedder.dim())?;
    embed_and_index(&plain_store, &chunks, embedder.as_ref())?;
    println!("Indexed {} plain chunks into '{PLAIN_TABLE}'", chunks.len());

    let generator = default_generator(generator_config(config))?;
    let source = Arc::new(InMemoryCorpus::from_documents(&docs));
    let bar = ProgressBar::new(chunks.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} chunks enriched") {
        bar.set_style(style);
    }
    let pb = bar.clone();
    let mut enricher = Enricher::new(source, generator, EnricherConfig::default())
        .with_progress(move |done, _total| pb.set_position(done as u64));
    let report = enricher.enrich(&chunks)?;
    bar.finish_and_clear();
    for failure in &report.failures {
        eprintln!("⚠️  could not enrich {}: {}", failure.chunk_id, failure.error);
    }
    if !report.is_complete() {
        bail!(
            "{} of {} chunks failed enrichment; fix the corpus and re-run",
            report.failures.len(),
            chunks.len()
        );
    }

    let contextual_store =
        LanceVectorStore::connect(&paths.lancedb_dir, CONTEXTUAL_TABLE, embedder.dim())?;
    embed_and_index(&contextual_store, &report.enriched, embedder.as_ref())?;
    let lexical = LexicalIndex::create(paths.tantivy_dir.clone())?;
    TextIndexer::index(&lexical, &report.enriched)?;
    println!(
        "Indexed {} enriched chunks into '{CONTEXTUAL_TABLE}' and tantivy",
        report.enriched.len()
    );
    println!("\n✅ Ingest complete ({} chunks)", report.enriched.len());
    Ok(())
}

fn embed_and_index(
    store: &LanceVectorStore,
    chunks: &[Chunk],
    embedder: &dyn Embedder,
) -> anyhow::Result<()> {
    let texts: Vec<String> = chunks.iter().map(Chunk::embedding_text).collect();
    let vectors = embedder.embed_batch(&texts)?;
    let records: Vec<EmbeddingRecord> = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, vector)| EmbeddingRecord {
            chunk_id: chunk.id.clone(),
            vector,
            embedded_text: chunk.context().map(|_| chunk.embedding_text()),
        })
        .collect();
    VectorIndexer::index(store, chunks, &records)?;
    Ok(())
}

fn query(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let Some(query_text) = args.iter().find(|a| !a.starts_with('-')) else {
        bail!("Usage: ctxr query \"<text>\" [--variant NAME]");
    };
    let variant = args
        .iter()
        .position(|a| a == "--variant")
        .and_then(|i| args.get(i + 1))
        .map_or("contextual-rerank", String::as_str);
    let retrieval: RetrievalConfig = config.section("retrieval");
    let retriever = build_variant(config, variant, &retrieval)?;
    let results = retriever.retrieve(query_text, retrieval.top_n)?;
    println!("Results from '{}' for: {query_text}", retriever.name());
    for (rank, r) in results.iter().enumerate() {
        println!("{:>2}. {:<40} score {:.4}", rank + 1, r.chunk_id, r.score);
    }
    Ok(())
}

fn evaluate(config: &Config) -> anyhow::Result<()> {
    let paths = Paths::from_config(config);
    let embedder = default_embedder(embedder_config(config))?;
    let plain_store = LanceVectorStore::connect(&paths.lancedb_dir, PLAIN_TABLE, embedder.dim())?;
    if !plain_store.is_populated()? {
        bail!("no ingested corpus found; run `ctxr ingest` first");
    }
    let plain_chunks: Vec<Chunk> = plain_store
        .load_records()?
        .into_iter()
        .map(|(chunk, _)| chunk)
        .collect();
    println!("Generating gold questions for {} chunks...", plain_chunks.len());

    let eval_cfg: EvalConfig = config.section("eval");
    let generator = default_generator(generator_config(config))?;
    let gold = QuestionGenerator::new(generator, eval_cfg.questions_per_chunk)
        .generate(&plain_chunks)?;
    println!("Gold set: {} questions", gold.len());

    let retrieval: RetrievalConfig = config.section("retrieval");
    let variants = VARIANTS
        .iter()
        .map(|name| build_variant(config, name, &retrieval))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let harness = EvaluationHarness::new(&eval_cfg);
    let records = harness.evaluate_all(&variants, &gold)?;

    println!("\n{:<20} {:<10} {:>8}", "retriever", "metric", "value");
    println!("{}", "-".repeat(40));
    for r in &records {
        println!("{:<20} {:<10} {:>8.3}", r.retriever, r.metric, r.value);
    }
    Ok(())
}

/// Wire one retriever variant over the ingested state.
fn build_variant(
    config: &Config,
    name: &str,
    retrieval: &RetrievalConfig,
) -> anyhow::Result<Arc<dyn Retriever>> {
    let paths = Paths::from_config(config);
    let embedder = default_embedder(embedder_config(config))?;
    let table = if name == "baseline-vector" {
        PLAIN_TABLE
    } else {
        CONTEXTUAL_TABLE
    };
    let store = LanceVectorStore::connect(&paths.lancedb_dir, table, embedder.dim())?;
    if !store.is_populated()? {
        bail!("table '{table}' is empty; run `ctxr ingest` first");
    }
    let store = Arc::new(store);
    let vector = Arc::new(VectorRetriever::new(name, embedder, store.clone()));
    match name {
        "baseline-vector" | "contextual-vector" => Ok(vector),
        "contextual-fusion" => {
            let lexical = Arc::new(LexicalIndex::open(&paths.tantivy_dir)?);
            Ok(Arc::new(FusionRetriever::new(
                name,
                vector as Arc<dyn CandidateRetriever>,
                lexical,
                retrieval.clone(),
            )))
        }
        "contextual-rerank" => {
            let lexical = Arc::new(LexicalIndex::open(&paths.tantivy_dir)?);
            let reranker = default_reranker(rerank_config(config))?;
            let chunks: Vec<Chunk> = store
                .load_records()?
                .into_iter()
                .map(|(chunk, _)| chunk)
                .collect();
            Ok(Arc::new(HybridRetriever::new(
                name,
                vector as Arc<dyn CandidateRetriever>,
                lexical,
                reranker,
                HybridRetriever::chunk_text_map(&chunks),
                retrieval.clone(),
            )))
        }
        _ => bail!("unknown variant '{name}' (expected one of: {})", VARIANTS.join(", ")),
    }
}
