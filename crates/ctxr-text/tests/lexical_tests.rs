use ctxr_core::traits::TextIndexer;
use ctxr_core::types::{Chunk, Meta, SourceKind, CONTEXT_KEY};
use ctxr_text::LexicalIndex;

fn chunk(id: &str, doc_id: &str, content: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        doc_id: doc_id.to_string(),
        chunk_index: 0,
        start_token: 0,
        content: content.to_string(),
        metadata: Meta::new(),
    }
}

#[test]
fn indexed_chunks_are_searchable() {
    let index = LexicalIndex::in_memory().expect("index");
    let chunks = vec![
        chunk("d:0", "d", "revenue grew substantially across cloud segments"),
        chunk("d:1", "d", "firecraft techniques require dry tinder"),
    ];
    index.index(&chunks).expect("index chunks");

    let hits = index.search("cloud revenue", 10).expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk_id, "d:0");
    assert_eq!(hits[0].source, SourceKind::Lexical);
}

#[test]
fn scores_are_non_increasing() {
    let index = LexicalIndex::in_memory().expect("index");
    let chunks = vec![
        chunk("d:0", "d", "shipping logistics shipping containers shipping"),
        chunk("d:1", "d", "shipping once mentioned here among many other words entirely"),
        chunk("d:2", "d", "nothing relevant whatsoever"),
    ];
    index.index(&chunks).expect("index chunks");

    let hits = index.search("shipping", 10).expect("search");
    assert!(hits.len() >= 2);
    for w in hits.windows(2) {
        assert!(w[0].score >= w[1].score);
    }
}

#[test]
fn punctuated_questions_do_not_abort_search() {
    let index = LexicalIndex::in_memory().expect("index");
    index
        .index(&[chunk("d:0", "d", "the letter discusses operating margin")])
        .expect("index chunks");
    let hits = index
        .search("what happened to the operating margin? (exactly)", 5)
        .expect("lenient parse");
    assert!(!hits.is_empty());
}

#[test]
fn on_disk_index_survives_reopen() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let dir = tmp.path().join("tantivy");
    {
        let index = LexicalIndex::create(dir.clone()).expect("create");
        index
            .index(&[chunk("d:0", "d", "quarterly shipping volumes rose")])
            .expect("index chunks");
    }
    let reopened = LexicalIndex::open(&dir).expect("open");
    let hits = reopened.search("shipping volumes", 5).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, "d:0");
}

#[test]
fn enriched_context_is_indexed_alongside_content() {
    let index = LexicalIndex::in_memory().expect("index");
    let mut c = chunk("d:0", "d", "we expanded capacity in three regions");
    c.metadata.insert(
        CONTEXT_KEY.to_string(),
        "from the 2023 shareholder letter's infrastructure section".to_string(),
    );
    index.index(&[c]).expect("index chunks");

    let hits = index.search("shareholder infrastructure", 5).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, "d:0");
}
