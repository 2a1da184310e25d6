//! Fixed-size overlapping chunk splitter.
//!
//! Splits each document into whitespace-token windows of `chunk_size`
//! tokens, stepping by `chunk_size - chunk_overlap`. Deterministic: the
//! same input always yields the same chunk count, ids and order.

use crate::config::SplitterConfig;
use crate::error::Result;
use crate::types::{Chunk, Document, Meta};

pub struct ChunkSplitter {
    config: SplitterConfig,
}

impl ChunkSplitter {
    pub fn new(config: SplitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split one document into overlapping chunks. Ids are
    /// `"{doc_id}:{index}"`; `start_token` records the window offset.
    pub fn split(&self, doc: &Document) -> Vec<Chunk> {
        let words: Vec<&str> = doc.text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        let step = self.config.chunk_size - self.config.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut chunk_index = 0;
        loop {
            let end = (start + self.config.chunk_size).min(words.len());
            chunks.push(Chunk {
                id: format!("{}:{}", doc.id, chunk_index),
                doc_id: doc.id.clone(),
                chunk_index,
                start_token: start,
                content: words[start..end].join(" "),
                metadata: Meta::new(),
            });
            chunk_index += 1;
            if end >= words.len() {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Split a corpus, preserving document order.
    pub fn split_all(&self, docs: &[Document]) -> Vec<Chunk> {
        let mut all = Vec::new();
        for doc in docs {
            all.extend(self.split(doc));
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, words: usize) -> Document {
        let text = (0..words).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        Document { id: id.to_string(), text }
    }

    fn splitter(size: usize, overlap: usize) -> ChunkSplitter {
        ChunkSplitter::new(SplitterConfig { chunk_size: size, chunk_overlap: overlap })
            .expect("valid config")
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = splitter(512, 51).split(&doc("a", 100));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "a:0");
        assert_eq!(chunks[0].start_token, 0);
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let chunks = splitter(512, 51).split(&Document { id: "e".into(), text: "  \n ".into() });
        assert!(chunks.is_empty());
    }

    #[test]
    fn default_window_counts_are_deterministic() {
        // step = 512 - 51 = 461; windows start at 0, 461, 922, ...
        // 1200 tokens -> starts 0, 461, 922 -> 3 chunks.
        let chunks = splitter(512, 51).split(&doc("d", 1200));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].start_token, 922);
        // 512 tokens exactly -> single full window.
        assert_eq!(splitter(512, 51).split(&doc("d", 512)).len(), 1);
        // 513 tokens -> a second short window.
        assert_eq!(splitter(512, 51).split(&doc("d", 513)).len(), 2);
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let chunks = splitter(10, 4).split(&doc("d", 25));
        // step = 6: starts 0, 6, 12, 18 -> 4 chunks
        assert_eq!(chunks.len(), 4);
        let first: Vec<&str> = chunks[0].content.split_whitespace().collect();
        let second: Vec<&str> = chunks[1].content.split_whitespace().collect();
        assert_eq!(&first[6..], &second[..4], "tail of one window opens the next");
    }

    #[test]
    fn order_and_backreferences_are_preserved() {
        let docs = vec![doc("x", 30), doc("y", 30)];
        let chunks = splitter(10, 2).split_all(&docs);
        assert!(chunks.iter().all(|c| !c.content.is_empty()));
        let x_count = chunks.iter().filter(|c| c.doc_id == "x").count();
        assert!(chunks[..x_count].iter().all(|c| c.doc_id == "x"));
        for (i, c) in chunks[..x_count].iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.id, format!("x:{i}"));
        }
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(ChunkSplitter::new(SplitterConfig { chunk_size: 10, chunk_overlap: 10 }).is_err());
        assert!(ChunkSplitter::new(SplitterConfig { chunk_size: 0, chunk_overlap: 0 }).is_err());
    }
}
