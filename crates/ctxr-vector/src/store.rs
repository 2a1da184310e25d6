use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use tracing::debug;

use ctxr_core::error::{Error, Result};
use ctxr_core::traits::VectorIndexer;
use ctxr_core::types::{Chunk, EmbeddingRecord, Meta, RetrievalCandidate, SourceKind};

use crate::schema::build_arrow_schema;

/// Vector store over one LanceDB table.
///
/// The LanceDB API is async; this store owns a tokio runtime and exposes
/// the synchronous [`VectorIndexer`] surface the rest of the pipeline
/// uses. Do not construct it from inside another tokio runtime.
pub struct LanceVectorStore {
    db: Connection,
    table_name: String,
    dim: i32,
    rt: tokio::runtime::Runtime,
}

impl LanceVectorStore {
    pub fn connect(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
        let rt = tokio::runtime::Runtime::new()?;
        let db = rt
            .block_on(connect(db_path.to_string_lossy().as_ref()).execute())
            .map_err(|e| Error::Index(e.to_string()))?;
        Ok(Self {
            db,
            table_name: table_name.to_string(),
            dim: i32::try_from(dim)
                .map_err(|_| Error::InvalidConfig(format!("embedding dim {dim} too large")))?,
            rt,
        })
    }

    /// True when the table already holds rows from a previous run.
    pub fn is_populated(&self) -> Result<bool> {
        let names = self
            .rt
            .block_on(self.db.table_names().execute())
            .map_err(|e| Error::Index(e.to_string()))?;
        Ok(names.contains(&self.table_name))
    }

    /// Reload the persisted pipeline state: every chunk with its
    /// embedding, as written by [`VectorIndexer::index`].
    pub fn load_records(&self) -> Result<Vec<(Chunk, EmbeddingRecord)>> {
        self.rt.block_on(self.load_records_inner())
    }

    async fn load_records_inner(&self) -> Result<Vec<(Chunk, EmbeddingRecord)>> {
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| Error::Index(e.to_string()))?;
        let mut stream = table
            .query()
            .execute()
            .await
            .map_err(|e| Error::Index(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream)
            .await
            .map_err(|e| Error::Index(e.to_string()))?
        {
            for i in 0..batch.num_rows() {
                out.push(decode_row(&batch, i)?);
            }
        }
        // Table scan order is storage order; restore split order.
        out.sort_by(|(a, _), (b, _)| {
            a.doc_id
                .cmp(&b.doc_id)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        Ok(out)
    }

    async fn insert_batch(&self, batch: RecordBatch) -> Result<()> {
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::Index(e.to_string()))?;
        if names.contains(&self.table_name) {
            self.db
                .open_table(&self.table_name)
                .execute()
                .await
                .map_err(|e| Error::Index(e.to_string()))?
                .add(reader)
                .execute()
                .await
                .map_err(|e| Error::Index(e.to_string()))?;
        } else {
            self.db
                .create_table(&self.table_name, reader)
                .execute()
                .await
                .map_err(|e| Error::Index(e.to_string()))?;
        }
        Ok(())
    }

    fn to_record_batch(&self, chunks: &[Chunk], records: &[EmbeddingRecord]) -> Result<RecordBatch> {
        let schema = build_arrow_schema(self.dim);
        let mut ids = Vec::new();
        let mut doc_ids = Vec::new();
        let mut chunk_indices = Vec::new();
        let mut start_tokens = Vec::new();
        let mut contents = Vec::new();
        let mut metadatas = Vec::new();
        let mut embedded_texts: Vec<Option<String>> = Vec::new();
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
        for (chunk, record) in chunks.iter().zip(records.iter()) {
            ids.push(chunk.id.clone());
            doc_ids.push(chunk.doc_id.clone());
            chunk_indices.push(chunk.chunk_index as i32);
            start_tokens.push(chunk.start_token as i32);
            contents.push(chunk.content.clone());
            metadatas.push(
                serde_json::to_string(&chunk.metadata)
                    .map_err(|e| Error::Index(e.to_string()))?,
            );
            embedded_texts.push(record.embedded_text.clone());
            vectors.push(Some(record.vector.iter().map(|&x| Some(x)).collect()));
        }
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(Int32Array::from(start_tokens)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(metadatas)),
                Arc::new(StringArray::from(embedded_texts)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(vectors.into_iter(), self.dim)),
            ],
        )
        .map_err(|e| Error::Index(e.to_string()))
    }
}

impl VectorIndexer for LanceVectorStore {
    fn index(&self, chunks: &[Chunk], records: &[EmbeddingRecord]) -> Result<()> {
        if chunks.len() != records.len() {
            return Err(Error::Index(format!(
                "chunk/record count mismatch: {} vs {}",
                chunks.len(),
                records.len()
            )));
        }
        for (chunk, record) in chunks.iter().zip(records.iter()) {
            if chunk.id != record.chunk_id {
                return Err(Error::Index(format!(
                    "record for '{}' paired with chunk '{}'",
                    record.chunk_id, chunk.id
                )));
            }
            if record.vector.len() != self.dim as usize {
                return Err(Error::Embedding(format!(
                    "vector for '{}' has dim {}, table expects {}",
                    record.chunk_id,
                    record.vector.len(),
                    self.dim
                )));
            }
        }
        if chunks.is_empty() {
            return Ok(());
        }
        let batch = self.to_record_batch(chunks, records)?;
        self.rt.block_on(self.insert_batch(batch))?;
        debug!(count = chunks.len(), table = %self.table_name, "indexed chunks");
        Ok(())
    }

    fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievalCandidate>> {
        self.rt.block_on(async {
            let table = self
                .db
                .open_table(&self.table_name)
                .execute()
                .await
                .map_err(|e| Error::Index(e.to_string()))?;
            let mut stream = table
                .vector_search(query_vec.to_vec())
                .map_err(|e| Error::Index(e.to_string()))?
                .limit(k)
                .execute()
                .await
                .map_err(|e| Error::Index(e.to_string()))?;
            let mut hits = Vec::new();
            while let Some(batch) = futures::TryStreamExt::try_next(&mut stream)
                .await
                .map_err(|e| Error::Index(e.to_string()))?
            {
                let ids = string_column(&batch, "id")?;
                let distances = float_column(&batch, "_distance")?;
                for i in 0..batch.num_rows() {
                    hits.push(RetrievalCandidate {
                        chunk_id: ids.value(i).to_string(),
                        score: 1.0 - distances.value(i),
                        source: SourceKind::Vector,
                    });
                }
            }
            hits.truncate(k);
            Ok(hits)
        })
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Index(format!("missing or mistyped column '{name}'")))
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| Error::Index(format!("missing or mistyped column '{name}'")))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| Error::Index(format!("missing or mistyped column '{name}'")))
}

fn decode_row(batch: &RecordBatch, i: usize) -> Result<(Chunk, EmbeddingRecord)> {
    let id = string_column(batch, "id")?.value(i).to_string();
    let doc_id = string_column(batch, "doc_id")?.value(i).to_string();
    let chunk_index = int_column(batch, "chunk_index")?.value(i) as usize;
    let start_token = int_column(batch, "start_token")?.value(i) as usize;
    let content = string_column(batch, "content")?.value(i).to_string();
    let metadata: Meta = serde_json::from_str(string_column(batch, "metadata")?.value(i))
        .map_err(|e| Error::Parse(format!("metadata for chunk '{id}': {e}")))?;
    let embedded_col = string_column(batch, "embedded_text")?;
    let embedded_text = if embedded_col.is_null(i) {
        None
    } else {
        Some(embedded_col.value(i).to_string())
    };
    let vec_col = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| Error::Index("missing or mistyped column 'vector'".to_string()))?;
    let values = vec_col.value(i);
    let floats = values
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| Error::Index("vector items are not f32".to_string()))?;
    let vector: Vec<f32> = floats.iter().map(|x| x.unwrap_or(0.0)).collect();
    Ok((
        Chunk {
            id: id.clone(),
            doc_id,
            chunk_index,
            start_token,
            content,
            metadata,
        },
        EmbeddingRecord {
            chunk_id: id,
            vector,
            embedded_text,
        },
    ))
}
