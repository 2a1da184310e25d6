//! Document sources: HTTP pages, local files, and the loaded in-memory
//! corpus the enricher resolves chunk back-references against.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info};

use ctxr_core::error::{Error, Result};
use ctxr_core::traits::DocumentSource;
use ctxr_core::types::{DocId, Document};

use crate::html::strip_html;
use crate::retry::{with_retries, CallError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: "ctxr/0.1 (contextual retrieval pipeline)".to_string(),
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

/// Fetches pages over HTTP and strips HTML to plain text.
pub struct HttpLoader {
    client: Client,
    config: LoaderConfig,
}

impl HttpLoader {
    pub fn new(config: LoaderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn fetch_once(&self, url: &str) -> std::result::Result<String, CallError> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                CallError::Transient(format!("fetch '{url}': {e}"))
            } else {
                CallError::Fatal(Error::Fetch {
                    source_id: url.to_string(),
                    reason: e.to_string(),
                })
            }
        })?;
        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(CallError::Transient(format!("fetch '{url}': HTTP {status}")));
        }
        if !status.is_success() {
            return Err(CallError::Fatal(Error::Fetch {
                source_id: url.to_string(),
                reason: format!("HTTP {status}"),
            }));
        }
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(false);
        let body = response.text().map_err(|e| {
            CallError::Fatal(Error::Fetch {
                source_id: url.to_string(),
                reason: format!("reading body: {e}"),
            })
        })?;
        if is_html || body.trim_start().starts_with('<') {
            Ok(strip_html(&body))
        } else {
            Ok(body)
        }
    }
}

impl DocumentSource for HttpLoader {
    fn fetch(&self, id: &str) -> Result<String> {
        debug!(url = id, "fetching document");
        with_retries(
            &self.config.retry,
            |reason| Error::Fetch {
                source_id: id.to_string(),
                reason,
            },
            || self.fetch_once(id),
        )
    }
}

/// Reads documents from files under a base directory; ids are relative
/// paths. Falls back to a lossy read for non-UTF-8 files.
pub struct FileLoader {
    base_dir: PathBuf,
}

impl FileLoader {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Ids of every `.txt` file under the base directory, sorted.
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for entry in walkdir::WalkDir::new(&self.base_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("txt") {
                if let Ok(rel) = entry.path().strip_prefix(&self.base_dir) {
                    ids.push(rel.to_string_lossy().to_string());
                }
            }
        }
        ids.sort();
        ids
    }
}

impl DocumentSource for FileLoader {
    fn fetch(&self, id: &str) -> Result<String> {
        let path = self.base_dir.join(id);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(_) => {
                let bytes = std::fs::read(&path).map_err(|e| Error::Fetch {
                    source_id: id.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(String::from_utf8_lossy(&bytes).to_string())
            }
        }
    }
}

/// The already-loaded corpus. A miss here means a chunk references a
/// document the loader never produced, which is a consistency violation
/// rather than a fetch failure.
pub struct InMemoryCorpus {
    docs: HashMap<DocId, String>,
}

impl InMemoryCorpus {
    pub fn from_documents(docs: &[Document]) -> Self {
        Self {
            docs: docs
                .iter()
                .map(|d| (d.id.clone(), d.text.clone()))
                .collect(),
        }
    }
}

impl DocumentSource for InMemoryCorpus {
    fn fetch(&self, id: &str) -> Result<String> {
        self.docs.get(id).cloned().ok_or_else(|| Error::Consistency {
            // The referencing chunk is unknown here; callers attach it
            // via Error::for_chunk.
            chunk_id: String::new(),
            doc_id: id.to_string(),
        })
    }
}

/// Load a batch of documents through any source, preserving id order.
pub fn load_documents(source: &dyn DocumentSource, ids: &[String]) -> Result<Vec<Document>> {
    let mut docs = Vec::with_capacity(ids.len());
    for id in ids {
        let text = source.fetch(id)?;
        info!(id = %id, chars = text.len(), "loaded document");
        docs.push(Document {
            id: id.clone(),
            text,
        });
    }
    Ok(docs)
}
