use thiserror::Error;

/// Pipeline stage a retrieval failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vector,
    Lexical,
    Rerank,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Vector => write!(f, "vector"),
            Stage::Lexical => write!(f, "lexical"),
            Stage::Rerank => write!(f, "rerank"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to fetch document '{source_id}': {reason}")]
    Fetch { source_id: String, reason: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("generation failed for chunk '{chunk_id}': {reason}")]
    Generation { chunk_id: String, reason: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("rerank failed: {0}")]
    Rerank(String),

    #[error("retrieval failed in {stage} stage: {source}")]
    Retrieval {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    #[error("chunk '{chunk_id}' references unknown document '{doc_id}'")]
    Consistency { chunk_id: String, doc_id: String },

    #[error("evaluation of question '{question}' failed: {source}")]
    Evaluation {
        question: String,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("index operation failed: {0}")]
    Index(String),

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach the id of the chunk being processed to errors whose origin
    /// (a document source or generation backend) cannot know it.
    pub fn for_chunk(self, chunk_id: &str) -> Error {
        match self {
            Error::Generation { reason, .. } => Error::Generation {
                chunk_id: chunk_id.to_string(),
                reason,
            },
            Error::Consistency { doc_id, .. } => Error::Consistency {
                chunk_id: chunk_id.to_string(),
                doc_id,
            },
            other => other,
        }
    }

    /// Wrap a sub-retriever or reranker failure with stage attribution.
    pub fn at_stage(self, stage: Stage) -> Error {
        Error::Retrieval {
            stage,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
