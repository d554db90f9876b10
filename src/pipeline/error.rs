//! Typed errors for a topic modeling run.

use thiserror::Error;

use crate::topics::document::MIN_DOCUMENT_TOKENS;

/// Why a run stopped. Every variant leaves previously committed labels as
/// they were.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No item produced a document long enough to cluster
    #[error(
        "no valid text: none of the {items} items had at least {} content tokens",
        MIN_DOCUMENT_TOKENS
    )]
    EmptyCorpus { items: usize },

    /// The embedding model failed or returned a malformed batch
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Another run holds the guard
    #[error("a topic modeling run is already in progress")]
    RunInProgress,

    /// Reading items or writing labels failed
    #[error("item store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// A numeric stage failed on well-formed input
    #[error("internal pipeline error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Short machine-friendly name, stored with the run state.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyCorpus { .. } => "empty_corpus",
            Self::EmbeddingUnavailable(_) => "embedding_unavailable",
            Self::RunInProgress => "run_in_progress",
            Self::Store(_) => "store",
            Self::Internal(_) => "internal",
        }
    }
}
