//! Error types for repolens-index.

use repolens_memory::{GraphStoreError, VectorStoreError};
use repolens_source::SourceError;

/// Errors that can occur while indexing or retrieving.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Caller supplied a malformed argument (empty question, zero top-k, bad namespace).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Embedding or generation provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] repolens_llm::LlmError),

    #[error("embedding provider returned {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("graph store error: {0}")]
    GraphStore(#[from] GraphStoreError),

    #[error("source host error: {0}")]
    Source(#[from] SourceError),

    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
