use repolens_index::IndexError;
use repolens_llm::LlmError;
use repolens_memory::GraphStoreError;
use repolens_source::SourceError;
use serde::Serialize;

use crate::timeouts::OperationKind;

/// Coarse error class a caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed request; retrying will not help.
    Input,
    /// A collaborator (source host, LLM, vector or graph store) failed.
    UpstreamUnavailable,
    /// The operation exceeded its deadline; retry with a larger budget.
    Timeout,
    /// The caller cancelled the operation.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("source host error: {0}")]
    Source(#[from] SourceError),

    #[error("graph store error: {0}")]
    Graph(#[from] GraphStoreError),

    #[error("{operation} operation timed out after {seconds}s")]
    Timeout { operation: OperationKind, seconds: u64 },

    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Input(_) | Self::Index(IndexError::InvalidInput(_)) => ErrorClass::Input,
            Self::Index(IndexError::Source(e)) | Self::Source(e) if source_is_input(e) => {
                ErrorClass::Input
            }
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Index(_) | Self::Llm(_) | Self::Source(_) | Self::Graph(_) => {
                ErrorClass::UpstreamUnavailable
            }
        }
    }
}

/// A malformed reference or a repository that does not exist.
fn source_is_input(e: &SourceError) -> bool {
    e.is_input() || matches!(e, SourceError::NotFound(_))
}

pub type Result<T> = std::result::Result<T, CoreError>;
