//! Deadline policy keyed by operation kind.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Routing, answering, retrieval, graph queries, artifacts.
    Interactive,
    /// Bulk repository indexing.
    Indexing,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interactive => "interactive",
            Self::Indexing => "indexing",
        })
    }
}

fn default_interactive_seconds() -> u64 {
    120
}

fn default_indexing_seconds() -> u64 {
    1800
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_interactive_seconds")]
    pub interactive_seconds: u64,
    #[serde(default = "default_indexing_seconds")]
    pub indexing_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            interactive_seconds: default_interactive_seconds(),
            indexing_seconds: default_indexing_seconds(),
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn for_kind(&self, kind: OperationKind) -> Duration {
        Duration::from_secs(match kind {
            OperationKind::Interactive => self.interactive_seconds,
            OperationKind::Indexing => self.indexing_seconds,
        })
    }
}

/// Run `fut` under the deadline for `kind`, or until `cancel` fires.
///
/// On expiry or cancellation the future is dropped, which aborts every
/// external call it still has in flight.
///
/// # Errors
///
/// Returns [`CoreError::Timeout`] or [`CoreError::Cancelled`], or the
/// future's own error.
pub async fn run_with_deadline<T, F>(
    kind: OperationKind,
    timeouts: &TimeoutConfig,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let limit = timeouts.for_kind(kind);
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::info!(operation = %kind, "operation cancelled");
            Err(CoreError::Cancelled)
        }
        result = tokio::time::timeout(limit, fut) => result.unwrap_or_else(|_| {
            tracing::warn!(operation = %kind, seconds = limit.as_secs(), "operation timed out");
            Err(CoreError::Timeout {
                operation: kind,
                seconds: limit.as_secs(),
            })
        }),
    }
}
