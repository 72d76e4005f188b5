#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid repository reference {input:?}: {reason}")]
    InvalidRef { input: String, reason: &'static str },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("source host rate limit exceeded")]
    RateLimited,

    #[error("source host returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("{path} is {bytes} bytes, over the {limit} byte limit")]
    TooLarge {
        path: String,
        bytes: usize,
        limit: usize,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid API base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("file is not valid UTF-8: {0}")]
    NotText(String),
}

impl SourceError {
    /// Errors caused by the caller's input rather than the upstream host.
    #[must_use]
    pub fn is_input(&self) -> bool {
        matches!(self, Self::InvalidRef { .. })
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
