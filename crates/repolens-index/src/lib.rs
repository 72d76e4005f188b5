//! Repository indexing and semantic retrieval.
//!
//! The pipeline walks a hosted repository tree, splits eligible files into
//! bounded line-window chunks, embeds them with bounded concurrency, and
//! stores the vectors under a namespace derived from `owner/name@branch`.
//! Retrieval embeds a question and ranks chunks from that namespace only.

pub mod chunker;
pub(crate) mod context;
pub mod embedder;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod languages;
pub mod namespace;
pub mod retriever;
pub mod store;

pub use chunker::{Chunk, ChunkerConfig};
pub use embedder::EmbeddingGateway;
pub use error::{IndexError, Result};
pub use indexer::{CodeIndexer, IndexReport, IndexerConfig};
pub use namespace::Namespace;
pub use retriever::{RetrievalConfig, RetrievalResult, RetrievedChunk, SemanticRetriever};
pub use store::CodeStore;
