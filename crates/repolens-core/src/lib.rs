//! Question answering over hosted repositories.
//!
//! [`RepoAssistant`] wires the pieces together: the [`router`] picks a data
//! domain for a question, code questions go through semantic retrieval,
//! every other domain goes through the keyword [`filter`], and the
//! [`synthesizer`] turns the resulting context into a structured answer.

pub mod artifacts;
pub mod assistant;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod error;
pub mod filter;
pub mod listing;
pub mod router;
pub mod synthesizer;
pub mod timeouts;

pub use artifacts::ArtifactKind;
pub use assistant::RepoAssistant;
pub use config::Config;
pub use domain::{Domain, RouterDecision};
pub use error::{CoreError, ErrorClass, Result};
pub use filter::{FilterConfig, FilterMode, Filtered};
pub use synthesizer::{FallbackNote, RelevantFile, SynthesisConfig, SynthesizedAnswer};
pub use timeouts::{OperationKind, TimeoutConfig};
