//! Read-only access to hosted source repositories.

pub mod error;
pub mod github;
pub mod host;
#[cfg(feature = "mock")]
pub mod mock;
pub mod types;

pub use error::SourceError;
pub use github::GitHubClient;
pub use host::SourceHost;
pub use types::{
    Commit, Contributor, EntryKind, Issue, PullRequest, Release, RepoMeta, RepositoryRef,
    TreeEntry,
};
