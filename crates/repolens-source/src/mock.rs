//! In-memory [`SourceHost`] for tests.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SourceError;
use crate::host::{BoxFuture, SourceHost};
use crate::types::{
    Commit, Contributor, EntryKind, Issue, PullRequest, Release, RepoMeta, RepositoryRef,
    TreeEntry,
};

/// Fixed snapshot of one repository. Listings are stored most-recent-first.
#[derive(Debug, Clone, Default)]
pub struct MockSourceHost {
    pub default_branch: String,
    pub files: BTreeMap<String, String>,
    pub commits: Vec<Commit>,
    pub pulls: Vec<PullRequest>,
    pub issues: Vec<Issue>,
    pub releases: Vec<Release>,
    pub contributors: Vec<Contributor>,
    pub meta: RepoMeta,
    /// Paths whose fetch fails with a host error.
    pub failing_paths: BTreeSet<String>,
    /// Every call fails as if the host were down.
    pub unreachable: bool,
}

impl MockSourceHost {
    #[must_use]
    pub fn new(default_branch: impl Into<String>) -> Self {
        Self {
            default_branch: default_branch.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    #[must_use]
    pub fn with_failing_path(mut self, path: impl Into<String>) -> Self {
        self.failing_paths.insert(path.into());
        self
    }

    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.unreachable {
            Err(SourceError::Status {
                status: 503,
                url: "mock://source".into(),
            })
        } else {
            Ok(())
        }
    }

    fn tree(&self) -> Vec<TreeEntry> {
        let mut dirs = BTreeSet::new();
        for path in self.files.keys() {
            let mut parts: Vec<&str> = path.split('/').collect();
            parts.pop();
            for i in 1..=parts.len() {
                dirs.insert(parts[..i].join("/"));
            }
        }
        let mut entries: Vec<TreeEntry> = dirs
            .into_iter()
            .map(|path| TreeEntry {
                path,
                kind: EntryKind::Directory,
                size: None,
            })
            .collect();
        entries.extend(self.files.iter().map(|(path, content)| TreeEntry {
            path: path.clone(),
            kind: EntryKind::File,
            size: Some(content.len() as u64),
        }));
        entries
    }
}

fn take<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items.iter().take(limit).cloned().collect()
}

impl SourceHost for MockSourceHost {
    fn resolve_branch<'a>(
        &'a self,
        repo: &'a RepositoryRef,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(async move {
            self.check()?;
            Ok(repo
                .branch
                .clone()
                .unwrap_or_else(|| self.default_branch.clone()))
        })
    }

    fn fetch_tree<'a>(
        &'a self,
        _repo: &'a RepositoryRef,
        _branch: &'a str,
    ) -> BoxFuture<'a, Result<Vec<TreeEntry>, SourceError>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.tree())
        })
    }

    fn fetch_file<'a>(
        &'a self,
        _repo: &'a RepositoryRef,
        _branch: &'a str,
        path: &'a str,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(async move {
            self.check()?;
            if self.failing_paths.contains(path) {
                return Err(SourceError::Status {
                    status: 502,
                    url: path.to_owned(),
                });
            }
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(path.to_owned()))
        })
    }

    fn list_commits<'a>(
        &'a self,
        _repo: &'a RepositoryRef,
        _branch: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Commit>, SourceError>> {
        Box::pin(async move {
            self.check()?;
            Ok(take(&self.commits, limit))
        })
    }

    fn list_pulls<'a>(
        &'a self,
        _repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<PullRequest>, SourceError>> {
        Box::pin(async move {
            self.check()?;
            Ok(take(&self.pulls, limit))
        })
    }

    fn list_issues<'a>(
        &'a self,
        _repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Issue>, SourceError>> {
        Box::pin(async move {
            self.check()?;
            Ok(take(&self.issues, limit))
        })
    }

    fn list_releases<'a>(
        &'a self,
        _repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Release>, SourceError>> {
        Box::pin(async move {
            self.check()?;
            Ok(take(&self.releases, limit))
        })
    }

    fn list_contributors<'a>(
        &'a self,
        _repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Contributor>, SourceError>> {
        Box::pin(async move {
            self.check()?;
            Ok(take(&self.contributors, limit))
        })
    }

    fn repo_meta<'a>(
        &'a self,
        _repo: &'a RepositoryRef,
    ) -> BoxFuture<'a, Result<RepoMeta, SourceError>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.meta.clone())
        })
    }
}
