use std::future::Future;
use std::pin::Pin;

use crate::error::SourceError;
use crate::types::{
    Commit, Contributor, Issue, PullRequest, Release, RepoMeta, RepositoryRef, TreeEntry,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Paginated read access to a hosted repository.
///
/// Listings are returned most-recent-first and hold at most `limit` items.
pub trait SourceHost: Send + Sync {
    /// The branch to use for `repo`: its explicit branch, or the host's default.
    fn resolve_branch<'a>(
        &'a self,
        repo: &'a RepositoryRef,
    ) -> BoxFuture<'a, Result<String, SourceError>>;

    fn fetch_tree<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<Vec<TreeEntry>, SourceError>>;

    fn fetch_file<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        branch: &'a str,
        path: &'a str,
    ) -> BoxFuture<'a, Result<String, SourceError>>;

    fn list_commits<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        branch: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Commit>, SourceError>>;

    fn list_pulls<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<PullRequest>, SourceError>>;

    fn list_issues<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Issue>, SourceError>>;

    fn list_releases<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Release>, SourceError>>;

    fn list_contributors<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Contributor>, SourceError>>;

    fn repo_meta<'a>(
        &'a self,
        repo: &'a RepositoryRef,
    ) -> BoxFuture<'a, Result<RepoMeta, SourceError>>;
}
