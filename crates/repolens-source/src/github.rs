//! GitHub REST v3 implementation of [`SourceHost`].

use std::fmt;
use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::SourceError;
use crate::host::{BoxFuture, SourceHost};
use crate::types::{
    Commit, Contributor, EntryKind, Issue, PullRequest, Release, RepoMeta, RepositoryRef,
    TreeEntry,
};

const GITHUB_API_URL: &str = "https://api.github.com";
const JSON_ACCEPT: &str = "application/vnd.github+json";
const RAW_ACCEPT: &str = "application/vnd.github.raw";
const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_MAX_FILE_BYTES: usize = 512 * 1024;
const DEFAULT_DETAIL_LIMIT: usize = 20;
const DETAIL_CONCURRENCY: usize = 5;

pub struct GitHubClient {
    http: reqwest::Client,
    /// Base URL for the GitHub API. Configurable for testing.
    base_url: String,
    token: Option<String>,
    page_size: usize,
    max_file_bytes: usize,
    detail_limit: usize,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("page_size", &self.page_size)
            .field("max_file_bytes", &self.max_file_bytes)
            .field("detail_limit", &self.detail_limit)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a client for `api.github.com`, authenticated when `token` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(token: Option<String>) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("repolens/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: GITHUB_API_URL.to_owned(),
            token: token.filter(|t| !t.is_empty()),
            page_size: MAX_PAGE_SIZE,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            detail_limit: DEFAULT_DETAIL_LIMIT,
        })
    }

    /// Override the API base URL (GitHub Enterprise, tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        self.base_url = url;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    #[must_use]
    pub fn with_max_file_bytes(mut self, bytes: usize) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    /// Number of newest commits / pull requests whose changed files are fetched.
    #[must_use]
    pub fn with_detail_limit(mut self, limit: usize) -> Self {
        self.detail_limit = limit;
        self
    }

    /// `{base}/repos/{owner}/{name}/{segments..}`, each segment percent-encoded.
    fn endpoint<'s>(
        &self,
        repo: &RepositoryRef,
        segments: impl IntoIterator<Item = &'s str>,
    ) -> Result<Url, SourceError> {
        let invalid = |reason: String| SourceError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base".into()))?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn get_bytes(&self, url: Url, accept: &str) -> Result<Vec<u8>, SourceError> {
        let url_text = url.to_string();
        let url = url_text.as_str();
        let mut req = self.http.get(url).header("Accept", accept);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let resp = req.send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.to_owned()));
        }
        let exhausted = resp
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|v| v.as_bytes() == b"0");
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || (status == reqwest::StatusCode::FORBIDDEN && exhausted)
        {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            tracing::warn!(%status, url, "source host request failed");
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        let bytes = self.get_bytes(url, JSON_ACCEPT).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Walk `page=1..` until `limit` kept items are collected or a short page arrives.
    async fn paginate<W, T, F>(&self, base: &Url, limit: usize, keep: F) -> Result<Vec<T>, SourceError>
    where
        W: DeserializeOwned,
        F: Fn(W) -> Option<T> + Send,
    {
        let per_page = self.page_size.min(limit.max(1));
        let mut out = Vec::new();
        let mut page = 1usize;
        while out.len() < limit {
            let mut url = base.clone();
            url.query_pairs_mut()
                .append_pair("per_page", &per_page.to_string())
                .append_pair("page", &page.to_string());
            let batch: Vec<W> = self.get_json(url).await?;
            let fetched = batch.len();
            out.extend(batch.into_iter().filter_map(&keep));
            if fetched < per_page {
                break;
            }
            page += 1;
        }
        out.truncate(limit);
        Ok(out)
    }

    /// Fetch changed-file lists for the first `detail_limit` items concurrently.
    ///
    /// Failures are logged and leave that item's file list empty.
    async fn fetch_file_lists(&self, urls: Vec<Url>) -> Vec<Vec<String>> {
        let mut results: Vec<(usize, Vec<String>)> = futures::stream::iter(urls.into_iter().enumerate())
            .map(|(idx, url)| async move {
                match self.get_json::<FilesWire>(url).await {
                    Ok(wire) => (idx, wire.into_names()),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to fetch changed files");
                        (idx, Vec::new())
                    }
                }
            })
            .buffer_unordered(DETAIL_CONCURRENCY)
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, files)| files).collect()
    }
}

impl SourceHost for GitHubClient {
    fn resolve_branch<'a>(
        &'a self,
        repo: &'a RepositoryRef,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(async move {
            if let Some(branch) = &repo.branch {
                return Ok(branch.clone());
            }
            let meta: RepoWire = self.get_json(self.endpoint(repo, [])?).await?;
            Ok(meta.default_branch)
        })
    }

    fn fetch_tree<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<Vec<TreeEntry>, SourceError>> {
        Box::pin(async move {
            let mut url = self.endpoint(repo, ["git", "trees", branch])?;
            url.query_pairs_mut().append_pair("recursive", "1");
            let tree: TreeWire = self.get_json(url).await?;
            if tree.truncated {
                tracing::warn!(repo = %repo, branch, "tree listing truncated by host");
            }
            Ok(tree
                .tree
                .into_iter()
                .filter_map(|item| {
                    let kind = match item.kind.as_str() {
                        "blob" => EntryKind::File,
                        "tree" => EntryKind::Directory,
                        _ => return None,
                    };
                    Some(TreeEntry {
                        path: item.path,
                        kind,
                        size: item.size,
                    })
                })
                .collect())
        })
    }

    fn fetch_file<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        branch: &'a str,
        path: &'a str,
    ) -> BoxFuture<'a, Result<String, SourceError>> {
        Box::pin(async move {
            let segments = path.split('/').filter(|s| !s.is_empty());
            let mut url = self.endpoint(repo, std::iter::once("contents").chain(segments))?;
            url.query_pairs_mut().append_pair("ref", branch);
            let bytes = self.get_bytes(url, RAW_ACCEPT).await?;
            if bytes.len() > self.max_file_bytes {
                return Err(SourceError::TooLarge {
                    path: path.to_owned(),
                    bytes: bytes.len(),
                    limit: self.max_file_bytes,
                });
            }
            String::from_utf8(bytes).map_err(|_| SourceError::NotText(path.to_owned()))
        })
    }

    fn list_commits<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        branch: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Commit>, SourceError>> {
        Box::pin(async move {
            let mut base = self.endpoint(repo, ["commits"])?;
            base.query_pairs_mut().append_pair("sha", branch);
            let mut commits: Vec<Commit> = self
                .paginate(&base, limit, |w: CommitWire| Some(w.into()))
                .await?;

            let urls = commits
                .iter()
                .take(self.detail_limit)
                .map(|c| self.endpoint(repo, ["commits", c.sha.as_str()]))
                .collect::<Result<Vec<_>, SourceError>>()?;
            for (commit, files) in commits.iter_mut().zip(self.fetch_file_lists(urls).await) {
                commit.files = files;
            }
            Ok(commits)
        })
    }

    fn list_pulls<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<PullRequest>, SourceError>> {
        Box::pin(async move {
            let base = recent_first(self.endpoint(repo, ["pulls"])?);
            let mut pulls: Vec<PullRequest> = self
                .paginate(&base, limit, |w: PullWire| Some(w.into()))
                .await?;

            let urls = pulls
                .iter()
                .take(self.detail_limit)
                .map(|p| self.endpoint(repo, ["pulls", &p.number.to_string(), "files"]))
                .collect::<Result<Vec<_>, SourceError>>()?;
            for (pull, files) in pulls.iter_mut().zip(self.fetch_file_lists(urls).await) {
                pull.files = files;
            }
            Ok(pulls)
        })
    }

    fn list_issues<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Issue>, SourceError>> {
        Box::pin(async move {
            let base = recent_first(self.endpoint(repo, ["issues"])?);
            // The issues endpoint also lists pull requests; drop them.
            self.paginate(&base, limit, |w: IssueWire| {
                w.pull_request.is_none().then(|| w.into())
            })
            .await
        })
    }

    fn list_releases<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Release>, SourceError>> {
        Box::pin(async move {
            let base = self.endpoint(repo, ["releases"])?;
            self.paginate(&base, limit, |w: ReleaseWire| (!w.draft).then(|| w.into()))
                .await
        })
    }

    fn list_contributors<'a>(
        &'a self,
        repo: &'a RepositoryRef,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Contributor>, SourceError>> {
        Box::pin(async move {
            let base = self.endpoint(repo, ["contributors"])?;
            self.paginate(&base, limit, |w: ContributorWire| {
                w.login.map(|login| Contributor {
                    login,
                    contributions: w.contributions,
                })
            })
            .await
        })
    }

    fn repo_meta<'a>(
        &'a self,
        repo: &'a RepositoryRef,
    ) -> BoxFuture<'a, Result<RepoMeta, SourceError>> {
        Box::pin(async move {
            let wire: RepoWire = self.get_json(self.endpoint(repo, [])?).await?;
            Ok(wire.into())
        })
    }
}

/// Listing query for issues and pulls: every state, most recently updated first.
fn recent_first(mut url: Url) -> Url {
    url.query_pairs_mut()
        .append_pair("state", "all")
        .append_pair("sort", "updated")
        .append_pair("direction", "desc");
    url
}

#[derive(Deserialize)]
struct UserWire {
    login: String,
}

#[derive(Deserialize)]
struct LabelWire {
    name: String,
}

#[derive(Deserialize)]
struct LicenseWire {
    spdx_id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct RepoWire {
    full_name: String,
    description: Option<String>,
    default_branch: String,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    license: Option<LicenseWire>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    open_issues_count: u64,
}

impl From<RepoWire> for RepoMeta {
    fn from(w: RepoWire) -> Self {
        Self {
            full_name: w.full_name,
            description: w.description.unwrap_or_default(),
            default_branch: w.default_branch,
            language: w.language,
            topics: w.topics,
            license: w.license.and_then(|l| l.spdx_id.or(l.name)),
            stars: w.stargazers_count,
            forks: w.forks_count,
            open_issues: w.open_issues_count,
        }
    }
}

#[derive(Deserialize)]
struct TreeItemWire {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    size: Option<u64>,
}

#[derive(Deserialize)]
struct TreeWire {
    tree: Vec<TreeItemWire>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct GitAuthorWire {
    name: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct CommitInnerWire {
    message: String,
    author: Option<GitAuthorWire>,
}

#[derive(Deserialize)]
struct CommitWire {
    sha: String,
    commit: CommitInnerWire,
    author: Option<UserWire>,
}

impl From<CommitWire> for Commit {
    fn from(w: CommitWire) -> Self {
        let (git_name, date) = w
            .commit
            .author
            .map_or((None, None), |a| (a.name, a.date));
        Self {
            sha: w.sha,
            message: w.commit.message,
            author: w.author.map(|u| u.login).or(git_name).unwrap_or_default(),
            date,
            files: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct FileWire {
    filename: String,
}

/// Either a commit detail (`{"files": [...]}`) or a pull request file list (`[...]`).
#[derive(Deserialize)]
#[serde(untagged)]
enum FilesWire {
    Commit {
        #[serde(default)]
        files: Vec<FileWire>,
    },
    Pull(Vec<FileWire>),
}

impl FilesWire {
    fn into_names(self) -> Vec<String> {
        let files = match self {
            Self::Commit { files } | Self::Pull(files) => files,
        };
        files.into_iter().map(|f| f.filename).collect()
    }
}

#[derive(Deserialize)]
struct PullWire {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    user: Option<UserWire>,
    #[serde(default)]
    labels: Vec<LabelWire>,
    updated_at: Option<String>,
    merged_at: Option<String>,
}

impl From<PullWire> for PullRequest {
    fn from(w: PullWire) -> Self {
        Self {
            number: w.number,
            title: w.title,
            body: w.body.unwrap_or_default(),
            state: w.state,
            author: w.user.map(|u| u.login).unwrap_or_default(),
            labels: w.labels.into_iter().map(|l| l.name).collect(),
            files: Vec::new(),
            updated_at: w.updated_at,
            merged_at: w.merged_at,
        }
    }
}

#[derive(Deserialize)]
struct IssueWire {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    user: Option<UserWire>,
    #[serde(default)]
    labels: Vec<LabelWire>,
    updated_at: Option<String>,
    pull_request: Option<serde_json::Value>,
}

impl From<IssueWire> for Issue {
    fn from(w: IssueWire) -> Self {
        Self {
            number: w.number,
            title: w.title,
            body: w.body.unwrap_or_default(),
            state: w.state,
            author: w.user.map(|u| u.login).unwrap_or_default(),
            labels: w.labels.into_iter().map(|l| l.name).collect(),
            updated_at: w.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct ReleaseWire {
    tag_name: String,
    name: Option<String>,
    body: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    draft: bool,
}

impl From<ReleaseWire> for Release {
    fn from(w: ReleaseWire) -> Self {
        Self {
            name: w.name.filter(|n| !n.is_empty()).unwrap_or_else(|| w.tag_name.clone()),
            tag: w.tag_name,
            body: w.body.unwrap_or_default(),
            published_at: w.published_at,
            prerelease: w.prerelease,
        }
    }
}

#[derive(Deserialize)]
struct ContributorWire {
    login: Option<String>,
    #[serde(default)]
    contributions: u64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::new(None).unwrap().with_base_url(server.uri())
    }

    fn demo() -> RepositoryRef {
        RepositoryRef::new("octo", "demo", None).unwrap()
    }

    #[test]
    fn endpoint_encodes_each_segment() {
        let c = GitHubClient::new(None).unwrap().with_base_url("https://ghe.example.com/api/v3/");
        let url = c.endpoint(&demo(), ["git", "trees", "feature/x y"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/octo/demo/git/trees/feature%2Fx%20y"
        );
    }

    #[test]
    fn unusable_base_url_is_rejected() {
        let c = GitHubClient::new(None).unwrap().with_base_url("not a url");
        let err = c.endpoint(&demo(), []).unwrap_err();
        assert!(matches!(err, SourceError::InvalidBaseUrl { .. }));
    }

    #[tokio::test]
    async fn branch_and_path_are_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/contents/docs/my%20notes.md"))
            .and(query_param("ref", "feature/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# notes\n"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/trees/feature%2Fx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tree": []})))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server);
        let text = c.fetch_file(&demo(), "feature/x", "docs/my notes.md").await.unwrap();
        assert_eq!(text, "# notes\n");
        assert!(c.fetch_tree(&demo(), "feature/x").await.unwrap().is_empty());
    }

    #[test]
    fn debug_redacts_token() {
        let c = GitHubClient::new(Some("ghp_secret".into())).unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("ghp_secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[tokio::test]
    async fn resolve_branch_prefers_explicit() {
        let server = MockServer::start().await;
        let repo = demo().with_branch("dev");
        assert_eq!(client(&server).resolve_branch(&repo).await.unwrap(), "dev");
    }

    #[tokio::test]
    async fn resolve_branch_uses_default_branch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo"))
            .and(header("accept", JSON_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "octo/demo",
                "default_branch": "trunk",
                "description": null
            })))
            .mount(&server)
            .await;

        assert_eq!(client(&server).resolve_branch(&demo()).await.unwrap(), "trunk");
    }

    #[tokio::test]
    async fn token_is_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo"))
            .and(header("authorization", "Bearer ghp_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "octo/demo",
                "default_branch": "main",
                "topics": ["cli"],
                "license": {"spdx_id": "MIT", "name": "MIT License"},
                "stargazers_count": 7
            })))
            .expect(1)
            .mount(&server)
            .await;

        let c = GitHubClient::new(Some("ghp_abc".into()))
            .unwrap()
            .with_base_url(server.uri());
        let meta = c.repo_meta(&demo()).await.unwrap();
        assert_eq!(meta.license.as_deref(), Some("MIT"));
        assert_eq!(meta.topics, vec!["cli"]);
        assert_eq!(meta.stars, 7);
    }

    #[tokio::test]
    async fn fetch_tree_maps_blob_and_tree() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/trees/main"))
            .and(query_param("recursive", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tree": [
                    {"path": "utils", "type": "tree"},
                    {"path": "utils/math.go", "type": "blob", "size": 120},
                    {"path": "vendored", "type": "commit"}
                ],
                "truncated": false
            })))
            .mount(&server)
            .await;

        let tree = client(&server).fetch_tree(&demo(), "main").await.unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].kind, EntryKind::Directory);
        assert_eq!(tree[1].path, "utils/math.go");
        assert_eq!(tree[1].size, Some(120));
    }

    #[tokio::test]
    async fn fetch_file_returns_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/contents/utils/math.go"))
            .and(query_param("ref", "main"))
            .and(header("accept", RAW_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_string("package utils\n"))
            .mount(&server)
            .await;

        let text = client(&server)
            .fetch_file(&demo(), "main", "utils/math.go")
            .await
            .unwrap();
        assert_eq!(text, "package utils\n");
    }

    #[tokio::test]
    async fn fetch_file_rejects_oversized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let err = client(&server)
            .with_max_file_bytes(16)
            .fetch_file(&demo(), "main", "big.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::TooLarge { bytes: 64, limit: 16, .. }));
    }

    #[tokio::test]
    async fn missing_repo_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).repo_meta(&demo()).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn exhausted_quota_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"))
            .mount(&server)
            .await;

        let err = client(&server).list_releases(&demo(), 5).await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimited));
    }

    #[tokio::test]
    async fn paginates_until_short_page() {
        let server = MockServer::start().await;
        for (page, tags) in [("1", vec!["v5", "v4"]), ("2", vec!["v3", "v2"]), ("3", vec!["v1"])] {
            let body: Vec<_> = tags
                .iter()
                .map(|t| json!({"tag_name": t, "name": t, "body": ""}))
                .collect();
            Mock::given(method("GET"))
                .and(path("/repos/octo/demo/releases"))
                .and(query_param("page", page))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }

        let releases = client(&server)
            .with_page_size(2)
            .list_releases(&demo(), 10)
            .await
            .unwrap();
        let tags: Vec<_> = releases.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, ["v5", "v4", "v3", "v2", "v1"]);
    }

    #[tokio::test]
    async fn pagination_respects_limit() {
        let server = MockServer::start().await;
        let body: Vec<_> = (0..2)
            .map(|i| json!({"login": format!("dev{i}"), "contributions": 10 - i}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/contributors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let people = client(&server)
            .with_page_size(2)
            .list_contributors(&demo(), 3)
            .await
            .unwrap();
        // Every page is full, so the loop stops on the limit.
        assert_eq!(people.len(), 3);
    }

    #[tokio::test]
    async fn issues_exclude_pull_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"number": 3, "title": "Crash on start", "body": null, "state": "open",
                 "user": {"login": "ann"}, "labels": [{"name": "bug"}]},
                {"number": 2, "title": "Add CI", "state": "closed",
                 "pull_request": {"url": "x"}}
            ])))
            .mount(&server)
            .await;

        let issues = client(&server).list_issues(&demo(), 10).await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 3);
        assert_eq!(issues[0].labels, vec!["bug"]);
        assert_eq!(issues[0].body, "");
    }

    #[tokio::test]
    async fn commits_carry_changed_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/commits"))
            .and(query_param("sha", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"sha": "abc", "commit": {"message": "fix add", "author": {"name": "Ann", "date": "2024-05-01T00:00:00Z"}},
                 "author": {"login": "ann"}},
                {"sha": "def", "commit": {"message": "init", "author": null}, "author": null}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/commits/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "abc", "files": [{"filename": "utils/math.go"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/commits/def"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let commits = client(&server).list_commits(&demo(), "main", 10).await.unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].author, "ann");
        assert_eq!(commits[0].files, vec!["utils/math.go"]);
        assert!(commits[1].files.is_empty());
        assert_eq!(commits[1].author, "");
    }

    #[tokio::test]
    async fn pulls_carry_changed_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/pulls"))
            .and(query_param("state", "all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"number": 9, "title": "Harden auth", "body": "Fixes CVE", "state": "closed",
                 "user": {"login": "bob"}, "labels": [{"name": "security"}],
                 "merged_at": "2024-06-01T00:00:00Z"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/pulls/9/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"filename": "auth/session.go"}
            ])))
            .mount(&server)
            .await;

        let pulls = client(&server).list_pulls(&demo(), 5).await.unwrap();
        assert_eq!(pulls[0].files, vec!["auth/session.go"]);
        assert_eq!(pulls[0].labels, vec!["security"]);
        assert!(pulls[0].merged_at.is_some());
    }
}
