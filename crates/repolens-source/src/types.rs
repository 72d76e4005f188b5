use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

const GITHUB_WEB_PREFIXES: &[&str] = &["https://github.com/", "http://github.com/", "github.com/"];

/// One indexable unit: a repository and, optionally, a branch.
///
/// `branch = None` means the host's default branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
    pub branch: Option<String>,
}

impl RepositoryRef {
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidRef`] if owner or name are empty or contain
    /// characters a hosted repository name cannot have.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        branch: Option<String>,
    ) -> Result<Self, SourceError> {
        let owner = owner.into();
        let name = name.into();
        let input = format!("{owner}/{name}");
        validate_segment(&owner, &input, "owner")?;
        validate_segment(&name, &input, "name")?;
        if let Some(b) = &branch
            && (b.is_empty() || b.chars().any(char::is_whitespace))
        {
            return Err(SourceError::InvalidRef {
                input,
                reason: "branch must be non-empty and contain no whitespace",
            });
        }
        Ok(Self {
            owner,
            name,
            branch,
        })
    }

    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn validate_segment(segment: &str, input: &str, which: &'static str) -> Result<(), SourceError> {
    let reason = match which {
        "owner" => "owner must be non-empty and use only letters, digits, '-', '_' or '.'",
        _ => "name must be non-empty and use only letters, digits, '-', '_' or '.'",
    };
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(SourceError::InvalidRef {
            input: input.to_owned(),
            reason,
        })
    }
}

impl FromStr for RepositoryRef {
    type Err = SourceError;

    /// Parse `owner/name`, `owner/name@branch`, or a `github.com` URL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut rest = trimmed;
        for prefix in GITHUB_WEB_PREFIXES {
            if let Some(stripped) = rest.strip_prefix(prefix) {
                rest = stripped;
                break;
            }
        }

        let (path, branch) = match rest.split_once('@') {
            Some((path, branch)) => (path, Some(branch.to_owned())),
            None => (rest, None),
        };
        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let Some((owner, name)) = path.split_once('/') else {
            return Err(SourceError::InvalidRef {
                input: s.to_owned(),
                reason: "expected owner/name",
            });
        };
        if name.contains('/') {
            return Err(SourceError::InvalidRef {
                input: s.to_owned(),
                reason: "expected exactly one '/' between owner and name",
            });
        }
        Self::new(owner, name, branch)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)?;
        if let Some(branch) = &self.branch {
            write!(f, "@{branch}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
    /// Blob size in bytes, when the host reports it.
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: Option<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub author: String,
    pub labels: Vec<String>,
    pub files: Vec<String>,
    pub updated_at: Option<String>,
    pub merged_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub author: String,
    pub labels: Vec<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag: String,
    pub name: String,
    pub body: String,
    pub published_at: Option<String>,
    pub prerelease: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub contributions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMeta {
    pub full_name: String,
    pub description: String,
    pub default_branch: String,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub license: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
}
