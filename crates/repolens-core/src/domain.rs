use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The data source a question is answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Domain {
    Code,
    Commits,
    Pulls,
    Issues,
    Releases,
    Stats,
    Users,
    RepoMeta,
}

impl Domain {
    pub const ALL: [Self; 8] = [
        Self::Code,
        Self::Commits,
        Self::Pulls,
        Self::Issues,
        Self::Releases,
        Self::Stats,
        Self::Users,
        Self::RepoMeta,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Commits => "commits",
            Self::Pulls => "pulls",
            Self::Issues => "issues",
            Self::Releases => "releases",
            Self::Stats => "stats",
            Self::Users => "users",
            Self::RepoMeta => "repoMeta",
        }
    }

    /// Lenient label lookup: case-insensitive, ignores `_`, `-` and spaces,
    /// and accepts common synonyms.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "code" | "codebase" | "source" | "sourcecode" => Some(Self::Code),
            "commits" | "commit" | "history" => Some(Self::Commits),
            "pulls" | "pull" | "pullrequests" | "pullrequest" | "prs" | "pr" => Some(Self::Pulls),
            "issues" | "issue" | "bugs" => Some(Self::Issues),
            "releases" | "release" | "tags" => Some(Self::Releases),
            "stats" | "statistics" => Some(Self::Stats),
            "users" | "user" | "contributors" | "contributor" | "people" => Some(Self::Users),
            "repometa" | "meta" | "metadata" | "repo" | "repository" => Some(Self::RepoMeta),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown domain {s:?}"))
    }
}

/// Outcome of routing: always a concrete domain and at most five keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterDecision {
    pub domain: Domain,
    pub keywords: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for d in Domain::ALL {
            assert_eq!(Domain::from_label(d.as_str()), Some(d));
            assert_eq!(d.to_string().parse::<Domain>().unwrap(), d);
        }
    }

    #[test]
    fn aliases() {
        assert_eq!(Domain::from_label("pull_requests"), Some(Domain::Pulls));
        assert_eq!(Domain::from_label("PRs"), Some(Domain::Pulls));
        assert_eq!(Domain::from_label("repo_meta"), Some(Domain::RepoMeta));
        assert_eq!(Domain::from_label("metadata"), Some(Domain::RepoMeta));
        assert_eq!(Domain::from_label("contributors"), Some(Domain::Users));
        assert_eq!(Domain::from_label("weather"), None);
    }

    #[test]
    fn serializes_camel_case() {
        assert_eq!(serde_json::to_value(Domain::RepoMeta).unwrap(), "repoMeta");
        let d: Domain = serde_json::from_value(serde_json::json!("pulls")).unwrap();
        assert_eq!(d, Domain::Pulls);
    }
}
