use std::fmt;
use std::str::FromStr;

use repolens_source::RepositoryRef;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Partition key for every vector and graph operation: `owner/name@branch`.
///
/// Owner and name are lowercased because hosted repository names are
/// case-insensitive; the branch is kept verbatim. `@` cannot appear in an
/// owner or name, so distinct references never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    #[must_use]
    pub fn new(repo: &RepositoryRef, branch: &str) -> Self {
        Self(format!(
            "{}/{}@{branch}",
            repo.owner.to_lowercase(),
            repo.name.to_lowercase()
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Namespace {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let repo: RepositoryRef = s
            .parse()
            .map_err(|e: repolens_source::SourceError| IndexError::InvalidInput(e.to_string()))?;
        let branch = repo.branch.clone().ok_or_else(|| {
            IndexError::InvalidInput(format!("namespace {s:?} must name a branch (owner/name@branch)"))
        })?;
        Ok(Self::new(&repo, &branch))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(owner: &str, name: &str) -> RepositoryRef {
        RepositoryRef::new(owner, name, None).unwrap()
    }

    #[test]
    fn same_ref_same_namespace() {
        assert_eq!(
            Namespace::new(&repo("Octo", "Demo"), "main"),
            Namespace::new(&repo("octo", "demo"), "main")
        );
        assert_eq!(Namespace::new(&repo("octo", "demo"), "main").as_str(), "octo/demo@main");
    }

    #[test]
    fn branches_and_repos_are_distinct() {
        let a = Namespace::new(&repo("octo", "demo"), "main");
        assert_ne!(a, Namespace::new(&repo("octo", "demo"), "Main"));
        assert_ne!(a, Namespace::new(&repo("octo", "demo2"), "main"));
        assert_ne!(a, Namespace::new(&repo("octo-", "demo"), "main"));
    }

    #[test]
    fn parses_display_form() {
        let ns: Namespace = "Octo/Demo@release/1.x".parse().unwrap();
        assert_eq!(ns.to_string(), "octo/demo@release/1.x");
    }

    #[test]
    fn parse_requires_branch() {
        assert!(matches!(
            "octo/demo".parse::<Namespace>(),
            Err(IndexError::InvalidInput(_))
        ));
        assert!("not a namespace".parse::<Namespace>().is_err());
    }
}
