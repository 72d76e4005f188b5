//! Generated artifacts: documents and code produced from indexed context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Readme,
    Dockerfile,
    Comments,
    Refactor,
}

impl ArtifactKind {
    pub const ALL: [Self; 4] = [Self::Readme, Self::Dockerfile, Self::Comments, Self::Refactor];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Readme => "readme",
            Self::Dockerfile => "dockerfile",
            Self::Comments => "comments",
            Self::Refactor => "refactor",
        }
    }

    /// Query used to retrieve context for this artifact.
    #[must_use]
    pub fn retrieval_query(self) -> &'static str {
        match self {
            Self::Readme => {
                "project overview, entry point, main function, public API, configuration and usage"
            }
            Self::Dockerfile => {
                "build configuration, dependencies, package manifest, main entry point, server port, environment variables"
            }
            Self::Comments => "core functions and types with complex logic",
            Self::Refactor => "complex functions, duplicated logic, long methods, error handling",
        }
    }

    /// Chunks retrieved for this artifact.
    #[must_use]
    pub fn top_k(self) -> usize {
        match self {
            Self::Readme | Self::Dockerfile => 12,
            Self::Comments | Self::Refactor => 8,
        }
    }

    #[must_use]
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Readme => {
                "Write a README.md in Markdown: a one-paragraph summary, features, installation, usage with examples, and configuration. Only describe what the code shows."
            }
            Self::Dockerfile => {
                "Write a production Dockerfile for this project using a multi-stage build where the language allows it. Infer the toolchain, build command, exposed ports and entry point from the code. Reply with the Dockerfile followed by brief notes."
            }
            Self::Comments => {
                "Add documentation comments to the code excerpts in the idiom of their language. Reply with the commented code grouped by file path."
            }
            Self::Refactor => {
                "Propose concrete refactorings for the code excerpts. For each, name the file, explain the problem in one sentence, and show the revised code."
            }
        }
    }

    /// The task line placed in the user message.
    #[must_use]
    pub fn request(self) -> &'static str {
        match self {
            Self::Readme => "Generate a README for this repository.",
            Self::Dockerfile => "Generate a Dockerfile for this repository.",
            Self::Comments => "Generate documentation comments for the most important code.",
            Self::Refactor => "Suggest refactorings for the most complex code.",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == lower || (lower == "docs" && *k == Self::Readme))
            .ok_or_else(|| {
                format!("unknown artifact `{s}` (expected readme, dockerfile, comments or refactor)")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Dockerfile".parse::<ArtifactKind>().unwrap(), ArtifactKind::Dockerfile);
        assert_eq!("docs".parse::<ArtifactKind>().unwrap(), ArtifactKind::Readme);
        assert!("changelog".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn display_matches_serde() {
        for kind in ArtifactKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.to_string());
            assert!(kind.top_k() > 0);
        }
    }
}
