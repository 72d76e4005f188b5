//! Language detection and the source-file allow-list.

use std::path::Path;

use repolens_source::{EntryKind, TreeEntry};
use serde::{Deserialize, Serialize};

/// Directory names whose contents are vendored, generated, or build output.
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "dist",
    "build",
    "target",
    ".git",
    "__pycache__",
    ".venv",
];

const LOCK_FILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "go.sum",
    "poetry.lock",
    "Pipfile.lock",
    "composer.lock",
    "Gemfile.lock",
];

/// Source language recognised by extension or well-known file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Rust,
    Go,
    Python,
    JavaScript,
    TypeScript,
    Java,
    Kotlin,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Scala,
    Bash,
    Sql,
    Html,
    Css,
    Toml,
    Yaml,
    Json,
    Markdown,
    Dockerfile,
    Makefile,
}

impl Lang {
    /// Identifier stored in the vector payload.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::Scala => "scala",
            Self::Bash => "bash",
            Self::Sql => "sql",
            Self::Html => "html",
            Self::Css => "css",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Dockerfile => "dockerfile",
            Self::Makefile => "makefile",
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from a repository-relative path.
#[must_use]
pub fn detect_language(path: &str) -> Option<Lang> {
    let path = Path::new(path);
    let file_name = path.file_name()?.to_str()?;
    match file_name {
        "Dockerfile" | "Containerfile" => return Some(Lang::Dockerfile),
        "Makefile" | "GNUmakefile" => return Some(Lang::Makefile),
        _ => {}
    }
    if file_name.starts_with("Dockerfile.") {
        return Some(Lang::Dockerfile);
    }

    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "rs" => Some(Lang::Rust),
        "go" => Some(Lang::Go),
        "py" | "pyi" => Some(Lang::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "tsx" | "mts" | "cts" => Some(Lang::TypeScript),
        "java" => Some(Lang::Java),
        "kt" | "kts" => Some(Lang::Kotlin),
        "c" | "h" => Some(Lang::C),
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => Some(Lang::Cpp),
        "cs" => Some(Lang::CSharp),
        "rb" => Some(Lang::Ruby),
        "php" => Some(Lang::Php),
        "swift" => Some(Lang::Swift),
        "scala" => Some(Lang::Scala),
        "sh" | "bash" | "zsh" => Some(Lang::Bash),
        "sql" => Some(Lang::Sql),
        "html" | "htm" => Some(Lang::Html),
        "css" | "scss" => Some(Lang::Css),
        "toml" => Some(Lang::Toml),
        "yaml" | "yml" => Some(Lang::Yaml),
        "json" => Some(Lang::Json),
        "md" | "markdown" => Some(Lang::Markdown),
        _ => None,
    }
}

/// `true` when any path component is a vendored or generated directory,
/// or the file is a lock file or minified bundle.
#[must_use]
pub fn is_excluded_path(path: &str) -> bool {
    let mut components = path.split('/').peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            return LOCK_FILES.contains(&component)
                || component.ends_with(".min.js")
                || component.ends_with(".min.css");
        }
        if EXCLUDED_DIRS.contains(&component) {
            return true;
        }
    }
    false
}

/// Whether a tree entry should be fetched and chunked.
///
/// Entries whose reported size exceeds `max_file_bytes` are rejected before
/// any content is downloaded; entries without a size are accepted and
/// bounded by the host client instead.
#[must_use]
pub fn is_indexable(entry: &TreeEntry, max_file_bytes: u64) -> bool {
    entry.kind == EntryKind::File
        && !is_excluded_path(&entry.path)
        && detect_language(&entry.path).is_some()
        && entry.size.is_none_or(|size| size <= max_file_bytes)
}
