//! Architecture graph extraction: directory/file containment plus imports.
//!
//! Import statements are found with per-language regexes. An import that
//! names a path inside the repository links to that file or directory node;
//! anything else becomes a `component` node labelled with the dependency.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use repolens_memory::{EdgeKind, GraphEdge, GraphNode, NodeKind};

use crate::languages::Lang;

const ROOT_ID: &str = "dir:/";

static GO_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).expect("go import regex is valid")
});
static GO_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\bimport\s*\((.*?)\)").expect("go import block regex is valid"));
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("quoted string regex is valid"));
static RUST_USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+((?:::)?\w+(?:::\w+)*)")
        .expect("rust use regex is valid")
});
static PY_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+(\.*\w*(?:\.\w+)*)\s+import\b|import\s+(\w+(?:\.\w+)*))")
        .expect("python import regex is valid")
});
static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)(?:^\s*import\s+(?:[^'";]*?\s+from\s+)?|^\s*export\s+[^'";]*?\s+from\s+|\brequire\(\s*)['"]([^'"]+)['"]"#,
    )
    .expect("js import regex is valid")
});
static JAVA_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*import\s+(?:static\s+)?(\w+(?:\.\w+)*)").expect("java import regex is valid")
});

/// One indexed file and the raw import targets found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImports {
    pub path: String,
    pub lang: Option<Lang>,
    pub imports: Vec<String>,
}

/// Raw import targets in source order, de-duplicated.
#[must_use]
pub fn extract_imports(lang: Lang, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        let s = s.trim();
        if !s.is_empty() && !found.iter().any(|f| f == s) {
            found.push(s.to_owned());
        }
    };

    match lang {
        Lang::Go => {
            for cap in GO_SINGLE.captures_iter(text) {
                push(&cap[1]);
            }
            for block in GO_BLOCK.captures_iter(text) {
                for cap in QUOTED.captures_iter(&block[1]) {
                    push(&cap[1]);
                }
            }
        }
        Lang::Rust => {
            for cap in RUST_USE.captures_iter(text) {
                push(cap[1].trim_start_matches("::"));
            }
        }
        Lang::Python => {
            for cap in PY_IMPORT.captures_iter(text) {
                // `from . import x` names no module
                if let Some(m) = cap.get(1).or_else(|| cap.get(2))
                    && !m.as_str().trim_start_matches('.').is_empty()
                {
                    push(m.as_str());
                }
            }
        }
        Lang::JavaScript | Lang::TypeScript => {
            for cap in JS_IMPORT.captures_iter(text) {
                push(&cap[1]);
            }
        }
        Lang::Java | Lang::Kotlin | Lang::Scala => {
            for cap in JAVA_IMPORT.captures_iter(text) {
                push(&cap[1]);
            }
        }
        _ => {}
    }
    found
}

fn dir_id(path: &str) -> String {
    if path.is_empty() {
        ROOT_ID.to_owned()
    } else {
        format!("dir:{path}")
    }
}

fn file_id(path: &str) -> String {
    format!("file:{path}")
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn last_segment(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

fn strip_extension(path: &str) -> &str {
    let name = last_segment(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &path[..path.len() - (name.len() - dot)],
        _ => path,
    }
}

/// Collapse `.` and `..` segments. `None` when the path escapes the root.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Where an import points.
enum Target {
    File(String),
    Dir(String),
    Component(String),
}

struct Resolver<'a> {
    files: &'a BTreeSet<String>,
    dirs: &'a BTreeSet<String>,
    /// Path without extension -> file path.
    stems: BTreeMap<&'a str, &'a str>,
}

impl<'a> Resolver<'a> {
    fn new(files: &'a BTreeSet<String>, dirs: &'a BTreeSet<String>) -> Self {
        let stems = files.iter().map(|f| (strip_extension(f), f.as_str())).collect();
        Self { files, dirs, stems }
    }

    fn resolve(&self, from: &FileImports, raw: &str) -> Target {
        let lang = from.lang;

        if matches!(lang, Some(Lang::JavaScript | Lang::TypeScript))
            && (raw.starts_with("./") || raw.starts_with("../"))
        {
            let joined = format!("{}/{raw}", parent_dir(&from.path));
            if let Some(target) = normalize(&joined).and_then(|p| self.lookup_exact(&p)) {
                return target;
            }
            return Target::Component(raw.to_owned());
        }

        let candidate = match lang {
            Some(Lang::Rust) => rust_candidate(raw),
            Some(Lang::Python) => Some(raw.trim_start_matches('.').replace('.', "/")),
            Some(Lang::Java | Lang::Kotlin | Lang::Scala) => Some(raw.replace('.', "/")),
            _ => Some(raw.to_owned()),
        };
        let packages_only = lang == Some(Lang::Go);
        if let Some(target) = candidate
            .as_deref()
            .and_then(|c| self.lookup_suffix(c, packages_only))
        {
            return target;
        }
        Target::Component(component_label(lang, raw))
    }

    fn lookup_exact(&self, path: &str) -> Option<Target> {
        if self.files.contains(path) {
            return Some(Target::File(path.to_owned()));
        }
        if let Some(file) = self.stems.get(path) {
            return Some(Target::File((*file).to_owned()));
        }
        for index in ["index.ts", "index.tsx", "index.js", "index.jsx"] {
            let p = format!("{path}/{index}");
            if self.files.contains(&p) {
                return Some(Target::File(p));
            }
        }
        self.dirs.contains(path).then(|| Target::Dir(path.to_owned()))
    }

    /// Match a module path against repository paths, allowing a module
    /// prefix (Go module path, Java source root) before the matched suffix.
    /// Go imports name packages, so `packages_only` skips file matches.
    fn lookup_suffix(&self, candidate: &str, packages_only: bool) -> Option<Target> {
        if candidate.is_empty() {
            return None;
        }
        let suffix = format!("/{candidate}");

        if !packages_only
            && let Some(file) = self
                .stems
                .iter()
                .filter(|&(&stem, _)| stem == candidate || stem.ends_with(&suffix))
                .min_by_key(|&(&stem, _)| stem.len())
                .map(|(_, &file)| file)
        {
            return Some(Target::File(file.to_owned()));
        }
        self.dirs
            .iter()
            .filter(|d| {
                *d == candidate || d.ends_with(&suffix) || candidate.ends_with(&format!("/{d}"))
            })
            .max_by_key(|d| d.len())
            .map(|d| Target::Dir(d.clone()))
    }
}

/// `crate::a::b::Type` -> `a/b`; external crates have no in-repo candidate.
fn rust_candidate(raw: &str) -> Option<String> {
    let mut segments = raw.split("::");
    match segments.next()? {
        "crate" | "self" | "super" => {
            let rest: Vec<&str> = segments
                .take_while(|s| s.chars().next().is_some_and(char::is_lowercase))
                .collect();
            (!rest.is_empty()).then(|| rest.join("/"))
        }
        _ => None,
    }
}

/// Human-facing name for an external dependency.
fn component_label(lang: Option<Lang>, raw: &str) -> String {
    match lang {
        Some(Lang::Rust) => raw.split("::").next().unwrap_or(raw).to_owned(),
        Some(Lang::Python) => raw.trim_start_matches('.').split('.').next().unwrap_or(raw).to_owned(),
        Some(Lang::JavaScript | Lang::TypeScript) => {
            let mut parts = raw.split('/');
            match (parts.next(), parts.next()) {
                (Some(scope), Some(name)) if scope.starts_with('@') => format!("{scope}/{name}"),
                (Some(name), _) => name.to_owned(),
                _ => raw.to_owned(),
            }
        }
        Some(Lang::Java | Lang::Kotlin | Lang::Scala) => raw
            .rsplit_once('.')
            .filter(|(_, class)| class.chars().next().is_some_and(char::is_uppercase))
            .map_or(raw, |(package, _)| package)
            .to_owned(),
        _ => raw.to_owned(),
    }
}

/// Build the node and edge sets for a set of indexed files.
///
/// Output is sorted, so the same input always yields the same graph.
#[must_use]
pub fn build_graph(files: &[FileImports]) -> (Vec<GraphNode>, Vec<GraphEdge>) {
    let file_paths: BTreeSet<String> = files.iter().map(|f| f.path.clone()).collect();
    let mut dir_paths: BTreeSet<String> = BTreeSet::new();
    for path in &file_paths {
        let mut dir = parent_dir(path);
        while !dir.is_empty() && dir_paths.insert(dir.to_owned()) {
            dir = parent_dir(dir);
        }
    }

    let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
    let mut edges: BTreeSet<GraphEdge> = BTreeSet::new();
    let contains = |source: String, target: String| GraphEdge {
        source,
        target,
        kind: EdgeKind::Contains,
    };

    nodes.insert(
        ROOT_ID.to_owned(),
        GraphNode {
            id: ROOT_ID.to_owned(),
            label: "/".to_owned(),
            kind: NodeKind::Directory,
        },
    );
    for dir in &dir_paths {
        let id = dir_id(dir);
        nodes.insert(
            id.clone(),
            GraphNode {
                id: id.clone(),
                label: last_segment(dir).to_owned(),
                kind: NodeKind::Directory,
            },
        );
        edges.insert(contains(dir_id(parent_dir(dir)), id));
    }
    for path in &file_paths {
        let id = file_id(path);
        nodes.insert(
            id.clone(),
            GraphNode {
                id: id.clone(),
                label: last_segment(path).to_owned(),
                kind: NodeKind::File,
            },
        );
        edges.insert(contains(dir_id(parent_dir(path)), id));
    }

    let resolver = Resolver::new(&file_paths, &dir_paths);
    for file in files {
        let source = file_id(&file.path);
        for raw in &file.imports {
            let target = match resolver.resolve(file, raw) {
                Target::File(path) => file_id(&path),
                Target::Dir(path) => dir_id(&path),
                Target::Component(label) => {
                    let id = format!("component:{label}");
                    nodes.entry(id.clone()).or_insert_with(|| GraphNode {
                        id: id.clone(),
                        label,
                        kind: NodeKind::Component,
                    });
                    id
                }
            };
            if target != source {
                edges.insert(GraphEdge {
                    source: source.clone(),
                    target,
                    kind: EdgeKind::Imports,
                });
            }
        }
    }

    (nodes.into_values().collect(), edges.into_iter().collect())
}
