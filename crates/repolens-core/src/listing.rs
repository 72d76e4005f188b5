//! Non-code listings: searchable fields and prompt rendering per item type.

use std::fmt::Write as _;

use repolens_source::{Commit, Contributor, Issue, PullRequest, Release, RepoMeta};
use serde::Serialize;

/// An item of a fetched listing that the keyword filter can search and the
/// synthesizer can render.
pub trait ListingItem: Serialize {
    /// Text fields tested for keyword containment.
    fn search_fields(&self) -> Vec<&str>;

    /// Compact structured text for the prompt.
    fn render(&self) -> String;
}

fn join_nonempty(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_owned()
    } else {
        items.join(", ")
    }
}

/// First `max` chars of `text`, on a char boundary, with an ellipsis when cut.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_owned(),
    }
}

const BODY_CHARS: usize = 600;

impl ListingItem for Commit {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.message.as_str(), self.author.as_str()];
        fields.extend(self.files.iter().map(String::as_str));
        fields
    }

    fn render(&self) -> String {
        let short = self.sha.get(..7).unwrap_or(&self.sha);
        let mut out = format!("commit {short} by {}", self.author);
        if let Some(date) = &self.date {
            let _ = write!(out, " on {date}");
        }
        let _ = write!(out, "\n  {}", truncate_chars(self.message.trim(), BODY_CHARS));
        if !self.files.is_empty() {
            let _ = write!(out, "\n  files: {}", join_nonempty(&self.files));
        }
        out
    }
}

impl ListingItem for PullRequest {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.body.as_str(), self.author.as_str()];
        fields.extend(self.labels.iter().map(String::as_str));
        fields.extend(self.files.iter().map(String::as_str));
        fields
    }

    fn render(&self) -> String {
        let state = if self.merged_at.is_some() {
            "merged"
        } else {
            self.state.as_str()
        };
        let mut out = format!("PR #{} [{state}] {} (by {})", self.number, self.title, self.author);
        if let Some(updated) = &self.updated_at {
            let _ = write!(out, " updated {updated}");
        }
        let _ = write!(out, "\n  labels: {}", join_nonempty(&self.labels));
        if !self.files.is_empty() {
            let _ = write!(out, "\n  files: {}", join_nonempty(&self.files));
        }
        if !self.body.trim().is_empty() {
            let _ = write!(out, "\n  {}", truncate_chars(self.body.trim(), BODY_CHARS));
        }
        out
    }
}

impl ListingItem for Issue {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.body.as_str(), self.author.as_str()];
        fields.extend(self.labels.iter().map(String::as_str));
        fields
    }

    fn render(&self) -> String {
        let mut out = format!(
            "issue #{} [{}] {} (by {})",
            self.number, self.state, self.title, self.author
        );
        if let Some(updated) = &self.updated_at {
            let _ = write!(out, " updated {updated}");
        }
        let _ = write!(out, "\n  labels: {}", join_nonempty(&self.labels));
        if !self.body.trim().is_empty() {
            let _ = write!(out, "\n  {}", truncate_chars(self.body.trim(), BODY_CHARS));
        }
        out
    }
}

impl ListingItem for Release {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.tag.as_str(), self.name.as_str(), self.body.as_str()]
    }

    fn render(&self) -> String {
        let mut out = format!("release {} \"{}\"", self.tag, self.name);
        if self.prerelease {
            out.push_str(" (prerelease)");
        }
        if let Some(published) = &self.published_at {
            let _ = write!(out, " published {published}");
        }
        if !self.body.trim().is_empty() {
            let _ = write!(out, "\n  {}", truncate_chars(self.body.trim(), BODY_CHARS * 2));
        }
        out
    }
}

impl ListingItem for Contributor {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.login.as_str()]
    }

    fn render(&self) -> String {
        format!("{} ({} contributions)", self.login, self.contributions)
    }
}

impl ListingItem for RepoMeta {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.full_name.as_str()];
        if !self.description.is_empty() {
            fields.push(self.description.as_str());
        }
        fields.extend(self.language.as_deref());
        fields.extend(self.license.as_deref());
        fields.extend(self.topics.iter().map(String::as_str));
        fields
    }

    fn render(&self) -> String {
        let mut out = self.full_name.clone();
        if !self.description.is_empty() {
            let _ = write!(out, ": {}", self.description);
        }
        let _ = write!(
            out,
            "\n  default branch: {}\n  language: {}\n  license: {}\n  topics: {}\n  stars: {}, forks: {}, open issues: {}",
            self.default_branch,
            self.language.as_deref().unwrap_or("-"),
            self.license.as_deref().unwrap_or("-"),
            join_nonempty(&self.topics),
            self.stars,
            self.forks,
            self.open_issues,
        );
        out
    }
}
