//! Answer Synthesizer: bounded prompt assembly, one generation call, and
//! tolerant follow-up question extraction.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use repolens_index::{RetrievalResult, RetrievedChunk};
use repolens_llm::{LlmError, LlmProvider, Message};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::artifacts::ArtifactKind;
use crate::domain::{Domain, RouterDecision};
use crate::filter::{FilterMode, Filtered};
use crate::listing::{ListingItem, truncate_chars};

pub const MAX_FOLLOWUPS: usize = 3;

const INTERROGATIVES: &[&str] = &[
    "what", "why", "how", "when", "where", "which", "who", "whom", "whose", "is", "are", "can",
    "could", "does", "do", "did", "should", "would", "will", "was", "were", "has", "have",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Budget for the serialized context block, in chars.
    pub max_context_chars: usize,
    /// Length of each `RelevantFile::snippet`, in chars.
    pub snippet_chars: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 24_000,
            snippet_chars: 300,
        }
    }
}

/// Why an answer is less than exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackNote {
    /// Nothing was retrieved; the answer has no repository context.
    NoContext,
    /// Keywords matched nothing; the most recent items were used instead.
    RecentItems,
    /// No keywords were available; the listing was used unfiltered.
    Unfiltered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantFile {
    pub path: String,
    pub snippet: String,
    pub relevance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedAnswer {
    /// The full reply, follow-up section included.
    pub answer_text: String,
    pub relevant_files: Vec<RelevantFile>,
    pub followup_questions: Vec<String>,
    pub domain: Domain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackNote>,
    pub extra_data: Value,
}

/// A filtered non-code listing, already rendered for the prompt.
#[derive(Debug, Clone)]
pub struct ListingContext {
    pub domain: Domain,
    /// Text placed above the items (e.g. repository totals for `stats`).
    pub header: Option<String>,
    /// Rendered items, most recent first.
    pub items: Vec<String>,
    pub mode: FilterMode,
    pub total: usize,
    /// Serialized items for `SynthesizedAnswer::extra_data`.
    pub data: Value,
}

impl ListingContext {
    #[must_use]
    pub fn from_filtered<T: ListingItem>(domain: Domain, filtered: &Filtered<T>) -> Self {
        Self {
            domain,
            header: None,
            items: filtered.items.iter().map(ListingItem::render).collect(),
            mode: filtered.mode,
            total: filtered.total,
            data: serde_json::to_value(&filtered.items).unwrap_or(Value::Null),
        }
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }
}

pub enum SynthesisInput<'a> {
    Code {
        namespace: &'a str,
        retrieval: &'a RetrievalResult,
    },
    Listing(&'a ListingContext),
}

fn domain_instruction(domain: Domain) -> &'static str {
    match domain {
        Domain::Code => {
            "Answer from the code excerpts below. Name the files and functions involved and quote short fragments where useful."
        }
        Domain::Commits => {
            "Answer from the commits below. Summarize what changed, when, and by whom; cite short commit hashes."
        }
        Domain::Pulls => {
            "Answer from the pull requests below. Cite PR numbers and mention their state."
        }
        Domain::Issues => "Answer from the issues below. Cite issue numbers and mention their state.",
        Domain::Releases => {
            "Answer from the releases below. Cite release tags and summarize notable changes."
        }
        Domain::Stats => {
            "Answer from the repository statistics and contributor counts below. Quote exact numbers."
        }
        Domain::Users => "Answer from the contributor list below. Quote contribution counts.",
        Domain::RepoMeta => "Answer from the repository metadata below.",
    }
}

fn caveat(note: FallbackNote) -> &'static str {
    match note {
        FallbackNote::NoContext => {
            "Note: no indexed code was found for this repository. Say that the repository may not be indexed yet, and flag anything you add from general knowledge."
        }
        FallbackNote::RecentItems => {
            "Note: no items matched the question's keywords. The items below are the most recent ones instead; say that the answer is approximate."
        }
        FallbackNote::Unfiltered => {
            "Note: the items below were not filtered by keyword."
        }
    }
}

fn system_prompt(repo: &str, instruction: &str, followups: bool) -> String {
    let mut out = format!(
        "You are an assistant answering questions about the repository {repo}.\n{instruction}\nIf the context does not contain the answer, say so instead of guessing."
    );
    if followups {
        out.push_str(
            "\nEnd with a section titled \"Follow-up questions\" containing up to 3 short bulleted questions the user might ask next.",
        );
    }
    out
}

/// Render hits (best first) until the budget is reached. Returns the text
/// and the number of hits included.
fn render_code_context(hits: &[RetrievedChunk], budget: usize) -> (String, usize) {
    let mut out = String::new();
    let mut used_chars = 0;
    let mut included = 0;
    for hit in hits {
        let c = &hit.chunk;
        let block = format!(
            "### {} (lines {}-{}, score {:.3})\n```{}\n{}\n```\n\n",
            c.path, c.start_line, c.end_line, hit.relevance_score, c.language, c.text
        );
        let len = block.chars().count();
        if used_chars + len > budget {
            break;
        }
        used_chars += len;
        out.push_str(&block);
        included += 1;
    }
    (out, included)
}

/// Render items (most recent first) until the budget is reached. Items past
/// the first that does not fit are dropped whole. A header longer than the
/// whole budget is cut, leaving no room for items.
fn render_listing_context(ctx: &ListingContext, budget: usize) -> (String, usize) {
    let mut out = String::new();
    let mut used_chars = 0;
    if let Some(header) = &ctx.header {
        let mut block = format!("{header}\n\n");
        if block.chars().count() > budget {
            block = format!("{}\n\n", truncate_chars(header, budget.saturating_sub(3)));
        }
        let len = block.chars().count();
        if len <= budget {
            used_chars += len;
            out.push_str(&block);
        }
    }
    let mut included = 0;
    for item in &ctx.items {
        let block = format!("- {item}\n");
        let len = block.chars().count();
        if used_chars + len > budget {
            break;
        }
        used_chars += len;
        out.push_str(&block);
        included += 1;
    }
    (out, included)
}

/// One entry per path, keeping the highest-scoring snippet.
fn relevant_files(hits: &[RetrievedChunk], snippet_chars: usize) -> Vec<RelevantFile> {
    let mut seen = HashSet::new();
    let mut files: Vec<RelevantFile> = Vec::new();
    let mut sorted: Vec<&RetrievedChunk> = hits.iter().collect();
    sorted.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    for hit in sorted {
        if seen.insert(hit.chunk.path.as_str()) {
            files.push(RelevantFile {
                path: hit.chunk.path.clone(),
                snippet: truncate_chars(hit.chunk.text.trim(), snippet_chars),
                relevance: hit.relevance_score,
            });
        }
    }
    files
}

fn is_followup_heading(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("follow-up") || lower.contains("follow up") || lower.contains("followup")
}

fn strip_list_marker(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "+ ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest);
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest);
        }
    }
    None
}

fn strip_emphasis(text: &str) -> String {
    text.replace("**", "")
        .trim_matches(|c: char| matches!(c, '*' | '_' | '`' | '"' | '“' | '”') || c.is_whitespace())
        .to_owned()
}

fn looks_like_question(text: &str) -> bool {
    if text.ends_with('?') {
        return true;
    }
    text.split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .is_some_and(|w| INTERROGATIVES.contains(&w.as_str()))
}

/// Follow-up questions from a reply: bulleted or numbered lines after a
/// heading mentioning "follow-up", that end with `?` or start with an
/// interrogative word. At most [`MAX_FOLLOWUPS`].
#[must_use]
pub fn extract_followups(reply: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_section = false;
    for line in reply.lines() {
        let trimmed = line.trim();
        if !in_section {
            in_section = is_followup_heading(trimmed) && strip_list_marker(trimmed).is_none();
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        match strip_list_marker(trimmed) {
            Some(item) => {
                let cleaned = strip_emphasis(item);
                if !cleaned.is_empty() && looks_like_question(&cleaned) {
                    out.push(cleaned);
                    if out.len() == MAX_FOLLOWUPS {
                        break;
                    }
                }
            }
            None if trimmed.starts_with('#') || trimmed.ends_with(':') => break,
            None => {}
        }
    }
    out
}

pub struct AnswerSynthesizer<P> {
    provider: Arc<P>,
    config: SynthesisConfig,
}

impl<P: LlmProvider> AnswerSynthesizer<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, config: SynthesisConfig) -> Self {
        Self { provider, config }
    }

    /// Build the prompt for `question`, call the provider once, and parse
    /// follow-up questions from the reply.
    ///
    /// # Errors
    ///
    /// Returns the provider error when generation fails.
    pub async fn answer(
        &self,
        repo: &str,
        question: &str,
        decision: &RouterDecision,
        input: SynthesisInput<'_>,
    ) -> Result<SynthesizedAnswer, LlmError> {
        let budget = self.config.max_context_chars;
        let (context, fallback, relevant, extra) = match input {
            SynthesisInput::Code {
                namespace,
                retrieval,
            } => {
                let (context, included) = render_code_context(&retrieval.hits, budget);
                let used = &retrieval.hits[..included];
                let fallback = retrieval.is_empty().then_some(FallbackNote::NoContext);
                let extra = json!({
                    "namespace": namespace,
                    "hits": retrieval.len(),
                    "contextChunks": included,
                });
                (context, fallback, relevant_files(used, self.config.snippet_chars), extra)
            }
            SynthesisInput::Listing(ctx) => {
                let (context, included) = render_listing_context(ctx, budget);
                let fallback = match ctx.mode {
                    FilterMode::Matched => None,
                    FilterMode::NoKeywords => Some(FallbackNote::Unfiltered),
                    FilterMode::RecentFallback => Some(FallbackNote::RecentItems),
                };
                let extra = json!({
                    "mode": ctx.mode,
                    "total": ctx.total,
                    "contextItems": included,
                    "items": ctx.data,
                });
                (context, fallback, Vec::new(), extra)
            }
        };

        let mut user = format!("Question: {question}\n");
        if !decision.keywords.is_empty() {
            let _ = writeln!(user, "Keywords: {}", decision.keywords.join(", "));
        }
        if let Some(note) = fallback {
            let _ = writeln!(user, "\n{}", caveat(note));
        }
        let _ = write!(user, "\nContext:\n{context}");

        let messages = [
            Message::system(system_prompt(repo, domain_instruction(decision.domain), true)),
            Message::user(user),
        ];
        let reply = self.provider.chat(&messages).await?;
        let followup_questions = extract_followups(&reply);
        tracing::debug!(
            domain = %decision.domain,
            fallback = ?fallback,
            followups = followup_questions.len(),
            "answer synthesized"
        );

        Ok(SynthesizedAnswer {
            answer_text: reply,
            relevant_files: relevant,
            followup_questions,
            domain: decision.domain,
            fallback,
            extra_data: extra,
        })
    }

    /// Generate an artifact of `kind` from retrieved code.
    ///
    /// # Errors
    ///
    /// Returns the provider error when generation fails.
    pub async fn artifact(
        &self,
        repo: &str,
        kind: ArtifactKind,
        namespace: &str,
        retrieval: &RetrievalResult,
    ) -> Result<SynthesizedAnswer, LlmError> {
        let (context, included) = render_code_context(&retrieval.hits, self.config.max_context_chars);
        let fallback = retrieval.is_empty().then_some(FallbackNote::NoContext);

        let mut user = format!("Task: {}\n", kind.request());
        if let Some(note) = fallback {
            let _ = writeln!(user, "\n{}", caveat(note));
        }
        let _ = write!(user, "\nContext:\n{context}");

        let messages = [
            Message::system(system_prompt(repo, kind.instruction(), false)),
            Message::user(user),
        ];
        let reply = self.provider.chat(&messages).await?;
        tracing::debug!(%kind, chunks = included, "artifact generated");

        Ok(SynthesizedAnswer {
            answer_text: reply,
            relevant_files: relevant_files(&retrieval.hits[..included], self.config.snippet_chars),
            followup_questions: Vec::new(),
            domain: Domain::Code,
            fallback,
            extra_data: json!({
                "artifact": kind,
                "namespace": namespace,
                "contextChunks": included,
            }),
        })
    }
}
