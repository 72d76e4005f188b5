//! Question Router: maps a question to one [`Domain`] plus keywords.
//!
//! The LLM reply is parsed in two explicit stages. [`parse_structured`]
//! accepts only a well-formed JSON object with a known domain. When that
//! fails, [`heuristic_domain`] scans the reply and then the question
//! against a fixed rule table, defaulting to [`Domain::Code`].

use std::sync::{Arc, LazyLock};

use regex::Regex;
use repolens_llm::{LlmProvider, Message};
use serde::Deserialize;

use crate::domain::{Domain, RouterDecision};
use crate::error::{CoreError, Result};

pub const MAX_KEYWORDS: usize = 5;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "how", "what", "why", "when", "where", "which",
    "who", "whom", "does", "did", "this", "that", "these", "those", "with", "from", "into",
    "about", "there", "their", "them", "they", "have", "has", "had", "can", "could", "should",
    "would", "will", "any", "all", "some", "most", "more", "last", "recent", "recently", "repo",
    "repository", "project", "code", "codebase", "please", "tell", "show", "list", "give",
    "find", "explain", "describe", "implemented", "implement", "work", "works", "used", "use",
    "being", "been", "is", "it", "its", "our", "your", "you", "not", "but", "then", "than",
    "also", "just", "like", "get", "got", "made", "make", "there's", "what's",
];

const CLASSIFY_PROMPT: &str = "You classify questions about a software repository.\n\
Choose exactly one domain:\n\
- code: how something is implemented, where code lives, architecture\n\
- commits: commit history, what changed, who changed what\n\
- pulls: pull requests, code review, merges\n\
- issues: bug reports, feature requests, open problems\n\
- releases: versions, tags, changelogs\n\
- stats: numbers such as stars, forks, activity counts\n\
- users: contributors and maintainers\n\
- repoMeta: description, license, topics, primary language\n\
Also extract up to 5 short search keywords from the question.\n\
Reply with JSON only: {\"domain\": \"<domain>\", \"keywords\": [\"...\"]}";

/// Domain-indicative phrases, checked in order; first match wins.
static RULES: LazyLock<Vec<(Domain, Regex)>> = LazyLock::new(|| {
    [
        (Domain::Pulls, r"(?i)\b(pull[\s-]?requests?|prs?|merge requests?|pulls?|merged)\b"),
        (Domain::Issues, r"(?i)\b(issues?|bugs?|tickets?|bug reports?)\b"),
        (Domain::Releases, r"(?i)\b(releases?|released|versions?|changelog|tags?|v\d+(\.\d+)+)\b"),
        (Domain::Commits, r"(?i)\b(commits?|committed|commit history|changed|changes|history)\b"),
        (Domain::Users, r"(?i)\b(contributors?|contributed|maintainers?|authors?|who (wrote|maintains|works))\b"),
        (Domain::Stats, r"(?i)\b(stats|statistics?|stars?|forks?|how many|counts?|popularity|metrics)\b"),
        (Domain::RepoMeta, r"(?i)\b(licen[cs]es?|description|topics?|primary language|metadata|homepage|what is this (repo|repository|project))\b"),
    ]
    .into_iter()
    .map(|(domain, pattern)| (domain, Regex::new(pattern).expect("router rule regex is valid")))
    .collect()
});

/// Which parsing stage produced a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRoute {
    /// The reply decoded as `{"domain", "keywords"}` with a known domain.
    Structured(RouterDecision),
    /// Resolved from the rule table (or the `code` default).
    Heuristic(RouterDecision),
}

impl ParsedRoute {
    #[must_use]
    pub fn decision(&self) -> &RouterDecision {
        match self {
            Self::Structured(d) | Self::Heuristic(d) => d,
        }
    }

    #[must_use]
    pub fn into_decision(self) -> RouterDecision {
        match self {
            Self::Structured(d) | Self::Heuristic(d) => d,
        }
    }
}

#[derive(Deserialize)]
struct RawRoute {
    domain: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Strip an optional surrounding ``` fence (with or without a language tag).
fn strip_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.split_once('\n').map_or(inner, |(first, rest)| {
        if first.trim().chars().all(char::is_alphanumeric) {
            rest
        } else {
            inner
        }
    });
    inner.trim_end().strip_suffix("```").unwrap_or(inner).trim()
}

/// Strict stage: `Some((domain, keywords))` only for a JSON object with a
/// known domain label.
#[must_use]
pub fn parse_structured(reply: &str) -> Option<(Domain, Vec<String>)> {
    let body = strip_fence(reply);
    let raw: RawRoute = serde_json::from_str(body).ok()?;
    let domain = Domain::from_label(&raw.domain)?;
    Some((domain, raw.keywords))
}

/// Heuristic stage: first rule matching `text`, if any.
#[must_use]
pub fn heuristic_domain(text: &str) -> Option<Domain> {
    RULES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(domain, _)| *domain)
}

/// Up to five keywords from the question: lowercased, stop words and words
/// of two characters or fewer removed, question order kept.
#[must_use]
pub fn derive_keywords(question: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in question
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-' || c == '\''))
        .map(|w| w.trim_matches(|c| c == '-' || c == '\'').to_lowercase())
    {
        if word.chars().count() <= 2 || STOP_WORDS.contains(&word.as_str()) || out.contains(&word)
        {
            continue;
        }
        out.push(word);
        if out.len() == MAX_KEYWORDS {
            break;
        }
    }
    out
}

fn normalize_keywords(keywords: Vec<String>, question: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for kw in keywords {
        let kw = kw.trim().to_lowercase();
        if kw.is_empty() || out.contains(&kw) {
            continue;
        }
        out.push(kw);
        if out.len() == MAX_KEYWORDS {
            break;
        }
    }
    if out.is_empty() {
        derive_keywords(question)
    } else {
        out
    }
}

/// Resolve an LLM reply into a decision via the strict stage, falling back
/// to the heuristic stage on the reply and then on the question.
#[must_use]
pub fn parse_reply(reply: &str, question: &str) -> ParsedRoute {
    if let Some((domain, keywords)) = parse_structured(reply) {
        return ParsedRoute::Structured(RouterDecision {
            domain,
            keywords: normalize_keywords(keywords, question),
        });
    }
    ParsedRoute::Heuristic(heuristic_decision(Some(reply), question))
}

fn heuristic_decision(reply: Option<&str>, question: &str) -> RouterDecision {
    let domain = reply
        .and_then(heuristic_domain)
        .or_else(|| heuristic_domain(question))
        .unwrap_or(Domain::Code);
    RouterDecision {
        domain,
        keywords: derive_keywords(question),
    }
}

pub struct QuestionRouter<P> {
    provider: Arc<P>,
}

impl<P: LlmProvider> QuestionRouter<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Classify `question`. Never fails for a non-empty question: a failed
    /// classification call falls back to the heuristic on the question.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Input`] when `question` is blank.
    pub async fn route(&self, question: &str) -> Result<RouterDecision> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CoreError::Input("question must not be empty".into()));
        }

        let messages = [Message::system(CLASSIFY_PROMPT), Message::user(question)];
        let parsed = match self.provider.chat(&messages).await {
            Ok(reply) => parse_reply(&reply, question),
            Err(e) => {
                tracing::warn!("classification call failed, using heuristic: {e:#}");
                ParsedRoute::Heuristic(heuristic_decision(None, question))
            }
        };
        if let ParsedRoute::Heuristic(d) = &parsed {
            tracing::debug!(domain = %d.domain, "router used heuristic stage");
        }
        let decision = parsed.into_decision();
        tracing::info!(domain = %decision.domain, keywords = ?decision.keywords, "question routed");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use repolens_llm::mock::MockProvider;

    use super::*;

    #[test]
    fn strict_stage_accepts_plain_and_fenced_json() {
        let (d, k) = parse_structured(r#"{"domain": "issues", "keywords": ["Security"]}"#).unwrap();
        assert_eq!(d, Domain::Issues);
        assert_eq!(k, vec!["Security"]);

        let fenced = "```json\n{\"domain\": \"pull_requests\", \"keywords\": []}\n```";
        assert_eq!(parse_structured(fenced).unwrap().0, Domain::Pulls);

        let bare_fence = "```\n{\"domain\": \"repo_meta\"}\n```";
        assert_eq!(parse_structured(bare_fence).unwrap().0, Domain::RepoMeta);
    }

    #[test]
    fn strict_stage_rejects_unknown_or_malformed() {
        assert!(parse_structured(r#"{"domain": "weather"}"#).is_none());
        assert!(parse_structured("domain: issues").is_none());
        assert!(parse_structured("").is_none());
    }

    #[test]
    fn heuristic_rules() {
        assert_eq!(heuristic_domain("What changed in the last release?"), Some(Domain::Releases));
        assert_eq!(heuristic_domain("Which pull requests touch auth?"), Some(Domain::Pulls));
        assert_eq!(heuristic_domain("open bugs about login"), Some(Domain::Issues));
        assert_eq!(heuristic_domain("show the commit history"), Some(Domain::Commits));
        assert_eq!(heuristic_domain("who are the top contributors"), Some(Domain::Users));
        assert_eq!(heuristic_domain("how many stars does it have"), Some(Domain::Stats));
        assert_eq!(heuristic_domain("what license is used"), Some(Domain::RepoMeta));
        assert_eq!(heuristic_domain("How is addition implemented?"), None);
        // word boundaries: "prefix" is not "pr", "tissue" is not "issue"
        assert_eq!(heuristic_domain("prefix tissue"), None);
    }

    #[test]
    fn unparseable_reply_scans_reply_then_question() {
        let route = parse_reply("This is about releases.", "anything here");
        assert!(matches!(&route, ParsedRoute::Heuristic(d) if d.domain == Domain::Releases));

        let route = parse_reply("mock response", "What changed in the last release?");
        assert_eq!(route.decision().domain, Domain::Releases);

        let route = parse_reply("no idea", "How is addition implemented?");
        assert_eq!(route.decision().domain, Domain::Code);
    }

    #[test]
    fn structured_keywords_are_normalized() {
        let route = parse_reply(
            r#"{"domain":"code","keywords":["Auth","auth"," token ","","a","b","c","d","e"]}"#,
            "q",
        );
        let d = route.decision();
        assert!(matches!(route, ParsedRoute::Structured(_)));
        assert_eq!(d.keywords, vec!["auth", "token", "a", "b", "c"]);
    }

    #[test]
    fn empty_structured_keywords_fall_back_to_question() {
        let route = parse_reply(r#"{"domain":"issues","keywords":[]}"#, "Any security issues reported?");
        assert_eq!(route.decision().keywords, vec!["security", "issues", "reported"]);
    }

    #[test]
    fn derive_keywords_drops_stop_words_and_short_words() {
        assert_eq!(
            derive_keywords("How is the HTTP client retry logic implemented in Go?"),
            vec!["http", "client", "retry", "logic"]
        );
        assert_eq!(derive_keywords("a an is it"), Vec::<String>::new());
        assert_eq!(
            derive_keywords("one two three four five six seven"),
            vec!["one", "two", "three", "four", "five"]
        );
    }

    #[tokio::test]
    async fn route_uses_structured_reply() {
        let provider = MockProvider::with_responses(vec![
            r#"{"domain": "commits", "keywords": ["parser"]}"#.into(),
        ]);
        let router = QuestionRouter::new(Arc::new(provider));
        let d = router.route("Who touched the parser?").await.unwrap();
        assert_eq!(d.domain, Domain::Commits);
        assert_eq!(d.keywords, vec!["parser"]);
    }

    #[tokio::test]
    async fn route_survives_llm_failure() {
        let router = QuestionRouter::new(Arc::new(MockProvider::failing()));
        let d = router.route("What changed in the last release?").await.unwrap();
        assert_eq!(d.domain, Domain::Releases);
        assert!(d.keywords.len() <= MAX_KEYWORDS);
    }

    #[tokio::test]
    async fn blank_question_is_input_error() {
        let router = QuestionRouter::new(Arc::new(MockProvider::default()));
        assert!(matches!(router.route("   ").await, Err(CoreError::Input(_))));
    }

    proptest! {
        #[test]
        fn any_reply_yields_bounded_decision(reply in ".{0,200}", question in "[a-zA-Z ?]{1,120}") {
            let d = parse_reply(&reply, &question).into_decision();
            prop_assert!(Domain::ALL.contains(&d.domain));
            prop_assert!(d.keywords.len() <= MAX_KEYWORDS);
        }
    }
}
