//! The service exposed upward to a request-handling layer.

use std::str::FromStr;
use std::sync::Arc;

use repolens_index::{
    CodeIndexer, CodeStore, EmbeddingGateway, IndexReport, Namespace, RetrievalResult,
    SemanticRetriever,
};
use repolens_llm::LlmProvider;
use repolens_memory::{GraphSnapshot, GraphStore, VectorStore};
use repolens_source::{RepositoryRef, SourceHost};
use tokio_util::sync::CancellationToken;

use crate::artifacts::ArtifactKind;
use crate::config::Config;
use crate::domain::{Domain, RouterDecision};
use crate::error::{CoreError, Result};
use crate::filter::{FilterConfig, filter_by_keywords};
use crate::listing::ListingItem;
use crate::router::QuestionRouter;
use crate::synthesizer::{AnswerSynthesizer, ListingContext, SynthesisInput, SynthesizedAnswer};
use crate::timeouts::{OperationKind, TimeoutConfig, run_with_deadline};

/// Routes, indexes, retrieves and answers. Every operation runs under the
/// deadline for its [`OperationKind`] and honours the caller's
/// [`CancellationToken`].
pub struct RepoAssistant<P> {
    router: QuestionRouter<P>,
    indexer: CodeIndexer<P>,
    retriever: SemanticRetriever<P>,
    synthesizer: AnswerSynthesizer<P>,
    source: Arc<dyn SourceHost>,
    graph: Option<Arc<dyn GraphStore>>,
    filter: FilterConfig,
    timeouts: TimeoutConfig,
}

impl<P: LlmProvider> RepoAssistant<P> {
    #[must_use]
    pub fn new(
        provider: Arc<P>,
        source: Arc<dyn SourceHost>,
        vectors: Arc<dyn VectorStore>,
        config: &Config,
    ) -> Self {
        let gateway = Arc::new(EmbeddingGateway::new(Arc::clone(&provider)));
        let store = CodeStore::new(vectors, config.index.upsert_batch_size);
        Self {
            router: QuestionRouter::new(Arc::clone(&provider)),
            indexer: CodeIndexer::new(
                Arc::clone(&source),
                Arc::clone(&gateway),
                store.clone(),
                config.index.clone(),
            ),
            retriever: SemanticRetriever::new(gateway, store, config.retrieval.clone()),
            synthesizer: AnswerSynthesizer::new(provider, config.synthesis),
            source,
            graph: None,
            filter: config.filter,
            timeouts: config.timeouts,
        }
    }

    /// Wire a graph store: indexing then records the architecture graph and
    /// [`Self::architecture_graph`] reads it back.
    #[must_use]
    pub fn with_graph_store(mut self, graph: Arc<dyn GraphStore>) -> Self {
        self.indexer = self.indexer.with_graph_store(Arc::clone(&graph));
        self.graph = Some(graph);
        self
    }

    /// Replace the timeout table for every operation.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// # Errors
    ///
    /// Input error for an empty question, or timeout / cancellation.
    pub async fn route_question(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<RouterDecision> {
        run_with_deadline(OperationKind::Interactive, &self.timeouts, cancel, async {
            self.router.route(question).await
        })
        .await
    }

    /// # Errors
    ///
    /// Fails when the source host, embedding provider or a store fails as a
    /// whole; per-file failures are reported in [`IndexReport::errors`].
    pub async fn index_repository(
        &self,
        repo: &RepositoryRef,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        run_with_deadline(OperationKind::Indexing, &self.timeouts, cancel, async {
            let report = self.indexer.index_repository(repo, force).await?;
            Ok::<_, CoreError>(report)
        })
        .await
    }

    /// Route `question`, gather context for the chosen domain and synthesize
    /// an answer.
    ///
    /// # Errors
    ///
    /// Input errors, upstream failures while gathering context or
    /// generating, and timeout / cancellation.
    pub async fn answer_question(
        &self,
        repo: &RepositoryRef,
        question: &str,
        top_k: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAnswer> {
        run_with_deadline(OperationKind::Interactive, &self.timeouts, cancel, async {
            let decision = self.router.route(question).await?;
            self.answer_routed(repo, question, &decision, top_k).await
        })
        .await
    }

    /// # Errors
    ///
    /// Input error for a malformed namespace, empty question or zero
    /// `top_k`; upstream errors from embedding or search.
    pub async fn retrieve_chunks(
        &self,
        namespace: &str,
        question: &str,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult> {
        run_with_deadline(OperationKind::Interactive, &self.timeouts, cancel, async {
            let namespace = Namespace::from_str(namespace)?;
            Ok::<_, CoreError>(self.retriever.retrieve(&namespace, question, top_k).await?)
        })
        .await
    }

    /// The stored architecture graph; empty without a graph store.
    ///
    /// # Errors
    ///
    /// Upstream errors resolving the branch or querying the graph store.
    pub async fn architecture_graph(
        &self,
        repo: &RepositoryRef,
        cancel: &CancellationToken,
    ) -> Result<GraphSnapshot> {
        let Some(graph) = &self.graph else {
            return Ok(GraphSnapshot::default());
        };
        run_with_deadline(OperationKind::Interactive, &self.timeouts, cancel, async {
            let namespace = self.namespace_for(repo).await?;
            Ok::<_, CoreError>(graph.query(namespace.as_str()).await?)
        })
        .await
    }

    /// # Errors
    ///
    /// Upstream errors from retrieval or generation, and timeout /
    /// cancellation.
    pub async fn generate_artifact(
        &self,
        repo: &RepositoryRef,
        kind: ArtifactKind,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAnswer> {
        run_with_deadline(OperationKind::Interactive, &self.timeouts, cancel, async {
            let namespace = self.namespace_for(repo).await?;
            let retrieval = self
                .retriever
                .retrieve(&namespace, kind.retrieval_query(), kind.top_k())
                .await?;
            let label = repo.full_name();
            Ok::<_, CoreError>(
                self.synthesizer
                    .artifact(&label, kind, namespace.as_str(), &retrieval)
                    .await?,
            )
        })
        .await
    }

    async fn namespace_for(&self, repo: &RepositoryRef) -> Result<Namespace> {
        let branch = self.source.resolve_branch(repo).await?;
        Ok(Namespace::new(repo, &branch))
    }

    async fn answer_routed(
        &self,
        repo: &RepositoryRef,
        question: &str,
        decision: &RouterDecision,
        top_k: Option<usize>,
    ) -> Result<SynthesizedAnswer> {
        let label = repo.full_name();
        let limit = self.filter.fetch_limit;
        let keywords = &decision.keywords;
        let domain = decision.domain;
        let ctx = match domain {
            Domain::Code => {
                let namespace = self.namespace_for(repo).await?;
                let top_k = top_k.unwrap_or(self.retriever.config().default_top_k);
                let retrieval = self.retriever.retrieve(&namespace, question, top_k).await?;
                let input = SynthesisInput::Code {
                    namespace: namespace.as_str(),
                    retrieval: &retrieval,
                };
                return Ok(self.synthesizer.answer(&label, question, decision, input).await?);
            }
            Domain::Commits => {
                let branch = self.source.resolve_branch(repo).await?;
                let items = self.source.list_commits(repo, &branch, limit).await?;
                self.filtered(domain, items, keywords)
            }
            Domain::Pulls => {
                let items = self.source.list_pulls(repo, limit).await?;
                self.filtered(domain, items, keywords)
            }
            Domain::Issues => {
                let items = self.source.list_issues(repo, limit).await?;
                self.filtered(domain, items, keywords)
            }
            Domain::Releases => {
                let items = self.source.list_releases(repo, limit).await?;
                self.filtered(domain, items, keywords)
            }
            Domain::Users => {
                let items = self.source.list_contributors(repo, limit).await?;
                self.filtered(domain, items, keywords)
            }
            Domain::Stats => {
                let meta = self.source.repo_meta(repo).await?;
                let items = self.source.list_contributors(repo, limit).await?;
                let contributors = items.len();
                self.filtered(domain, items, keywords).with_header(format!(
                    "{}\ncontributors fetched: {contributors}",
                    meta.render()
                ))
            }
            Domain::RepoMeta => {
                let meta = self.source.repo_meta(repo).await?;
                self.filtered(domain, vec![meta], keywords)
            }
        };
        tracing::debug!(domain = %domain, mode = ?ctx.mode, items = ctx.items.len(), total = ctx.total, "listing filtered");
        Ok(self
            .synthesizer
            .answer(&label, question, decision, SynthesisInput::Listing(&ctx))
            .await?)
    }

    fn filtered<T: ListingItem>(
        &self,
        domain: Domain,
        items: Vec<T>,
        keywords: &[String],
    ) -> ListingContext {
        let filtered = filter_by_keywords(items, keywords, &self.filter);
        ListingContext::from_filtered(domain, &filtered)
    }
}

#[cfg(test)]
mod tests {
    use repolens_llm::mock::MockProvider;
    use repolens_memory::{InMemoryGraphStore, InMemoryVectorStore};
    use repolens_source::mock::MockSourceHost;
    use repolens_source::{Contributor, Issue, Release, RepoMeta};

    use super::*;
    use crate::error::ErrorClass;
    use crate::synthesizer::FallbackNote;

    const MATH_GO: &str = "package utils\n\n// Add returns the sum of a and b.\nfunc Add(a, b int) int {\n\treturn a + b\n}\n";

    fn demo_source() -> MockSourceHost {
        let mut host = MockSourceHost::new("main")
            .with_file("utils/math.go", MATH_GO)
            .with_file("main.go", "package main\n\nimport \"octo/demo/utils\"\n\nfunc main() {\n\tprintln(utils.Add(1, 2))\n}\n")
            .with_file("README.md", "# demo\n\nRenders nothing.\n");
        host.releases = vec![Release {
            tag: "v1.2.0".into(),
            name: "Faster math".into(),
            body: "Add got faster.".into(),
            ..Release::default()
        }];
        host.issues = (1..=25)
            .rev()
            .map(|n| Issue {
                number: n,
                title: format!("Feature request {n}"),
                state: "open".into(),
                ..Issue::default()
            })
            .collect();
        host.contributors = vec![Contributor {
            login: "octocat".into(),
            contributions: 10,
        }];
        host.meta = RepoMeta {
            full_name: "octo/demo".into(),
            description: "Demo math utilities".into(),
            default_branch: "main".into(),
            stars: 42,
            ..RepoMeta::default()
        };
        host
    }

    fn assistant(provider: MockProvider) -> (RepoAssistant<MockProvider>, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let assistant = RepoAssistant::new(
            Arc::clone(&provider),
            Arc::new(demo_source()),
            Arc::new(InMemoryVectorStore::new()),
            &Config::default(),
        );
        (assistant, provider)
    }

    fn repo() -> RepositoryRef {
        "octo/demo".parse().unwrap()
    }

    #[tokio::test]
    async fn code_question_cites_indexed_file() {
        let (assistant, _) = assistant(MockProvider::with_responses(vec![
            r#"{"domain": "code", "keywords": ["addition"]}"#.into(),
            "Add in utils/math.go sums its inputs.".into(),
        ]));
        let cancel = CancellationToken::new();
        let report = assistant.index_repository(&repo(), false, &cancel).await.unwrap();
        assert_eq!(report.namespace, "octo/demo@main");
        assert!(report.chunks_created > 0);

        let answer = assistant
            .answer_question(&repo(), "How is addition implemented?", None, &cancel)
            .await
            .unwrap();
        assert_eq!(answer.domain, Domain::Code);
        assert!(answer.relevant_files.iter().any(|f| f.path == "utils/math.go"));
        assert!(answer.fallback.is_none());
    }

    #[tokio::test]
    async fn unindexed_code_question_flags_no_context() {
        let (assistant, _) = assistant(MockProvider::with_responses(vec![
            r#"{"domain": "code", "keywords": []}"#.into(),
        ]));
        let answer = assistant
            .answer_question(&repo(), "Where is main?", Some(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer.fallback, Some(FallbackNote::NoContext));
        assert!(answer.relevant_files.is_empty());
    }

    #[tokio::test]
    async fn release_question_uses_release_listing() {
        let (assistant, provider) = assistant(MockProvider::with_responses(vec![
            "not json".into(),
            "v1.2.0 made Add faster.".into(),
        ]));
        let answer = assistant
            .answer_question(&repo(), "What changed in the last release?", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer.domain, Domain::Releases);
        let prompt = &provider.requests()[1][1].content;
        assert!(prompt.contains("release v1.2.0"));
    }

    #[tokio::test]
    async fn unmatched_issue_keywords_fall_back_to_recent() {
        let (assistant, _) = assistant(MockProvider::with_responses(vec![
            r#"{"domain": "issues", "keywords": ["security"]}"#.into(),
        ]));
        let answer = assistant
            .answer_question(&repo(), "Any security issues?", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer.domain, Domain::Issues);
        assert_eq!(answer.fallback, Some(FallbackNote::RecentItems));
        assert_eq!(answer.extra_data["items"].as_array().unwrap().len(), 20);
        assert_eq!(answer.extra_data["items"][0]["number"], 25);
    }

    #[tokio::test]
    async fn every_domain_produces_an_answer() {
        for domain in Domain::ALL {
            let route = format!(r#"{{"domain": "{}", "keywords": []}}"#, domain.as_str());
            let (assistant, _) = assistant(MockProvider::with_responses(vec![route]));
            let answer = assistant
                .answer_question(&repo(), "Tell me about this repository", None, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(answer.domain, domain);
        }
    }

    #[tokio::test]
    async fn stats_question_carries_repository_header() {
        let (assistant, provider) = assistant(MockProvider::with_responses(vec![
            r#"{"domain": "stats", "keywords": []}"#.into(),
        ]));
        let answer = assistant
            .answer_question(&repo(), "How many stars?", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer.domain, Domain::Stats);
        assert_eq!(answer.fallback, Some(FallbackNote::RecentItems));
        let prompt = &provider.requests()[1][1].content;
        assert!(prompt.contains("stars: 42"));
        assert!(prompt.contains("octocat (10 contributions)"));
    }

    #[tokio::test]
    async fn empty_question_is_input_error() {
        let (assistant, _) = assistant(MockProvider::default());
        let err = assistant
            .answer_question(&repo(), "  ", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Input);
    }

    #[tokio::test]
    async fn malformed_namespace_is_input_error() {
        let (assistant, _) = assistant(MockProvider::default());
        let err = assistant
            .retrieve_chunks("octo/demo", "q", 5, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Input);
    }

    #[tokio::test]
    async fn retrieve_unindexed_namespace_is_empty() {
        let (assistant, _) = assistant(MockProvider::default());
        let result = assistant
            .retrieve_chunks("octo/demo@main", "How is addition implemented?", 5, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn generation_failure_is_upstream_error() {
        let (assistant, _) = assistant(MockProvider::failing());
        let err = assistant
            .answer_question(&repo(), "How is addition implemented?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Llm(_)));
        assert_eq!(err.class(), ErrorClass::UpstreamUnavailable);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let (assistant, _) = assistant(MockProvider::default().with_delay(3_000));
        let assistant = assistant.with_timeouts(TimeoutConfig {
            interactive_seconds: 1,
            indexing_seconds: 1,
        });
        let err = assistant
            .route_question("What changed?", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Timeout {
                operation: OperationKind::Interactive,
                seconds: 1
            }
        ));
    }

    #[tokio::test]
    async fn cancelled_token_aborts() {
        let (assistant, _) = assistant(MockProvider::default().with_delay(5_000));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = assistant.index_repository(&repo(), false, &cancel).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Cancelled);
    }

    #[tokio::test]
    async fn graph_is_empty_without_store_and_filled_with_one() {
        let cancel = CancellationToken::new();
        let (plain, _) = assistant(MockProvider::default());
        assert!(plain.architecture_graph(&repo(), &cancel).await.unwrap().is_empty());

        let (with_graph, _) = assistant(MockProvider::default());
        let with_graph = with_graph.with_graph_store(Arc::new(InMemoryGraphStore::new()));
        with_graph.index_repository(&repo(), false, &cancel).await.unwrap();
        let snapshot = with_graph.architecture_graph(&repo(), &cancel).await.unwrap();
        assert!(snapshot.nodes.iter().any(|n| n.id == "file:utils/math.go"));
        assert!(!snapshot.edges.is_empty());
    }

    #[tokio::test]
    async fn artifact_uses_indexed_code() {
        let (assistant, provider) = assistant(MockProvider::default());
        let cancel = CancellationToken::new();
        assistant.index_repository(&repo(), false, &cancel).await.unwrap();
        let answer = assistant
            .generate_artifact(&repo(), ArtifactKind::Readme, &cancel)
            .await
            .unwrap();
        assert_eq!(answer.domain, Domain::Code);
        assert_eq!(answer.answer_text, "mock response");
        assert!(answer.followup_questions.is_empty());
        assert_eq!(answer.extra_data["artifact"], "readme");
        let sent = provider.requests();
        assert!(sent.last().unwrap()[1].content.contains("Generate a README"));
    }
}
