//! `repolens`: ask questions about a hosted repository.
//!
//! ```bash
//! repolens index octo/demo@main --force
//! repolens ask octo/demo "How is addition implemented?"
//! repolens route "What changed in the last release?"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use repolens_core::bootstrap::build_assistant;
use repolens_core::{ArtifactKind, Config, CoreError, RepoAssistant};
use repolens_llm::AnyProvider;
use repolens_source::RepositoryRef;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "repolens", version, about = "Question answering over hosted code repositories")]
struct Cli {
    /// Path to the TOML config file (falls back to `REPOLENS_CONFIG`, then
    /// `config/repolens.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a repository's source files into its namespace
    Index {
        /// `owner/name` or `owner/name@branch`
        repo: RepositoryRef,
        /// Delete the namespace and re-index from scratch
        #[arg(long)]
        force: bool,
    },
    /// Answer a question about a repository
    Ask {
        repo: RepositoryRef,
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Index the repository first (required with the in-memory vector backend)
        #[arg(long)]
        index: bool,
    },
    /// Show which domain and keywords a question routes to
    Route { question: String },
    /// Show the raw chunks retrieved for a question
    Retrieve {
        /// `owner/name@branch`
        namespace: String,
        question: String,
        #[arg(long, default_value_t = 8)]
        top_k: usize,
    },
    /// Print the architecture graph recorded at index time
    Graph {
        repo: RepositoryRef,
        #[arg(long)]
        index: bool,
    },
    /// Generate a README, Dockerfile, comments or refactoring proposals
    Artifact {
        repo: RepositoryRef,
        kind: ArtifactKind,
        #[arg(long)]
        index: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "config loaded");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        on_signal.cancel();
    });

    let assistant = build_assistant(&config).await?;
    run(&assistant, cli.command, &cancel).await
}

async fn run(
    assistant: &RepoAssistant<AnyProvider>,
    command: Command,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Command::Index { repo, force } => {
            let report = assistant
                .index_repository(&repo, force, cancel)
                .await
                .map_err(classified)?;
            print_json(&report)
        }
        Command::Ask {
            repo,
            question,
            top_k,
            index,
        } => {
            if index {
                ensure_indexed(assistant, &repo, cancel).await?;
            }
            let answer = assistant
                .answer_question(&repo, &question, top_k, cancel)
                .await
                .map_err(classified)?;
            print_json(&answer)
        }
        Command::Route { question } => {
            let decision = assistant
                .route_question(&question, cancel)
                .await
                .map_err(classified)?;
            print_json(&decision)
        }
        Command::Retrieve {
            namespace,
            question,
            top_k,
        } => {
            let result = assistant
                .retrieve_chunks(&namespace, &question, top_k, cancel)
                .await
                .map_err(classified)?;
            print_json(&result)
        }
        Command::Graph { repo, index } => {
            if index {
                ensure_indexed(assistant, &repo, cancel).await?;
            }
            let snapshot = assistant
                .architecture_graph(&repo, cancel)
                .await
                .map_err(classified)?;
            print_json(&snapshot)
        }
        Command::Artifact { repo, kind, index } => {
            if index {
                ensure_indexed(assistant, &repo, cancel).await?;
            }
            let artifact = assistant
                .generate_artifact(&repo, kind, cancel)
                .await
                .map_err(classified)?;
            print_json(&artifact)
        }
    }
}

async fn ensure_indexed(
    assistant: &RepoAssistant<AnyProvider>,
    repo: &RepositoryRef,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let report = assistant
        .index_repository(repo, false, cancel)
        .await
        .map_err(classified)?;
    tracing::info!(
        namespace = %report.namespace,
        files = report.files_indexed,
        chunks = report.chunks_created,
        reused = report.reused,
        "repository indexed"
    );
    Ok(())
}

fn classified(err: CoreError) -> anyhow::Error {
    let class = err.class();
    anyhow::Error::new(err).context(format!("{class:?} error"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("REPOLENS_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/repolens.toml")
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
