//! Upstreamer CLI entry point.
//!
//! This binary is the composition root. It:
//!
//! 1. **Parses configuration** from `.upstreamer/config.toml` (or `--config`).
//! 2. **Wires observability**: `tracing-subscriber` with JSON or pretty output
//!    and an optional OpenTelemetry OTLP exporter.
//! 3. **Constructs infrastructure** (`GithubClient`, `JsonFileContributionStore`)
//!    and injects it into `PipelineExecutor` / `StatusRefresher`.
//! 4. **Dispatches** one of `submit`, `status` or `list` and prints JSON on stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use github::GithubClient;
use nodes::{PipelineExecutor, StatusRefresh, StatusRefresher};
use pipeline::{
    ActorId, ContributionId, ContributionReceipt, ContributionStore, Credential, PipelineFailure,
    PipelineRun, PipelineRunId, SourceHost, StatusCheckError,
};
use serde::Serialize;
use serde_json::json;
use store::JsonFileContributionStore;
use tracing::info;

mod config;
mod request;
mod telemetry;

use config::Config;
use request::{parse_file_arg, FileArg, SubmitArgs};
use telemetry::{LogFormat, Telemetry};

/// Upstreamer: propose file changes to a GitHub repository through a fork.
#[derive(Parser, Debug)]
#[command(name = "upstreamer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// GitHub bearer token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Identity the contributions are recorded under (defaults to $USER)
    #[arg(long, env = "UPSTREAMER_ACTOR")]
    actor: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// OTLP gRPC endpoint for span export
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fork, branch, commit and open a pull request
    Submit(SubmitCommand),

    /// Refresh the status of open contributions
    Status {
        /// Refresh only this contribution
        #[arg(long)]
        id: Option<ContributionId>,
    },

    /// Print stored contributions
    #[command(alias = "ls")]
    List {
        /// Include contributions of every actor
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args, Debug)]
struct SubmitCommand {
    /// Upstream repository as <owner>/<name>
    #[arg(long)]
    repo: String,

    /// File to write, as <repo-path>=<local-file>; repeat for several files
    #[arg(long = "file", required = true, value_parser = parse_file_arg)]
    files: Vec<FileArg>,

    /// Pull request title
    #[arg(long)]
    title: Option<String>,

    /// Complete pull request body
    #[arg(long, conflicts_with = "description")]
    body: Option<String>,

    /// Text appended to the generated pull request body
    #[arg(long)]
    description: Option<String>,

    /// External reference stored with the contribution
    #[arg(long)]
    challenge_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let telemetry = Telemetry::init(cli.log_format, cli.otlp_endpoint.as_deref())?;

    let result = run(cli).await;
    telemetry.shutdown();
    result
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(&cli.config)?;
    let actor = resolve_actor(cli.actor.as_deref())?;
    let store: Arc<dyn ContributionStore> =
        Arc::new(JsonFileContributionStore::new(config.store.path.clone()));

    match cli.command {
        Commands::List { all } => {
            let filter = (!all).then_some(&actor);
            let contributions = store.list(filter).await?;
            print_json(&contributions)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Submit(submit) => {
            let credential = match submit_credential(actor, cli.token) {
                Ok(credential) => credential,
                Err(failure) => return report_failure(&failure),
            };
            let host = github_host(&config)?;
            let request = SubmitArgs {
                repo: submit.repo,
                files: submit.files,
                title: submit.title,
                body: submit.body,
                description: submit.description,
                challenge_id: submit.challenge_id,
            }
            .into_request(&std::env::current_dir()?)?;

            let executor = PipelineExecutor::new(host, store, config.readiness_policy()?);
            match executor.run(&credential, &request).await {
                Ok(outcome) => {
                    info!(run_id = %outcome.run_id, pr_url = %outcome.contribution.pr_url, "Contribution submitted");
                    print_json(&SubmitReport {
                        run_id: outcome.run_id,
                        contribution_id: outcome.contribution.id,
                        receipt: outcome.receipt(),
                    })?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(failure) => report_failure(&failure),
            }
        }
        Commands::Status { id } => {
            let credential = Credential::from_token(actor.clone(), cli.token)
                .context("status refresh needs a GitHub token (--token or GITHUB_TOKEN)")?;
            let refresher = StatusRefresher::new(github_host(&config)?, store.clone());

            let results = match id {
                Some(id) => {
                    let contribution = store
                        .get(id)
                        .await?
                        .with_context(|| format!("no contribution with id {id}"))?;
                    vec![(id, refresher.refresh(&credential, &contribution).await)]
                }
                None => refresher.refresh_open(&credential, Some(&actor)).await?,
            };

            let failed = results.iter().any(|(_, r)| r.is_err());
            let report: Vec<_> = results.iter().map(|(id, r)| refresh_report(*id, r)).collect();
            print_json(&report)?;
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

/// `submit` output: the receipt plus the identifiers needed to follow up.
#[derive(Debug, Serialize)]
struct SubmitReport {
    run_id: PipelineRunId,
    contribution_id: ContributionId,
    #[serde(flatten)]
    receipt: ContributionReceipt,
}

/// Resolves the `submit` credential. A missing token fails the run at `Init`
/// so it is reported like any other stage failure.
fn submit_credential(
    actor: ActorId,
    token: Option<String>,
) -> Result<Credential, PipelineFailure> {
    Credential::from_token(actor, token).map_err(|cause| PipelineRun::start().fail(cause))
}

fn report_failure(failure: &PipelineFailure) -> Result<ExitCode> {
    eprintln!("error: {failure}");
    print_json(failure)?;
    Ok(ExitCode::FAILURE)
}

fn github_host(config: &Config) -> Result<Arc<dyn SourceHost>> {
    let client = GithubClient::new(&config.github_client())
        .context("failed to construct GitHub client")?;
    Ok(Arc::new(client))
}

/// Explicit value, then `$USER`, then `local`.
fn resolve_actor(explicit: Option<&str>) -> Result<ActorId> {
    let raw = explicit
        .map(str::to_string)
        .or_else(|| std::env::var("USER").ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "local".to_string());
    ActorId::new(raw).context("actor must not be empty")
}

fn refresh_report(
    id: ContributionId,
    result: &Result<StatusRefresh, StatusCheckError>,
) -> serde_json::Value {
    match result {
        Ok(refresh) => json!({
            "id": id,
            "previous": refresh.previous,
            "current": refresh.current,
            "changed": refresh.changed(),
        }),
        Err(e) => json!({
            "id": id,
            "error": e.to_string(),
        }),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}
