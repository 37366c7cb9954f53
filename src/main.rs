use anyhow::Context;
use clap::{Parser, Subcommand};
use pull_stats::config::{AppConfig, LogFormat};
use pull_stats::error::CatalogError;
use pull_stats::{Catalog, DataStore, GitHubFetcher, Pipeline, PullFetcher, RepoId, Scope, StoredPulls};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fetches pull requests for a catalog of GitHub repositories and summarizes
/// how they were resolved.
#[derive(Parser, Debug)]
#[command(name = "pull-stats", version, about)]
struct Cli {
    /// Directory holding the pulls/ data tree (overrides DATA_ROOT)
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Repositories processed at once (overrides FETCH_CONCURRENCY_LIMIT)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch pull requests from GitHub, then compute and save statistics
    Run {
        #[command(subcommand)]
        scope: ScopeArg,
    },
    /// Recompute statistics from previously saved raw pull requests
    Recompute {
        #[command(subcommand)]
        scope: ScopeArg,
    },
    /// Rebuild results.json from the saved statistics
    Aggregate,
    /// Print every organization/repository pair in the catalog
    Catalog,
}

#[derive(Subcommand, Debug)]
enum ScopeArg {
    /// Every organization in the catalog, followed by aggregation
    All,
    /// Every repository of one organization
    Org { org: String },
    /// A single repository
    Repo { org: String, repo: String },
}

impl TryFrom<ScopeArg> for Scope {
    type Error = CatalogError;

    fn try_from(arg: ScopeArg) -> Result<Self, Self::Error> {
        match arg {
            ScopeArg::All => Ok(Scope::All),
            ScopeArg::Org { org } => Ok(Scope::Organization(org)),
            ScopeArg::Repo { org, repo } => Ok(Scope::Repository(RepoId::parse(&org, &repo)?)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("invalid configuration in environment")?;
    if let Some(data_root) = cli.data_root {
        config.data_root = data_root;
    }
    if let Some(concurrency) = cli.concurrency {
        config.fetch_concurrency_limit = concurrency;
    }

    init_tracing(config.log_format);

    let catalog = Catalog::load(config.catalog_path()).context("failed to load catalog")?;
    let store = DataStore::new(&config.data_root);
    tracing::debug!(data_root = %config.data_root.display(), "Loaded configuration");

    match cli.command {
        Command::Run { scope } => {
            let scope = Scope::try_from(scope)?;
            let fetcher = GitHubFetcher::new(&config)?;
            let pipeline = Pipeline::new(fetcher, store, catalog)
                .with_concurrency_limit(config.concurrency_limit());
            Ok(execute(&pipeline, scope).await)
        }
        Command::Recompute { scope } => {
            let scope = Scope::try_from(scope)?;
            let pipeline = Pipeline::new(StoredPulls::new(store.clone()), store, catalog)
                .with_concurrency_limit(config.concurrency_limit());
            Ok(execute(&pipeline, scope).await)
        }
        Command::Aggregate => {
            let report = store.aggregate_all()?;
            println!(
                "Aggregated {} statistics into {}",
                report.statistics.len(),
                report.results_path.display()
            );
            for skipped in &report.failures {
                println!("  skip  {}: {}", skipped.path.display(), skipped.reason);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Catalog => {
            for repo_id in catalog.list_all_pairs() {
                println!("{}", repo_id);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pull_stats=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// Runs the pipeline until it finishes or the process is asked to stop.
async fn execute<F: PullFetcher>(pipeline: &Pipeline<F>, scope: Scope) -> ExitCode {
    tracing::info!(?scope, "Starting run");

    let report = tokio::select! {
        report = pipeline.run(&scope) => report,
        _ = shutdown_signal() => {
            tracing::warn!("Run cancelled; repositories in flight were abandoned");
            return ExitCode::FAILURE;
        }
    };

    println!("{}", report);

    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, stopping run");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_scope_rejects_path_like_names() {
        let arg = ScopeArg::Repo {
            org: "orgA".to_string(),
            repo: "../../../escaped".to_string(),
        };
        assert!(matches!(Scope::try_from(arg), Err(CatalogError::Invalid(_))));
    }

    #[test]
    fn test_repo_scope_from_args() {
        let cli = Cli::try_parse_from(["pull-stats", "run", "repo", "emberjs", "ember.js"]).unwrap();
        let Command::Run { scope } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(
            Scope::try_from(scope).unwrap(),
            Scope::Repository(RepoId::new("emberjs", "ember.js"))
        );
    }
}
