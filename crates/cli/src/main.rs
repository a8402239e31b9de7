use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use stepwise_engine::{ConsoleReporter, ConsoleReporterConfig, DEFAULT_FEATURE_EXTENSION, FeatureRunner, RunConfig};
use stepwise_steps::{RestClient, default_steps};
use tracing::{Level, info};

mod settings;

use settings::Settings;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Run every feature document in a directory against the bundled step library.
#[derive(Debug, Parser)]
#[command(name = "stepwise", version, about)]
struct Cli {
    /// Directory holding the feature documents.
    feature_dir: PathBuf,
    /// YAML settings file (endpoint, headers, world, store, retry).
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
    /// Print every feature and scenario result.
    #[arg(long)]
    print_results: bool,
    /// Print progress events emitted by steps.
    #[arg(long)]
    progress: bool,
    /// Print feature and scenario totals at the end of the run.
    #[arg(long)]
    summary: bool,
    /// Run every scenario once, ignoring retry tags and settings.
    #[arg(long)]
    no_retry: bool,
    /// Extension of the feature documents, without the dot.
    #[arg(long, default_value = DEFAULT_FEATURE_EXTENSION)]
    extension: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let success = run(cli).await?;
    Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_tracing() {
    let filter = log_filter(std::env::var("RUST_LOG").ok());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .try_init();
}

fn log_filter(configured: Option<String>) -> String {
    configured
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.into())
}

async fn run(cli: Cli) -> Result<bool> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let client = match &settings.endpoint {
        Some(endpoint) => RestClient::with_endpoint(endpoint.as_str())?,
        None => RestClient::new()?,
    };
    for (name, value) in &settings.headers {
        client.set_header(name, value).await;
    }

    let reporter = ConsoleReporter::new(ConsoleReporterConfig {
        print_results: cli.print_results,
        print_progress: cli.progress,
        print_summary: cli.summary,
    });
    let mut config = RunConfig::new(&cli.feature_dir)
        .with_reporter(Arc::new(reporter))
        .with_retry(settings.retry_policy(cli.no_retry))
        .with_store(settings.store())
        .with_world(settings.world());
    config.extension = cli.extension;

    let runner = FeatureRunner::new(config).add_step_handlers(default_steps(Arc::new(client)));
    info!(dir = %cli.feature_dir.display(), handlers = runner.registry().len(), "starting run");
    let result = runner
        .run()
        .await
        .with_context(|| format!("run of {} aborted", cli.feature_dir.display()))?;
    info!(success = result.success, features = result.feature_results.len(), "run finished");
    Ok(result.success)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn log_filter_defaults_to_info() {
        assert_eq!(log_filter(None), "info");
        assert_eq!(log_filter(Some(" ".into())), "info");
        assert_eq!(log_filter(Some("stepwise_engine=debug".into())), "stepwise_engine=debug");
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from(["stepwise", "features", "--progress", "--no-retry", "--extension", "gherkin"])
            .expect("valid arguments");
        assert_eq!(cli.feature_dir, PathBuf::from("features"));
        assert!(cli.progress);
        assert!(cli.no_retry);
        assert!(!cli.summary);
        assert_eq!(cli.extension, "gherkin");
        assert!(cli.config.is_none());
    }

    #[tokio::test]
    async fn runs_a_directory_of_features() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join("store.feature"),
            "Feature: Store\n\n  Scenario: Seeded\n    Given \"tenant\" should equal \"acme\"\n",
        )
        .expect("write feature");
        let settings = dir.path().join("settings.yaml");
        std::fs::write(&settings, "store:\n  tenant: acme\n").expect("write settings");

        let cli = Cli::try_parse_from([
            "stepwise".into(),
            dir.path().display().to_string(),
            "--config".into(),
            settings.display().to_string(),
        ])
        .expect("valid arguments");
        assert!(run(cli).await.expect("run completes"));
    }
}
