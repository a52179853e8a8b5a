//! Towel CLI - Main Entry Point
//!
//! `towel run <dir>` replays the suite in `<dir>/towel.xml` against the server
//! under test; `towel fixate <dir>` accepts the staged responses of the last
//! run as the new golden files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use towel_determinism::DeterminismServer;
use towel_runner::{server_url, RunnerConfig, TestRunner};

mod config;
mod output;

use config::{TowelConfig, DEFAULT_CONFIG_FILE};

/// Towel - golden-file HTTP API tests
#[derive(Parser)]
#[command(name = "towel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Server address, scheme included [default: http://127.0.0.1]
    #[arg(short, long, global = true, env = "TOWEL_ADDRESS")]
    address: Option<String>,

    /// Server port [default: 9292]
    #[arg(short, long, global = true, env = "TOWEL_PORT")]
    port: Option<u16>,

    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Write a JSON run report to this file
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the test suite in a directory
    Run {
        /// Directory holding towel.xml and its golden files
        dir: PathBuf,
    },

    /// Promote staged responses to golden files
    Fixate {
        /// Directory holding the staged files
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` when some case failed
async fn execute(cli: Cli) -> anyhow::Result<bool> {
    let config = TowelConfig::load(&cli.config)?.with_overrides(cli.address, cli.port);

    match cli.command {
        Commands::Run { dir } => run(&config, &dir, cli.report).await,
        Commands::Fixate { dir } => {
            let runner = TestRunner::new(runner_config(&config)?)?;
            let promoted = runner
                .fixate(&dir)
                .with_context(|| format!("fixating {}", dir.display()))?;
            output::print_fixated(&promoted);
            Ok(true)
        }
    }
}

fn runner_config(config: &TowelConfig) -> anyhow::Result<RunnerConfig> {
    Ok(RunnerConfig {
        base_url: server_url(&config.server.address, config.server.port)?,
        setup_shell: config.setup.shell.clone(),
        request_timeout: config.server.timeout(),
    })
}

async fn run(config: &TowelConfig, dir: &Path, report_path: Option<PathBuf>) -> anyhow::Result<bool> {
    let runner = TestRunner::new(runner_config(config)?)?;

    let mock = if config.mock_server.enabled {
        let addr = config.mock_server.socket_addr()?;
        let handle = DeterminismServer::new()
            .spawn(addr)
            .await
            .with_context(|| format!("starting determinism service on {}", addr))?;
        info!("Determinism service ready at {}", handle.base_url());
        Some(handle)
    } else {
        None
    };

    let result = runner.run(dir).await;

    if let Some(handle) = mock {
        handle.shutdown().await?;
    }

    let report = result?;
    if let Some(path) = report_path {
        runner.write_report(&report, &path)?;
    }

    output::print_report(&report);
    Ok(report.success())
}
