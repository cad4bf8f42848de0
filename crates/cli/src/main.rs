//! testmend CLI - Main Entry Point
//!
//! Runs a Playwright suite, turns its failures into an auto-repair report
//! and applies the fixes the report calls for.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use testmend_cli::commands::{analyze, fix, run, Outcome};
use testmend_cli::output::{self, print_error};
use testmend_common::MendConfig;

/// testmend - Report-Driven Self-Healing for Browser Test Suites
#[derive(Parser, Debug)]
#[command(name = "testmend")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project root (where the runner config, tests and reports live)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (defaults to testmend.toml in the project root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Inference endpoint for failure analysis
    #[arg(long, env = "TESTMEND_ADVISORY_URL", global = true)]
    advisory_url: Option<String>,

    /// Model name sent to the inference endpoint
    #[arg(long, env = "TESTMEND_MODEL", global = true)]
    model: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the tests, analyze failures and apply fixes
    Run,

    /// Write an auto-repair report from the last run's results
    Analyze,

    /// Apply fixes from an auto-repair report
    Fix(fix::FixArgs),
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<MendConfig> {
        let mut config = match &self.config {
            Some(path) => MendConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?
                .anchored(&self.root),
            None => MendConfig::load_from_root(&self.root)
                .with_context(|| format!("Failed to load config from {}", self.root.display()))?,
        };
        if let Some(url) = &self.advisory_url {
            config.advisory.endpoint = url.clone();
        }
        if let Some(model) = &self.model {
            config.advisory.model = model.clone();
        }
        Ok(config)
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<Outcome> {
    let config = cli.load_config()?;
    match cli.command {
        Commands::Run => run::execute(&config, cli.format).await,
        Commands::Analyze => analyze::execute(&config, cli.format).await,
        Commands::Fix(args) => fix::execute(args, &config, cli.format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match dispatch(cli).await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}
