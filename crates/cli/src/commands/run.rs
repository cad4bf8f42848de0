//! Run Command
//!
//! Full loop: run the suite, analyze failures, then apply fixes.

use anyhow::{Context, Result};
use tracing::{error, info};

use testmend_common::MendConfig;

use super::fix::{self, FixArgs};
use super::{analyze, Outcome};
use crate::output::OutputFormat;
use crate::runner;

pub async fn execute(config: &MendConfig, format: OutputFormat) -> Result<Outcome> {
    runner::run_tests(&config.runner, &config.project_root, &config.results_path())
        .await
        .context("Failed to capture test results")?;

    // A failed analysis stops the loop before anything is patched.
    if let Err(e) = analyze::execute(config, format).await {
        error!("auto-repair failed. Aborting.");
        return Err(e);
    }

    let outcome = fix::execute(FixArgs::default(), config, format).await?;
    if outcome == Outcome::Done {
        info!("Run completed");
    }
    Ok(outcome)
}
