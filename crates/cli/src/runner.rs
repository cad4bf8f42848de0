//! External test runner invocation
//!
//! The runner's stdout is the JSON reporter document; it is captured into
//! the configured results file. A failing run is expected (that is why we
//! are here), so a non-zero exit only warns.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use testmend_common::config::RunnerConfig;

/// Exit status of the runner, `None` if it could not be started or was
/// killed by a signal.
pub async fn run_tests(runner: &RunnerConfig, root: &Path, results: &Path) -> Result<Option<i32>> {
    info!(
        "Running: {} {} (capturing output to {})",
        runner.program,
        runner.args.join(" "),
        results.display()
    );

    let output = Command::new(&runner.program)
        .args(&runner.args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .await;

    let (stdout, code) = match output {
        Ok(output) => (output.stdout, output.status.code()),
        Err(e) => {
            warn!("{} failed to start: {}", runner.program, e);
            (Vec::new(), None)
        }
    };

    if let Some(parent) = results.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(results, &stdout)
        .with_context(|| format!("Failed to write {}", results.display()))?;

    if code != Some(0) {
        warn!(
            "Test runner exited with code {}. Continuing to auto-repair.",
            code.unwrap_or(1)
        );
    }
    Ok(code)
}
