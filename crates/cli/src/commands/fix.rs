//! Fix Command
//!
//! Apply the patch strategies a report calls for.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use testmend_common::{ChangeLogEntry, MendConfig, PatchEngine};

use super::Outcome;
use crate::output::{
    print_error, print_list, print_success, print_warning, OutputFormat, TableDisplay,
};

#[derive(Args, Debug, Default)]
pub struct FixArgs {
    /// Report to patch from (defaults to the newest one in the reports directory)
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Change-log entry display wrapper
#[derive(Serialize)]
pub struct ChangeDisplay {
    #[serde(flatten)]
    pub entry: ChangeLogEntry,
}

impl TableDisplay for ChangeDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Type", "File", "Applied", "Backup"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.entry.kind.clone(),
            self.entry.file.clone(),
            if self.entry.applied { "yes" } else { "no" }.to_string(),
            self.entry
                .backup
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

pub async fn execute(args: FixArgs, config: &MendConfig, format: OutputFormat) -> Result<Outcome> {
    let engine = PatchEngine::new(config).context("Failed to set up patch engine")?;

    let outcome = match args.report {
        Some(report) => Some(
            engine
                .apply_report(&report)
                .with_context(|| format!("Auto-fix failed for {}", report.display()))?,
        ),
        None => {
            let reports = config.reports_path();
            engine
                .apply_latest(&reports)
                .with_context(|| format!("Auto-fix failed in {}", reports.display()))?
        }
    };

    let Some(outcome) = outcome else {
        print_error(&format!(
            "No auto-repair report found in {}",
            config.reports_path().display()
        ));
        return Ok(Outcome::NoReport);
    };

    let summary = format!(
        "Auto-fix summary written to {} ({} of {} changes applied)",
        outcome.summary_path.display(),
        outcome.applied_count(),
        outcome.changes.len()
    );
    if outcome.applied_count() == 0 {
        print_warning(&summary);
    } else {
        print_success(&summary);
    }
    let displays: Vec<ChangeDisplay> = outcome
        .changes
        .into_iter()
        .map(|entry| ChangeDisplay { entry })
        .collect();
    print_list(&displays, format);
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &std::path::Path) -> MendConfig {
        MendConfig::default().anchored(root)
    }

    #[tokio::test]
    async fn test_no_report_maps_to_exit_two() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = execute(FixArgs::default(), &config(dir.path()), OutputFormat::Plain)
            .await
            .unwrap();
        assert_eq!(outcome.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_missing_target_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(config.reports_path()).unwrap();
        std::fs::write(
            config.reports_path().join("auto-repair-1.md"),
            "## Test: Modal\n**File:** `c.spec`\n\n**Error:**\n```\n#closeLargeModal intercepts pointer events\n```\n\n---\n\n",
        )
        .unwrap();

        let outcome = execute(FixArgs::default(), &config, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(outcome.exit_code(), 0);
        assert!(config.reports_path().join("auto-repair-1.fixes.json").exists());
    }

    #[test]
    fn test_change_row() {
        let display = ChangeDisplay {
            entry: ChangeLogEntry {
                kind: "selector:hobbies".to_string(),
                file: "02-practice-form.spec.js".to_string(),
                applied: false,
                resolved: None,
                backup: None,
                extra: Default::default(),
            },
        };
        assert_eq!(
            display.row(),
            vec!["selector:hobbies", "02-practice-form.spec.js", "no", "-"]
        );
    }
}
