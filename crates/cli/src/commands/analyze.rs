//! Analyze Command
//!
//! Ingest the run results, diagnose every failure and write a report.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use testmend_common::results::collect_failures;
use testmend_common::{HttpAdvisor, MendConfig, ReportGenerator};

use super::Outcome;
use crate::output::{print_info, print_item, print_success, OutputFormat, TableDisplay};

#[derive(Serialize)]
pub struct AnalysisDisplay {
    pub failures: usize,
    pub flaky: usize,
    pub report: Option<PathBuf>,
}

impl TableDisplay for AnalysisDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Failures", "Flaky", "Report"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.failures.to_string(),
            self.flaky.to_string(),
            self.report
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

pub async fn execute(config: &MendConfig, format: OutputFormat) -> Result<Outcome> {
    let results = config.results_path();
    let Some(failures) = collect_failures(&results)
        .with_context(|| format!("Failed to ingest {}", results.display()))?
    else {
        print_info(&format!(
            "No test results found at {}. Run tests first.",
            results.display()
        ));
        return Ok(Outcome::Done);
    };

    let advisor = HttpAdvisor::new(&config.advisory).context("Failed to build advisory client")?;
    let generator = ReportGenerator::new(
        &config.project_root,
        &config.tests_dir,
        config.reports_path(),
        &advisor,
    );
    let report = generator
        .generate(&failures)
        .await
        .context("Failed to write auto-repair report")?;

    match &report {
        Some(path) => print_success(&format!("Report generated: {}", path.display())),
        None => print_success("No failures detected."),
    }
    print_item(
        &AnalysisDisplay {
            failures: failures.len(),
            flaky: failures.iter().filter(|f| f.flaky).count(),
            report,
        },
        format,
    );
    Ok(Outcome::Done)
}
