//! Auto-repair report generation
//!
//! A report is a Markdown document with one section per failure. Its layout
//! is what the patch engine parses back, so the section grammar must stay
//! stable:
//!
//! ````text
//! ## Test: <title>
//! **File:** `<path>`
//!
//! **Error:**
//! ```
//! <error>
//! ```
//!
//! **AI Analysis:**
//! <diagnosis>
//!
//! **Suggested Selectors:**      (optional)
//! <suggestions>
//!
//! ---
//! ````

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::advisory::{self, Advisor};
use crate::error::{IoContext, Result};
use crate::fsutil;
use crate::results::FailureRecord;

/// Placeholder diagnosed when a failing test's source cannot be found
pub const CODE_NOT_AVAILABLE: &str = "Code not available";

/// Report file name prefix; the full name is `auto-repair-<millis>.md`
pub const REPORT_PREFIX: &str = "auto-repair-";
pub const REPORT_EXTENSION: &str = "md";

/// Pattern every generated report name matches
pub const REPORT_NAME_PATTERN: &str = r"^auto-repair-\d+\.md$";

/// One diagnosed failure
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub failure: FailureRecord,
    pub diagnosis: String,
    pub suggested_selectors: Option<String>,
}

/// A complete report, ready to render
#[derive(Debug, Clone)]
pub struct Report {
    /// Local time shown in the heading
    pub generated_at: chrono::DateTime<chrono::Local>,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new(entries: Vec<ReportEntry>) -> Self {
        Self {
            generated_at: chrono::Local::now(),
            entries,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "# Auto-Repair Report - {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        );
        for entry in &self.entries {
            let failure = &entry.failure;
            out.push_str(&format!("## Test: {}\n", failure.title));
            out.push_str(&format!("**File:** `{}`\n\n", failure.file));
            if failure.flaky {
                out.push_str("**Flaky:** yes\n\n");
            }
            out.push_str(&format!("**Error:**\n```\n{}\n```\n\n", failure.error));
            out.push_str(&format!("**AI Analysis:**\n{}\n\n", entry.diagnosis));
            if let Some(suggestions) = &entry.suggested_selectors {
                out.push_str(&format!("**Suggested Selectors:**\n{}\n\n", suggestions));
            }
            out.push_str("---\n\n");
        }
        out
    }
}

/// Turns classified failures into a persisted report
pub struct ReportGenerator<'a> {
    root: PathBuf,
    tests_dir: PathBuf,
    reports_dir: PathBuf,
    advisor: &'a dyn Advisor,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        tests_dir: impl Into<PathBuf>,
        reports_dir: impl Into<PathBuf>,
        advisor: &'a dyn Advisor,
    ) -> Self {
        Self {
            root: root.into(),
            tests_dir: tests_dir.into(),
            reports_dir: reports_dir.into(),
            advisor,
        }
    }

    fn source_for(&self, file: &str) -> String {
        for candidate in fsutil::candidate_paths(&self.root, &self.tests_dir, file) {
            if !candidate.is_file() {
                continue;
            }
            match std::fs::read_to_string(&candidate) {
                Ok(code) => return code,
                Err(e) => warn!("Could not read {}: {}", candidate.display(), e),
            }
        }
        CODE_NOT_AVAILABLE.to_string()
    }

    /// Diagnose failures one at a time, in order.
    pub async fn diagnose(&self, failures: &[FailureRecord]) -> Vec<ReportEntry> {
        let mut entries = Vec::with_capacity(failures.len());
        for failure in failures {
            info!("Analyzing: {}", failure.title);
            let code = self.source_for(&failure.file);
            let diagnosis = self.advisor.analyze_failure(&code, &failure.error).await;

            let suggested_selectors = match advisory::selector_for(failure) {
                Some(selector) => {
                    Some(self.advisor.suggest_alternate_selectors(&selector).await)
                }
                None => None,
            };

            entries.push(ReportEntry {
                failure: failure.clone(),
                diagnosis,
                suggested_selectors,
            });
        }
        entries
    }

    /// Diagnose `failures` and write the report. Returns `None` without
    /// touching the disk when there is nothing to report.
    pub async fn generate(&self, failures: &[FailureRecord]) -> Result<Option<PathBuf>> {
        if failures.is_empty() {
            info!("No failures detected");
            return Ok(None);
        }

        info!("Found {} failures. Starting AI analysis...", failures.len());
        let report = Report::new(self.diagnose(failures).await);

        let path = self.write(&report)?;
        info!("Report generated: {}", path.display());
        Ok(Some(path))
    }

    fn write(&self, report: &Report) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.reports_dir).at(&self.reports_dir)?;
        let path = fsutil::unique_stamped_path(|stamp| report_path(&self.reports_dir, stamp));
        std::fs::write(&path, report.to_markdown()).at(&path)?;
        Ok(path)
    }
}

/// `<dir>/auto-repair-<stamp>.md`
pub fn report_path(dir: &Path, stamp: i64) -> PathBuf {
    dir.join(format!("{}{}.{}", REPORT_PREFIX, stamp, REPORT_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::AdvisoryError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Echoes a canned answer and remembers every prompt
    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Advisor for Recorder {
        async fn complete(&self, prompt: &str) -> std::result::Result<String, AdvisoryError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            Ok(format!("answer {}", prompts.len()))
        }
    }

    fn failure(title: &str, file: &str, error: &str, raw: serde_json::Value) -> FailureRecord {
        FailureRecord {
            title: title.to_string(),
            file: file.to_string(),
            error: error.to_string(),
            raw_result: raw,
            flaky: false,
        }
    }

    #[tokio::test]
    async fn test_no_failures_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let advisor = Recorder::default();
        let reports = dir.path().join("reportes");
        let generator = ReportGenerator::new(dir.path(), "tests", &reports, &advisor);

        assert!(generator.generate(&[]).await.unwrap().is_none());
        assert!(!reports.exists());
        assert!(advisor.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_sections_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        std::fs::write(
            dir.path().join("tests").join("a.spec.js"),
            "await page.click('#closeLargeModal');",
        )
        .unwrap();

        let advisor = Recorder::default();
        let reports = dir.path().join("reportes");
        let generator = ReportGenerator::new(dir.path(), "tests", &reports, &advisor);
        let failures = vec![
            failure(
                "Modal",
                "a.spec.js",
                "Timeout 30000ms exceeded",
                json!({ "error": { "message": "waiting for locator('#closeLargeModal')" } }),
            ),
            FailureRecord {
                flaky: true,
                ..failure("Alerts", "missing.spec.js", "flaky", json!({}))
            },
        ];

        let path = generator.generate(&failures).await.unwrap().unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(regex::Regex::new(REPORT_NAME_PATTERN).unwrap().is_match(&name));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Auto-Repair Report - "));
        let modal = text.find("## Test: Modal").unwrap();
        let alerts = text.find("## Test: Alerts").unwrap();
        assert!(modal < alerts);
        assert!(text.contains(
            "## Test: Modal\n**File:** `a.spec.js`\n\n**Error:**\n```\nTimeout 30000ms exceeded\n```\n\n**AI Analysis:**\nanswer 1\n\n**Suggested Selectors:**\nanswer 2\n\n---\n\n"
        ));
        assert!(text.contains("**File:** `missing.spec.js`\n\n**Flaky:** yes\n\n"));
        assert_eq!(text.matches("\n---\n").count(), 2);

        let prompts = advisor.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("await page.click('#closeLargeModal');"));
        assert!(prompts[1].contains("\"#closeLargeModal\""));
        assert!(prompts[2].contains(CODE_NOT_AVAILABLE));
    }

    #[tokio::test]
    async fn test_reports_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let advisor = Recorder::default();
        let generator = ReportGenerator::new(dir.path(), "tests", dir.path(), &advisor);
        let failures = vec![failure("x", "x.spec.js", "boom", json!({}))];

        let first = generator.generate(&failures).await.unwrap().unwrap();
        let second = generator.generate(&failures).await.unwrap().unwrap();
        assert_ne!(first, second);
        assert!(first.file_name() < second.file_name());
    }
}
