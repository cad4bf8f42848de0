//! Report-driven patch engine
//!
//! Re-reads a generated report, matches each `**File:**` section against
//! the known failure signatures, rewrites the implicated files behind a
//! backup, then writes a `<report>.fixes.json` summary beside the report.

pub mod strategies;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::MendConfig;
use crate::error::{IoContext, Result};
use crate::fsutil;
use crate::report::REPORT_NAME_PATTERN;

pub use strategies::{SectionStrategy, Strategy};
use strategies::{RunnerTimeout, VisibilityTimeout};

/// One attempted fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    #[serde(rename = "type")]
    pub kind: String,

    /// File as referenced by the report (or the runner config path)
    pub file: String,

    /// Whether the file's contents changed
    pub applied: bool,

    /// Path the reference resolved to, if it exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<PathBuf>,

    /// Pre-mutation copy, when a write happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,

    /// Strategy-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Contents of `<report>.fixes.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSummary {
    /// Report file name
    pub report: String,
    /// Epoch milliseconds of the patch run
    pub timestamp: i64,
    pub changes: Vec<ChangeLogEntry>,
}

/// Result of patching from one report
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub report: PathBuf,
    pub summary_path: PathBuf,
    pub changes: Vec<ChangeLogEntry>,
}

impl PatchOutcome {
    pub fn applied_count(&self) -> usize {
        self.changes.iter().filter(|c| c.applied).count()
    }
}

/// A `**File:**` section of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub file: &'a str,
    pub text: &'a str,
}

/// Highest name in `listing` that matches `pattern`. Report names embed a
/// fixed-width timestamp, so this is also the newest one.
pub fn latest_matching<I, S>(listing: I, pattern: &Regex) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    listing
        .into_iter()
        .filter(|name| pattern.is_match(name.as_ref()))
        .map(|name| name.as_ref().to_string())
        .max()
}

/// Newest `auto-repair-<millis>.md` in `dir`, if any.
pub fn find_latest_report(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let pattern = Regex::new(REPORT_NAME_PATTERN)?;
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).at(dir)? {
        let entry = entry.at(dir)?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(latest_matching(names, &pattern).map(|name| dir.join(name)))
}

fn section_pattern() -> Result<Regex> {
    Ok(Regex::new(r"(?s)\*\*File:\*\* `([^`]+)`.*?(?:\n---|\z)")?)
}

/// Split a report into per-file sections. Each runs from its file marker to
/// the next `---` delimiter line or the end of the document.
pub fn split_sections(markdown: &str) -> Result<Vec<Section<'_>>> {
    let pattern = section_pattern()?;
    Ok(pattern
        .captures_iter(markdown)
        .filter_map(|caps| {
            Some(Section {
                file: caps.get(1)?.as_str(),
                text: caps.get(0)?.as_str(),
            })
        })
        .collect())
}

/// Applies strategies to the files a report implicates
pub struct PatchEngine {
    root: PathBuf,
    tests_dir: PathBuf,
    runner_config: PathBuf,
    runner_config_ref: String,
    section_strategies: Vec<Box<dyn SectionStrategy>>,
    runner_timeout: RunnerTimeout,
    visibility_timeout: VisibilityTimeout,
}

impl PatchEngine {
    pub fn new(config: &MendConfig) -> Result<Self> {
        Ok(Self {
            root: config.project_root.clone(),
            tests_dir: config.tests_dir.clone(),
            runner_config: config.runner_config_path(),
            runner_config_ref: config.runner_config.display().to_string(),
            section_strategies: strategies::default_section_strategies()?,
            runner_timeout: RunnerTimeout::new(config.patch.global_timeout_ms)?,
            visibility_timeout: VisibilityTimeout::new(config.patch.visibility_timeout_ms)?,
        })
    }

    /// Patch from the newest report in `reports_dir`; `None` when there is
    /// no report to work from.
    pub fn apply_latest(&self, reports_dir: &Path) -> Result<Option<PatchOutcome>> {
        match find_latest_report(reports_dir)? {
            Some(report) => {
                info!("Using report: {}", report.display());
                self.apply_report(&report).map(Some)
            }
            None => {
                warn!("No auto-repair report found in {}", reports_dir.display());
                Ok(None)
            }
        }
    }

    /// Apply every matching strategy for `report` and write its summary.
    pub fn apply_report(&self, report: &Path) -> Result<PatchOutcome> {
        let markdown = std::fs::read_to_string(report).at(report)?;
        let mut changes = Vec::new();

        for section in split_sections(&markdown)? {
            debug!("Scanning section for {}", section.file);
            for strategy in &self.section_strategies {
                if strategy.matches(section.text) {
                    let target = fsutil::resolve_existing(&self.root, &self.tests_dir, section.file);
                    changes.push(self.apply(&**strategy, section.file, target)?);
                }
            }
        }

        if mentions_timeout(&markdown) {
            let target = Some(self.runner_config.clone()).filter(|p| p.is_file());
            changes.push(self.apply(&self.runner_timeout, &self.runner_config_ref, target)?);
        }

        if let Some(file) = first_file_before_timeout(&markdown)? {
            let target = fsutil::resolve_existing(&self.root, &self.tests_dir, &file);
            changes.push(self.apply(&self.visibility_timeout, &file, target)?);
        }

        let summary_path = summary_path(report);
        let summary = PatchSummary {
            report: report
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            timestamp: fsutil::now_millis(),
            changes,
        };
        std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
            .at(&summary_path)?;
        info!("Auto-fix summary written to {}", summary_path.display());

        Ok(PatchOutcome {
            report: report.to_path_buf(),
            summary_path,
            changes: summary.changes,
        })
    }

    fn apply<S: Strategy + ?Sized>(
        &self,
        strategy: &S,
        file: &str,
        target: Option<PathBuf>,
    ) -> Result<ChangeLogEntry> {
        let mut entry = ChangeLogEntry {
            kind: strategy.tag().to_string(),
            file: file.to_string(),
            applied: false,
            resolved: None,
            backup: None,
            extra: strategy.details(),
        };

        let Some(target) = target else {
            warn!("{}: {} not found, skipping", strategy.tag(), file);
            return Ok(entry);
        };

        entry.backup = fsutil::rewrite_with_backup(&target, |content| strategy.rewrite(content))?;
        entry.applied = entry.backup.is_some();
        if entry.applied {
            info!("{}: patched {}", strategy.tag(), target.display());
        } else {
            debug!("{}: {} already up to date", strategy.tag(), target.display());
        }
        entry.resolved = Some(target);
        Ok(entry)
    }
}

fn mentions_timeout(markdown: &str) -> bool {
    markdown.to_lowercase().contains("timeout")
}

/// File of the first `**File:**` marker that has "timeout" somewhere after it.
fn first_file_before_timeout(markdown: &str) -> Result<Option<String>> {
    let pattern = Regex::new(r"(?is)\*\*File:\*\* `([^`]+)`.*?timeout")?;
    Ok(pattern
        .captures(markdown)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string()))
}

/// `reportes/auto-repair-1.md` → `reportes/auto-repair-1.fixes.json`
pub fn summary_path(report: &Path) -> PathBuf {
    report.with_extension("fixes.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "# Auto-Repair Report - 2024-01-01 10:00:00\n\n\
## Test: Drag\n**File:** `b.spec.js`\n\n**Error:**\n```\nstrict mode violation: locator('#droppable') resolved to 2 elements\n```\n\n**AI Analysis:**\nUse first.\n\n---\n\n\
## Test: Form\n**File:** `c.spec.js`\n\n**Error:**\n```\nlabel[for=\"hobbies-checkbox-1\"] intercepts pointer events\n```\n\n**AI Analysis:**\nClick the input.\n\n---\n\n";

    fn project() -> (tempfile::TempDir, MendConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = MendConfig {
            project_root: dir.path().to_path_buf(),
            ..MendConfig::default()
        };
        std::fs::create_dir_all(config.reports_path()).unwrap();
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        (dir, config)
    }

    #[test]
    fn test_latest_matching_is_lexicographic_max() {
        let pattern = Regex::new(REPORT_NAME_PATTERN).unwrap();
        let listing = [
            "auto-repair-1700000000000.md",
            "auto-repair-1700000000500.md",
            "auto-repair-1700000000500.fixes.json",
            "notes.md",
            "auto-repair-latest.md",
        ];
        assert_eq!(
            latest_matching(listing, &pattern).as_deref(),
            Some("auto-repair-1700000000500.md")
        );
        assert_eq!(latest_matching(["notes.md"], &pattern), None);
    }

    #[test]
    fn test_find_latest_report_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_latest_report(&dir.path().join("reportes")).unwrap().is_none());
    }

    #[test]
    fn test_split_sections() {
        let sections = split_sections(REPORT).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].file, "b.spec.js");
        assert!(sections[0].text.contains("#droppable"));
        assert!(sections[0].text.ends_with("\n---"));
        assert!(!sections[0].text.contains("hobbies"));
        assert_eq!(sections[1].file, "c.spec.js");

        let unterminated = "**File:** `x.js`\nno delimiter here";
        let sections = split_sections(unterminated).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text, unterminated);
    }

    #[test]
    fn test_summary_path() {
        assert_eq!(
            summary_path(Path::new("reportes/auto-repair-17.md")),
            PathBuf::from("reportes/auto-repair-17.fixes.json")
        );
    }

    #[test]
    fn test_apply_report_patches_sections() {
        let (dir, config) = project();
        let b = dir.path().join("tests").join("b.spec.js");
        std::fs::write(&b, "await page.locator('#droppable').hover();").unwrap();
        let c = dir.path().join("c.spec.js");
        std::fs::write(&c, "await page.check('label[for=\"hobbies-checkbox-1\"]');").unwrap();
        let report = config.reports_path().join("auto-repair-1.md");
        std::fs::write(&report, REPORT).unwrap();

        let engine = PatchEngine::new(&config).unwrap();
        let outcome = engine.apply_report(&report).unwrap();

        let kinds: Vec<_> = outcome.changes.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["selector:droppable", "selector:hobbies"]);
        assert_eq!(outcome.applied_count(), 2);
        assert_eq!(
            std::fs::read_to_string(&b).unwrap(),
            "await page.locator('#droppable').first().hover();"
        );
        assert_eq!(
            std::fs::read_to_string(&c).unwrap(),
            "await page.check('#hobbies-checkbox-1');"
        );

        let backup = outcome.changes[0].backup.as_ref().unwrap();
        assert_eq!(
            std::fs::read_to_string(backup).unwrap(),
            "await page.locator('#droppable').hover();"
        );

        let summary: PatchSummary =
            serde_json::from_str(&std::fs::read_to_string(&outcome.summary_path).unwrap()).unwrap();
        assert_eq!(summary.report, "auto-repair-1.md");
        assert_eq!(summary.changes, outcome.changes);
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let (dir, config) = project();
        let b = dir.path().join("b.spec.js");
        std::fs::write(&b, "page.locator(\"#droppable\")").unwrap();
        let report = config.reports_path().join("auto-repair-1.md");
        std::fs::write(&report, REPORT).unwrap();

        let engine = PatchEngine::new(&config).unwrap();
        engine.apply_report(&report).unwrap();
        let after_first = std::fs::read_to_string(&b).unwrap();
        let outcome = engine.apply_report(&report).unwrap();

        assert_eq!(std::fs::read_to_string(&b).unwrap(), after_first);
        assert_eq!(after_first, "page.locator(\"#droppable\").first()");
        assert!(outcome.changes.iter().all(|c| !c.applied && c.backup.is_none()));
    }

    #[test]
    fn test_visibility_wait_targets_first_file_only() {
        let (dir, config) = project();
        let wait = "await expect(modal).toBeVisible({ timeout: 120000 });";
        let x = dir.path().join("x.spec.js");
        let y = dir.path().join("y.spec.js");
        std::fs::write(&x, wait).unwrap();
        std::fs::write(&y, wait).unwrap();
        let report = config.reports_path().join("auto-repair-1.md");
        std::fs::write(
            &report,
            "## Test: Alerts\n**File:** `x.spec.js`\n\n**Error:**\n```\nexpect(received).toBe(expected)\n```\n\n---\n\n\
## Test: Modal\n**File:** `y.spec.js`\n\n**Error:**\n```\nTest timeout of 30000ms exceeded.\n```\n\n---\n\n",
        )
        .unwrap();

        let outcome = PatchEngine::new(&config).unwrap().apply_report(&report).unwrap();

        let entries: Vec<_> = outcome
            .changes
            .iter()
            .map(|c| (c.kind.as_str(), c.file.as_str(), c.applied))
            .collect();
        assert_eq!(
            entries,
            vec![
                ("timeout", "playwright.config.js", false),
                ("spec:modal-timeout", "x.spec.js", true),
            ]
        );
        assert_eq!(
            std::fs::read_to_string(&x).unwrap(),
            "await expect(modal).toBeVisible({ timeout: 30000 });"
        );
        assert_eq!(std::fs::read_to_string(&y).unwrap(), wait);
    }

    #[test]
    fn test_changelog_entry_json_shape() {
        let mut extra = Map::new();
        extra.insert("strategy".to_string(), Value::from("appendFirst"));
        let entry = ChangeLogEntry {
            kind: "selector:droppable".to_string(),
            file: "b.spec".to_string(),
            applied: false,
            resolved: None,
            backup: None,
            extra,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "selector:droppable",
                "file": "b.spec",
                "applied": false,
                "strategy": "appendFirst"
            })
        );
    }
}
