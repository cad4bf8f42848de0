//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, IoContext, Result};

/// Default config file name, looked up in the project root
pub const CONFIG_FILE_NAME: &str = "testmend.toml";

/// testmend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MendConfig {
    /// Project root; every relative path below resolves against it
    pub project_root: PathBuf,

    /// Conventional directory holding the test scripts
    pub tests_dir: PathBuf,

    /// Directory that receives reports and patch summaries
    pub reports_dir: PathBuf,

    /// Run-result document written by the test runner
    pub results_file: PathBuf,

    /// Shared test-runner configuration carrying the global timeout
    pub runner_config: PathBuf,

    /// Advisory endpoint configuration
    pub advisory: AdvisoryConfig,

    /// Patch constants
    pub patch: PatchConfig,

    /// Test runner invocation
    pub runner: RunnerConfig,
}

impl Default for MendConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            tests_dir: PathBuf::from("tests"),
            reports_dir: PathBuf::from("reportes"),
            results_file: PathBuf::from("test-output.json"),
            runner_config: PathBuf::from("playwright.config.js"),
            advisory: AdvisoryConfig::default(),
            patch: PatchConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

/// Local inference endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Generate endpoint (single POST per exchange)
    pub endpoint: String,

    /// Model name sent with every request
    pub model: String,

    /// Bound on a single exchange
    pub timeout_secs: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "llama3.2".to_string(),
            timeout_secs: 30,
        }
    }
}

impl AdvisoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Constants written by the patch strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Global runner timeout written when a report mentions timeouts
    pub global_timeout_ms: u64,

    /// Bound written into `toBeVisible({ timeout })` waits
    pub visibility_timeout_ms: u64,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            global_timeout_ms: 60_000,
            visibility_timeout_ms: 30_000,
        }
    }
}

/// How the orchestrator invokes the external test runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec![
                "playwright".to_string(),
                "test".to_string(),
                "--reporter=json".to_string(),
            ],
        }
    }
}

impl MendConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).at(path)?;
            let config: Self = toml::from_str(&content)
                .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Load `testmend.toml` from a project root, anchoring the root
    pub fn load_from_root(root: &Path) -> Result<Self> {
        Ok(Self::load(&root.join(CONFIG_FILE_NAME))?.anchored(root))
    }

    /// Resolve a relative `project_root` against `root`.
    pub fn anchored(mut self, root: &Path) -> Self {
        if self.project_root == Path::new(".") {
            self.project_root = root.to_path_buf();
        } else if self.project_root.is_relative() {
            self.project_root = root.join(&self.project_root);
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.advisory.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("advisory.endpoint is empty".to_string()));
        }
        if self.runner.program.trim().is_empty() {
            return Err(Error::InvalidConfig("runner.program is empty".to_string()));
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Get the reports directory
    pub fn reports_path(&self) -> PathBuf {
        self.resolve(&self.reports_dir)
    }

    /// Get the run-result document path
    pub fn results_path(&self) -> PathBuf {
        self.resolve(&self.results_file)
    }

    /// Get the shared runner configuration path
    pub fn runner_config_path(&self) -> PathBuf {
        self.resolve(&self.runner_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MendConfig::default();
        assert_eq!(config.tests_dir, PathBuf::from("tests"));
        assert_eq!(config.patch.global_timeout_ms, 60_000);
        assert_eq!(config.patch.visibility_timeout_ms, 30_000);
        assert_eq!(config.advisory.model, "llama3.2");
        assert_eq!(config.runner.args.last().map(String::as_str), Some("--reporter=json"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MendConfig::load_from_root(dir.path()).unwrap();
        assert_eq!(config.project_root, dir.path());
        assert_eq!(config.reports_path(), dir.path().join("reportes"));
        assert_eq!(config.results_path(), dir.path().join("test-output.json"));
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "reports_dir = \"out/reports\"\n\n[advisory]\nmodel = \"qwen2.5\"\n",
        )
        .unwrap();

        let config = MendConfig::load_from_root(dir.path()).unwrap();
        assert_eq!(config.reports_dir, PathBuf::from("out/reports"));
        assert_eq!(config.advisory.model, "qwen2.5");
        assert_eq!(config.advisory.timeout_secs, 30);
        assert_eq!(config.patch.global_timeout_ms, 60_000);
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[advisory]\nendpoint = \"  \"\n",
        )
        .unwrap();

        let err = MendConfig::load_from_root(dir.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
