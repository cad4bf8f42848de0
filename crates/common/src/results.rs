//! Run-result ingestion and failure classification
//!
//! Reads the JSON document emitted by the Playwright JSON reporter and turns
//! every non-passed result (plus flaky specs without a failing result in this
//! run) into a [`FailureRecord`]. Records come out in document order: suite,
//! then spec, then test, then result.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Error, IoContext, Result};

/// Message carried by records synthesized for flaky specs
pub const FLAKY_MESSAGE: &str =
    "Spec marked as flaky (intermittent failures detected in previous runs)";

/// Fallback when a failing result carries no error payload
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Top-level run-result document
///
/// Field types are forgiving: `null` containers read as empty and scalars of
/// an unexpected type read as absent, so only unparseable text is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunResults {
    #[serde(default, deserialize_with = "null_as_default")]
    pub suites: Vec<Suite>,
}

/// A suite: one per test file, with nested describe blocks as child suites
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Suite {
    #[serde(default, deserialize_with = "or_default")]
    pub title: String,
    #[serde(default, deserialize_with = "or_default")]
    pub file: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub specs: Vec<Spec>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suites: Vec<Suite>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Spec {
    #[serde(default, deserialize_with = "or_default")]
    pub title: String,
    #[serde(default, deserialize_with = "or_default")]
    pub ok: Option<bool>,
    #[serde(default, deserialize_with = "or_default")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tests: Vec<SpecTest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecTest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<ResultEntry>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// One attempt of a test. Kept as raw JSON so failure records can carry it
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ResultEntry(pub Value);

impl ResultEntry {
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    /// A result fails when it reports a status other than "passed".
    /// Entries without a status are not counted.
    pub fn is_failure(&self) -> bool {
        matches!(self.status(), Some(status) if !status.is_empty() && status != "passed")
    }

    /// `error.message`, if present
    pub fn error_message(&self) -> Option<&str> {
        self.0
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    /// `error.message`, else `errors[0].message`
    pub fn best_error_message(&self) -> Option<&str> {
        self.error_message().or_else(|| {
            self.0
                .get("errors")
                .and_then(Value::as_array)
                .and_then(|errors| errors.first())
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
        })
    }
}

impl Spec {
    fn is_flaky(&self) -> bool {
        let flagged = self
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("flaky"))
            .unwrap_or(false);
        flagged || self.ok == Some(false)
    }
}

/// A classified failure, one per report section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub title: String,
    pub file: String,
    pub error: String,
    pub raw_result: Value,
    pub flaky: bool,
}

impl FailureRecord {
    /// Error text to scan for selectors: the raw result's own message when
    /// it has one, the record's error otherwise.
    pub fn raw_error_text(&self) -> &str {
        self.raw_result
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(&self.error)
    }
}

impl RunResults {
    /// Parse a run-result document, tolerating trailing garbage.
    ///
    /// A strict parse is tried first. On failure the text is cut after its
    /// last `}` and parsed again; the error from the strict attempt is the
    /// one reported if that also fails.
    pub fn parse(raw: &str, origin: &Path) -> Result<Self> {
        let strict = match serde_json::from_str::<Self>(raw) {
            Ok(results) => return Ok(results),
            Err(e) => e,
        };

        let Some(last_brace) = raw.rfind('}').filter(|&idx| idx > 0) else {
            return Err(Error::MalformedResults {
                path: origin.to_path_buf(),
                source: strict,
                recovery: None,
            });
        };

        match serde_json::from_str::<Self>(&raw[..=last_brace]) {
            Ok(results) => {
                warn!(
                    "{} contained trailing data after the JSON document; parsed the truncated content",
                    origin.display()
                );
                Ok(results)
            }
            Err(retry) => Err(Error::MalformedResults {
                path: origin.to_path_buf(),
                source: strict,
                recovery: Some(retry.to_string()),
            }),
        }
    }

    /// Read a run-result document. `None` means there is nothing to
    /// classify: the file is absent or blank.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path).at(path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Self::parse(&raw, path).map(Some)
    }

    /// Walk suites → specs → tests → results and collect failures.
    pub fn classify(&self) -> Vec<FailureRecord> {
        let mut failures = Vec::new();
        for suite in &self.suites {
            classify_suite(suite, None, &mut failures);
        }
        debug!("Classified {} failure record(s)", failures.len());
        failures
    }
}

fn classify_suite(suite: &Suite, parent_file: Option<&str>, out: &mut Vec<FailureRecord>) {
    let file = suite.file.as_deref().or(parent_file).unwrap_or_default();

    for spec in &suite.specs {
        let flaky_spec = spec.is_flaky();
        for test in &spec.tests {
            let mut failed = false;
            for result in test.results.iter().filter(|r| r.is_failure()) {
                failed = true;
                out.push(FailureRecord {
                    title: spec.title.clone(),
                    file: file.to_string(),
                    error: result
                        .best_error_message()
                        .unwrap_or(UNKNOWN_ERROR)
                        .to_string(),
                    raw_result: result.0.clone(),
                    flaky: false,
                });
            }

            if !failed && flaky_spec {
                out.push(FailureRecord {
                    title: spec.title.clone(),
                    file: file.to_string(),
                    error: FLAKY_MESSAGE.to_string(),
                    raw_result: test
                        .results
                        .first()
                        .map(|r| r.0.clone())
                        .unwrap_or_else(|| Value::Object(Default::default())),
                    flaky: true,
                });
            }
        }
    }

    for child in &suite.suites {
        classify_suite(child, Some(file).filter(|f| !f.is_empty()), out);
    }
}

/// Load and classify in one step; `None` when there were no results at all.
pub fn collect_failures(path: &Path) -> Result<Option<Vec<FailureRecord>>> {
    Ok(RunResults::load(path)?.map(|results| results.classify()))
}
