//! Diagnostic advisory client
//!
//! Talks to a local inference endpoint (Ollama's `/api/generate` by default)
//! with a single non-streaming POST per question. Nothing in this module
//! raises to the report generator: every failure is folded into an
//! `AI Analysis Unavailable (<reason>)` string.

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::AdvisoryConfig;
use crate::error::Result;
use crate::results::FailureRecord;

/// Prefix of every degraded diagnosis
pub const UNAVAILABLE_PREFIX: &str = "AI Analysis Unavailable";

/// Why a single advisory exchange produced no text
#[derive(Error, Debug)]
pub enum AdvisoryError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Ollama API Error: {code} {reason} - {body}")]
    Status {
        code: u16,
        reason: String,
        body: String,
    },

    #[error("empty response")]
    EmptyResponse,
}

/// Render an advisory failure as diagnosis text.
pub fn unavailable(reason: impl std::fmt::Display) -> String {
    format!("{} ({})", UNAVAILABLE_PREFIX, reason)
}

/// Collapse an exchange outcome into display text.
pub fn diagnosis_text(outcome: std::result::Result<String, AdvisoryError>) -> String {
    match outcome {
        Ok(text) => text,
        Err(e) => {
            error!("Advisory request failed: {}", e);
            unavailable(e)
        }
    }
}

pub fn failure_prompt(source_code: &str, error_message: &str) -> String {
    format!(
        "You are a QA Automation Expert using Playwright.\n\
         Analyze the following test failure:\n\n\
         CODE:\n{}\n\n\
         ERROR:\n{}\n\n\
         Explain why it failed and suggest a fix. Be concise.\n",
        source_code, error_message
    )
}

pub fn selector_prompt(bad_selector: &str) -> String {
    format!(
        "The selector \"{}\" failed in a Playwright test.\n\
         Suggest 3 alternative robust selectors (CSS or XPath) for this element.\n\
         Return ONLY the selectors as a list.\n",
        bad_selector
    )
}

/// A source of diagnoses.
///
/// Implementors only provide `complete`; the provided methods build the
/// prompts and turn errors into sentinel text.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// One request/response exchange for `prompt`.
    async fn complete(&self, prompt: &str) -> std::result::Result<String, AdvisoryError>;

    async fn analyze_failure(&self, source_code: &str, error_message: &str) -> String {
        diagnosis_text(self.complete(&failure_prompt(source_code, error_message)).await)
    }

    async fn suggest_alternate_selectors(&self, bad_selector: &str) -> String {
        diagnosis_text(self.complete(&selector_prompt(bad_selector)).await)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Advisor backed by an HTTP inference endpoint
pub struct HttpAdvisor {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpAdvisor {
    pub fn new(config: &AdvisoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Advisor for HttpAdvisor {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, AdvisoryError> {
        debug!("POST {} (model {})", self.endpoint, self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisoryError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        let body = response.text().await?;
        let data: Value = match serde_json::from_str(&body) {
            Ok(Value::Null) | Err(_) => return Err(AdvisoryError::EmptyResponse),
            Ok(data) => data,
        };
        Ok(normalize_response(&data))
    }
}

/// Response layouts seen from inference servers, in match order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"response": "..."}`
    Response,
    /// `{"text": "..."}`
    Text,
    /// `{"results": [{"content": [{"type": "output_text", "text": "..."}]}]}`
    ResultsContent,
    /// `{"choices": [{"content": {"text": "..."}}]}`
    ChoiceContentText,
    /// `{"choices": [{"message": {"content": [{"text": "..."}]}}]}`
    ChoiceMessageParts,
    /// `{"choices": [{"message": {"content": "..."}}]}`
    ChoiceMessageString,
}

impl ResponseShape {
    pub const ALL: [ResponseShape; 6] = [
        ResponseShape::Response,
        ResponseShape::Text,
        ResponseShape::ResultsContent,
        ResponseShape::ChoiceContentText,
        ResponseShape::ChoiceMessageParts,
        ResponseShape::ChoiceMessageString,
    ];

    /// Text carried by `data` if it has this layout.
    pub fn extract<'a>(&self, data: &'a Value) -> Option<&'a str> {
        let first_choice = || -> Option<&'a Value> { data.get("choices")?.as_array()?.first() };
        match self {
            ResponseShape::Response => data.get("response")?.as_str(),
            ResponseShape::Text => data.get("text")?.as_str(),
            ResponseShape::ResultsContent => data
                .get("results")?
                .as_array()?
                .first()?
                .get("content")?
                .as_array()?
                .iter()
                .find(|item| {
                    matches!(
                        item.get("type").and_then(Value::as_str),
                        Some("output_text") | Some("output")
                    )
                })?
                .get("text")?
                .as_str()
                .filter(|t| !t.is_empty()),
            ResponseShape::ChoiceContentText => first_choice()?.get("content")?.get("text")?.as_str(),
            ResponseShape::ChoiceMessageParts => first_choice()?
                .get("message")?
                .get("content")?
                .as_array()?
                .first()?
                .get("text")?
                .as_str()
                .filter(|t| !t.is_empty()),
            ResponseShape::ChoiceMessageString => {
                first_choice()?.get("message")?.get("content")?.as_str()
            }
        }
    }
}

/// Pull the answer out of a response body; the whole body serialized when
/// no known layout matches.
pub fn normalize_response(data: &Value) -> String {
    ResponseShape::ALL
        .iter()
        .find_map(|shape| shape.extract(data))
        .map(str::to_string)
        .unwrap_or_else(|| data.to_string())
}

fn selector_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"(?i)locator\(['"](.+?)['"]\)"#,
            r#"(?i)selector ['"](.+?)['"]"#,
            r#"(?i)waiting for locator\(['"](.+?)['"]\)"#,
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// First selector named in `error_text`, trying locator calls, then a
/// `selector '...'` phrase, then `waiting for locator(...)`.
pub fn extract_selector(error_text: &str) -> Option<String> {
    selector_patterns()
        .iter()
        .find_map(|re| re.captures(error_text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether a failure looks like a locator problem worth asking about.
pub fn wants_selector_suggestions(record: &FailureRecord) -> bool {
    let mentions = |text: &str| {
        let lower = text.to_lowercase();
        lower.contains("selector") || lower.contains("timeout")
    };
    mentions(&record.error) || mentions(record.raw_error_text())
}

/// Selector to ask alternatives for, if the failure warrants it.
pub fn selector_for(record: &FailureRecord) -> Option<String> {
    if !wants_selector_suggestions(record) {
        return None;
    }
    extract_selector(record.raw_error_text())
}
