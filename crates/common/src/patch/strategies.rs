//! Known failure signatures and the textual fixes they map to
//!
//! Every rewrite is idempotent: running it on its own output returns the
//! text unchanged.

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::error::Result;

/// A named textual transform over one file
pub trait Strategy: Send + Sync {
    /// Change-log `type` tag
    fn tag(&self) -> &'static str;

    /// Rewrite file contents. Must return the input unchanged when there is
    /// nothing left to fix.
    fn rewrite(&self, content: &str) -> String;

    /// Extra change-log fields
    fn details(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// A strategy triggered by the text of a single report section
pub trait SectionStrategy: Strategy {
    fn matches(&self, section: &str) -> bool;
}

fn mentions(text: &str, keyword: &str) -> bool {
    text.to_lowercase().contains(&keyword.to_lowercase())
}

/// Ambiguous locator: `page.locator('<selector>')` gains `.first()`.
pub struct AppendFirst {
    keyword: String,
    selector: String,
    pattern: Regex,
}

impl AppendFirst {
    pub fn new(keyword: &str, selector: &str) -> Result<Self> {
        let esc = regex::escape(selector);
        let pattern = Regex::new(&format!(
            r#"page\.locator\((?:'{esc}'|"{esc}"|`{esc}`)\)(\.first\(\))?"#
        ))?;
        Ok(Self {
            keyword: keyword.to_string(),
            selector: selector.to_string(),
            pattern,
        })
    }

    pub fn droppable() -> Result<Self> {
        Self::new("droppable", "#droppable")
    }
}

impl Strategy for AppendFirst {
    fn tag(&self) -> &'static str {
        "selector:droppable"
    }

    fn rewrite(&self, content: &str) -> String {
        self.pattern
            .replace_all(content, |caps: &Captures| {
                if caps.get(1).is_some() {
                    caps[0].to_string()
                } else {
                    format!("{}.first()", &caps[0])
                }
            })
            .into_owned()
    }

    fn details(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert("strategy".to_string(), Value::from("appendFirst"));
        extra.insert("selector".to_string(), Value::from(self.selector.as_str()));
        extra
    }
}

impl SectionStrategy for AppendFirst {
    fn matches(&self, section: &str) -> bool {
        mentions(section, &self.keyword)
    }
}

/// Label indirection: `label[for="<id>"]` becomes `#<id>`.
pub struct LabelForToId {
    input_id: String,
    pattern: Regex,
}

impl LabelForToId {
    pub fn new(input_id: &str) -> Result<Self> {
        let esc = regex::escape(input_id);
        let pattern = Regex::new(&format!(r#"label\[for=(?:"{esc}"|'{esc}')\]"#))?;
        Ok(Self {
            input_id: input_id.to_string(),
            pattern,
        })
    }

    pub fn hobbies() -> Result<Self> {
        Self::new("hobbies-checkbox-1")
    }
}

impl Strategy for LabelForToId {
    fn tag(&self) -> &'static str {
        "selector:hobbies"
    }

    fn rewrite(&self, content: &str) -> String {
        let replacement = format!("#{}", self.input_id);
        self.pattern
            .replace_all(content, regex::NoExpand(&replacement))
            .into_owned()
    }

    fn details(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert("inputId".to_string(), Value::from(self.input_id.as_str()));
        extra
    }
}

impl SectionStrategy for LabelForToId {
    fn matches(&self, section: &str) -> bool {
        mentions(section, &self.input_id)
    }
}

/// Intercepted click: `page.click('#<id>')` becomes a located, forced click.
pub struct ForceClick {
    element_id: String,
    pattern: Regex,
}

impl ForceClick {
    pub fn new(element_id: &str) -> Result<Self> {
        let esc = regex::escape(element_id);
        let pattern = Regex::new(&format!(r#"page\.click\((['"`])#{esc}(['"`])\)"#))?;
        Ok(Self {
            element_id: element_id.to_string(),
            pattern,
        })
    }

    pub fn close_large_modal() -> Result<Self> {
        Self::new("closeLargeModal")
    }
}

impl Strategy for ForceClick {
    fn tag(&self) -> &'static str {
        "action:forceCloseModal"
    }

    fn rewrite(&self, content: &str) -> String {
        self.pattern
            .replace_all(content, |caps: &Captures| {
                let quote = &caps[1];
                if quote != &caps[2] {
                    return caps[0].to_string();
                }
                format!(
                    "page.locator({q}#{id}{q}).click({{ force: true }})",
                    q = quote,
                    id = self.element_id
                )
            })
            .into_owned()
    }
}

impl SectionStrategy for ForceClick {
    fn matches(&self, section: &str) -> bool {
        mentions(section, &self.element_id)
    }
}

/// The built-in section strategies, in application order
pub fn default_section_strategies() -> Result<Vec<Box<dyn SectionStrategy>>> {
    Ok(vec![
        Box::new(AppendFirst::droppable()?),
        Box::new(LabelForToId::hobbies()?),
        Box::new(ForceClick::close_large_modal()?),
    ])
}

/// First `timeout: <n>` in the runner configuration is set to `value`.
pub struct RunnerTimeout {
    value: u64,
    pattern: Regex,
}

impl RunnerTimeout {
    pub fn new(value: u64) -> Result<Self> {
        Ok(Self {
            value,
            pattern: Regex::new(r"(timeout\s*:\s*)(\d+)")?,
        })
    }
}

impl Strategy for RunnerTimeout {
    fn tag(&self) -> &'static str {
        "timeout"
    }

    fn rewrite(&self, content: &str) -> String {
        self.pattern
            .replacen(content, 1, |caps: &Captures| {
                format!("{}{}", &caps[1], self.value)
            })
            .into_owned()
    }

    fn details(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert("value".to_string(), Value::from(self.value));
        extra
    }
}

/// Every `toBeVisible({ timeout: N })` wait is normalized to `value`.
pub struct VisibilityTimeout {
    value: u64,
    pattern: Regex,
}

impl VisibilityTimeout {
    pub fn new(value: u64) -> Result<Self> {
        Ok(Self {
            value,
            pattern: Regex::new(r"toBeVisible\(\{\s*timeout\s*:\s*\d+\s*\}\)")?,
        })
    }
}

impl Strategy for VisibilityTimeout {
    fn tag(&self) -> &'static str {
        "spec:modal-timeout"
    }

    fn rewrite(&self, content: &str) -> String {
        let replacement = format!("toBeVisible({{ timeout: {} }})", self.value);
        self.pattern
            .replace_all(content, regex::NoExpand(&replacement))
            .into_owned()
    }

    fn details(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert("value".to_string(), Value::from(self.value));
        extra
    }
}
