//! Core domain types: what gets sent to a classification agent.
//!
//! Every constructor validates eagerly, so a value of these types is
//! always something a pipeline may forward to a backend.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PromptSieveError, Result};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Instruction
// ---------------------------------------------------------------------------

/// The task directive given to the backend. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Instruction(String);

impl Instruction {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PromptSieveError::validation("task", "Task cannot be empty."));
        }
        Ok(Self(text))
    }

    /// Append extra directions on a new line. Blank text is ignored.
    pub fn append(&mut self, extra: &str) {
        if !extra.trim().is_empty() {
            self.0.push('\n');
            self.0.push_str(extra);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// The material being classified: free text or an ordered list of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Subject {
    Text(String),
    List(Vec<String>),
}

impl Subject {
    /// Free-text subject; rejects blank content.
    pub fn text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PromptSieveError::validation(
                "content",
                "Content cannot be empty.",
            ));
        }
        Ok(Self::Text(text))
    }

    /// List subject; rejects an empty list or any blank element.
    ///
    /// `field` names the list in error messages (e.g. `url_list`).
    pub fn list(field: &'static str, items: Vec<String>) -> Result<Self> {
        validate_items(field, &items)?;
        Ok(Self::List(items))
    }

    /// Build a subject from untyped JSON input.
    ///
    /// A string becomes [`Subject::Text`]; an array becomes [`Subject::List`]
    /// only when every element is a string.
    pub fn from_json(field: &'static str, value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => Self::text(s.clone()),
            serde_json::Value::Array(_) => Self::list(field, strings_from_json(field, value)?),
            _ => Err(PromptSieveError::validation(
                field,
                "Content must be a string or a list of strings.",
            )),
        }
    }

    /// Append more material. Text gains a new line; a list gains an element.
    pub fn append(&mut self, extra: &str) {
        if extra.trim().is_empty() {
            return;
        }
        match self {
            Self::Text(text) => {
                text.push('\n');
                text.push_str(extra);
            }
            Self::List(items) => items.push(extra.to_string()),
        }
    }

    /// The form that goes into a prompt.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => items.join(", "),
        }
    }
}

// ---------------------------------------------------------------------------
// ReferenceList
// ---------------------------------------------------------------------------

/// A fixed list the backend compares the subject against (e.g. career titles).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReferenceList {
    items: Vec<String>,
}

impl ReferenceList {
    /// `field` names the list in error messages (e.g. `career_list`).
    pub fn new(field: &'static str, items: Vec<String>) -> Result<Self> {
        validate_items(field, &items)?;
        Ok(Self { items })
    }

    /// Build from untyped JSON; every element must be a string.
    pub fn from_json(field: &'static str, value: &serde_json::Value) -> Result<Self> {
        Self::new(field, strings_from_json(field, value)?)
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn render(&self) -> String {
        self.items.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn list_error(field: &'static str) -> PromptSieveError {
    let message = match field {
        "url_list" => "URL list must contain valid URL strings.".to_string(),
        "career_list" => "Career list must contain valid career titles.".to_string(),
        other => format!("{other} must be a non-empty list of strings."),
    };
    PromptSieveError::validation(field, message)
}

fn validate_items(field: &'static str, items: &[String]) -> Result<()> {
    if items.is_empty() || items.iter().any(|item| item.trim().is_empty()) {
        return Err(list_error(field));
    }
    Ok(())
}

fn strings_from_json(field: &'static str, value: &serde_json::Value) -> Result<Vec<String>> {
    let array = value.as_array().ok_or_else(|| list_error(field))?;
    array
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(|| list_error(field)))
        .collect()
}
