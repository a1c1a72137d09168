use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Name of the variable carrying a reminder's text
pub const REMINDER_VAR: &str = "REMINDER";

/// Fallback variable holding the raw primary response on reminder firings
pub const MESSAGE_VAR: &str = "message";

/// Value bound to a template variable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VarValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<VarValue>),
    Object(BTreeMap<String, VarValue>),
}

impl VarValue {
    /// Null or the empty string
    pub fn is_blank(&self) -> bool {
        match self {
            VarValue::Null => true,
            VarValue::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<JsonValue> for VarValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => VarValue::Null,
            JsonValue::Bool(b) => VarValue::Bool(b),
            JsonValue::Number(n) => VarValue::Number(n),
            JsonValue::String(s) => VarValue::String(s),
            JsonValue::Array(items) => {
                VarValue::Array(items.into_iter().map(VarValue::from).collect())
            }
            JsonValue::Object(fields) => VarValue::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, VarValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        VarValue::String(value.to_string())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        VarValue::String(value)
    }
}

impl std::fmt::Display for VarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarValue::Null => f.write_str("null"),
            VarValue::Bool(b) => write!(f, "{b}"),
            VarValue::Number(n) => write!(f, "{n}"),
            VarValue::String(s) => f.write_str(s),
            VarValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            VarValue::Object(fields) => {
                f.write_str("map[")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{key}:{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Variable name -> value mapping used for template rendering
pub type Variables = BTreeMap<String, VarValue>;

/// What caused an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Cron,
    Manual,
    Reminder,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Cron => write!(f, "cron"),
            Trigger::Manual => write!(f, "manual"),
            Trigger::Reminder => write!(f, "reminder"),
        }
    }
}
