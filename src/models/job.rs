//! Job, webhook and reminder records.
//!
//! These types are both the repository's serialized form and the management
//! API's request/response bodies, so field names must stay stable.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use validator::Validate;

// ============================================================================
// Enums
// ============================================================================

/// HTTP method used for a webhook call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HttpMethod {
    #[default]
    #[serde(rename = "GET", alias = "get")]
    Get,
    #[serde(rename = "POST", alias = "post")]
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Definition of a single webhook call
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate)]
pub struct WebhookConfig {
    #[validate(url(message = "Webhook URL must be a valid URL"))]
    pub url: String,

    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Literal request body
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,

    /// Variable name -> jq expression, evaluated against the primary response
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub jq_selectors: BTreeMap<String, String>,

    /// `{{name}}` template rendered with extracted variables
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body_template: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub only_if_vars_non_empty: bool,

    /// Seconds; 0 means the executor default
    #[serde(rename = "timeout", default, skip_serializing_if = "is_zero")]
    pub timeout_seconds: u64,

    /// Only consulted on the secondary webhook
    #[serde(default)]
    pub enabled: bool,
}

impl WebhookConfig {
    /// Header value lookup ignoring ASCII case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// One-shot notification tied to a job's primary webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Reminder {
    #[validate(length(min = 1, message = "Reminder id cannot be empty"))]
    pub id: String,

    pub text: String,

    pub datetime: DateTime<FixedOffset>,
}

/// A scheduled webhook job
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate)]
pub struct Job {
    #[validate(length(min = 1, max = 255, message = "Job id must be between 1 and 255 characters"))]
    pub id: String,

    #[validate(length(min = 1, max = 255, message = "Job name must be between 1 and 255 characters"))]
    pub name: String,

    #[validate(length(min = 1, message = "Schedule cannot be empty"))]
    pub schedule: String,

    #[serde(default)]
    pub enabled: bool,

    #[validate(nested)]
    pub primary: WebhookConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub secondary: Option<WebhookConfig>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub save_output: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub reminders: Vec<Reminder>,
}

impl Job {
    pub fn reminder_mut(&mut self, reminder_id: &str) -> Option<&mut Reminder> {
        self.reminders.iter_mut().find(|r| r.id == reminder_id)
    }
}
