//! `{{name}}` placeholder rendering for request bodies.
//!
//! Templates are tokenized once into literal spans and placeholders, so a
//! substituted value is never scanned for further placeholders.

use crate::jobs::error::JobError;
use crate::jobs::types::{REMINDER_VAR, VarValue, Variables};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Literal(&'a str),
    /// `name` is the text between the braces, `raw` the full `{{name}}`
    Placeholder { name: &'a str, raw: &'a str },
}

pub(crate) fn tokenize(template: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(mut open) = rest.find(OPEN) {
        // "{{{x}}}" is a literal brace around "{{x}}"
        while rest[open + OPEN.len()..].starts_with('{') {
            open += 1;
        }
        let after_open = &rest[open + OPEN.len()..];
        let Some(close) = after_open.find(CLOSE) else {
            break;
        };

        // "{{a {{b}}" closes the innermost opening only
        let inner = &after_open[..close];
        let start = match inner.rfind(OPEN) {
            Some(nested) => open + OPEN.len() + nested,
            None => open,
        };
        let end = open + OPEN.len() + close + CLOSE.len();

        if start > 0 {
            tokens.push(Token::Literal(&rest[..start]));
        }
        tokens.push(Token::Placeholder {
            name: &rest[start + OPEN.len()..end - CLOSE.len()],
            raw: &rest[start..end],
        });
        rest = &rest[end..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Literal(rest));
    }
    tokens
}

/// Render `template`, substituting every placeholder whose name is bound.
///
/// String values are escaped for embedding inside a JSON string literal;
/// other values are inserted as JSON. An unbound `{{REMINDER}}` renders as
/// the empty string, any other unbound placeholder is left as-is.
pub fn render(template: &str, variables: &Variables) -> String {
    let mut output = String::with_capacity(template.len());

    for token in tokenize(template) {
        match token {
            Token::Literal(text) => output.push_str(text),
            Token::Placeholder { name, raw } => match variables.get(name) {
                Some(value) => output.push_str(&substitution(name, value)),
                None if name == REMINDER_VAR => {}
                None => output.push_str(raw),
            },
        }
    }

    output
}

fn substitution(name: &str, value: &VarValue) -> String {
    match value {
        VarValue::String(s) => escape_json_string(s),
        other => match serde_json::to_string(other) {
            Ok(json) => json,
            Err(e) => {
                let error = JobError::TemplateMarshal {
                    name: name.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!(error = %error, "Falling back to plain value formatting");
                other.to_string()
            }
        },
    }
}

fn escape_json_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '"' => escaped.push_str("\\\""),
            c => escaped.push(c),
        }
    }
    escaped
}
