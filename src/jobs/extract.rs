//! jq selectors over webhook responses.
//!
//! Each selector is compiled and evaluated independently; one broken
//! selector never prevents the others from producing variables.

use std::collections::BTreeMap;

use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value as JsonValue;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::types::{VarValue, Variables};

/// Run every `name -> expression` selector against `json_text`.
///
/// An empty selector set returns an empty mapping without looking at the
/// input. Otherwise the input must be valid JSON. Only the first result of a
/// selector is kept; a selector yielding nothing leaves its name unbound.
pub fn extract(json_text: &str, selectors: &BTreeMap<String, String>) -> JobResult<Variables> {
    let mut variables = Variables::new();
    if selectors.is_empty() {
        return Ok(variables);
    }

    let document: JsonValue = serde_json::from_str(json_text)?;

    for (name, selector) in selectors {
        match first_result(selector, &document) {
            Ok(Some(value)) => {
                tracing::debug!(variable = %name, selector = %selector, value = %value, "Extracted variable");
                variables.insert(name.clone(), value);
            }
            Ok(None) => {
                tracing::debug!(variable = %name, selector = %selector, "Selector produced no result");
            }
            Err(e) => {
                tracing::warn!(variable = %name, error = %e, "Skipping selector");
            }
        }
    }

    Ok(variables)
}

/// Compile `selector` and return its first output for `document`.
///
/// Evaluation errors preceding the first value are skipped.
fn first_result(selector: &str, document: &JsonValue) -> JobResult<Option<VarValue>> {
    let program = File {
        code: selector,
        path: (),
    };

    let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = Arena::default();
    let modules = loader
        .load(&arena, program)
        .map_err(|errors| JobError::JqParse {
            selector: selector.to_string(),
            reason: format!("{} syntax error(s)", errors.len()),
        })?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errors| JobError::JqParse {
            selector: selector.to_string(),
            reason: format!("{} compile error(s)", errors.len()),
        })?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(document.clone())));

    let mut last_error = None;
    for output in outputs {
        match output {
            Ok(value) => return Ok(Some(VarValue::from(JsonValue::from(value)))),
            Err(e) => {
                let error = JobError::JqEval {
                    selector: selector.to_string(),
                    reason: e.to_string(),
                };
                tracing::debug!(error = %error, "Selector output error");
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(error) => Err(error),
        None => Ok(None),
    }
}
