//! Decide whether a response satisfies a criterion.

use serde_json::Value;

use super::criterion::Criterion;
use super::equality::json_equals;
use crate::error::EvaluationError;
use crate::response::Response;

/// Response body parsed on first use and shared by the `json` and `jsonpath` checks.
struct Document<'r> {
    response: &'r Response,
    parsed: Option<Value>,
}

impl<'r> Document<'r> {
    fn new(response: &'r Response) -> Self {
        Self {
            response,
            parsed: None,
        }
    }

    fn get(&mut self) -> Result<&Value, EvaluationError> {
        let parsed = match self.parsed.take() {
            Some(value) => value,
            None => self.response.json()?,
        };
        Ok(self.parsed.insert(parsed))
    }
}

/// Check every field set on `criterion` against `response`.
///
/// Fields are checked in a fixed order (status code, json, text, jsonpath,
/// callback) and the first failing field short-circuits. A body that is not
/// JSON while `json` or `jsonpath` is set is an error, not a non-match.
pub fn matches(response: &Response, criterion: &Criterion) -> Result<bool, EvaluationError> {
    if let Some(expected) = criterion.status_code {
        if response.status_code() != expected {
            return Ok(false);
        }
    }

    let mut document = Document::new(response);

    if let Some(expected) = &criterion.json {
        if !json_equals(document.get()?, expected) {
            return Ok(false);
        }
    }

    if let Some(expected) = &criterion.text {
        if response.bytes().as_ref() != expected.as_bytes() {
            return Ok(false);
        }
    }

    for check in &criterion.jsonpath {
        if !check.matches(document.get()?) {
            return Ok(false);
        }
    }

    if let Some(callback) = &criterion.callback {
        if !callback(response) {
            return Ok(false);
        }
    }

    Ok(true)
}
