//! JSONPath checks against a parsed response body.
//!
//! Query evaluation itself is delegated to a [`PathQuery`]; the default
//! implementation is backed by `serde_json_path` (RFC 9535).

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use serde_json_path::JsonPath;

use super::equality::{json_equals, json_sequence_equals};
use crate::error::ConditionError;

/// A compiled structured-path query.
///
/// Implementations must return matches in document order.
pub trait PathQuery: Send + Sync + fmt::Debug {
    /// All values selected by the query.
    fn find<'a>(&self, document: &'a Value) -> Vec<&'a Value>;

    /// Source text of the query, used in messages.
    fn expression(&self) -> Cow<'_, str>;
}

/// A query compiled by [`compile_path`].
#[derive(Debug, Clone)]
pub struct CompiledPath {
    source: String,
    path: JsonPath,
}

impl PathQuery for CompiledPath {
    fn find<'a>(&self, document: &'a Value) -> Vec<&'a Value> {
        self.path.query(document).all()
    }

    fn expression(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.source)
    }
}

/// Compile a JSONPath expression.
///
/// Relative expressions such as `status` or `foo[*].bar` are rooted at `$`.
pub fn compile_path(expression: &str) -> Result<CompiledPath, ConditionError> {
    let rooted = rooted(expression);
    let path = JsonPath::parse(&rooted).map_err(|e| ConditionError::InvalidJsonPath {
        expression: expression.to_string(),
        reason: e.to_string(),
    })?;
    Ok(CompiledPath {
        source: expression.to_string(),
        path,
    })
}

fn rooted(expression: &str) -> Cow<'_, str> {
    let trimmed = expression.trim();
    if trimmed.starts_with('$') {
        Cow::Borrowed(trimmed)
    } else if trimmed.starts_with('[') {
        Cow::Owned(format!("${trimmed}"))
    } else {
        Cow::Owned(format!("$.{trimmed}"))
    }
}

/// One `{expression, value}` entry of a criterion's `jsonpath` list.
#[derive(Debug, Clone)]
pub struct JsonPathCheck {
    query: Arc<dyn PathQuery>,
    value: Value,
}

impl JsonPathCheck {
    /// Compile `expression` now so a bad expression fails at construction.
    pub fn new(expression: &str, value: impl Into<Value>) -> Result<Self, ConditionError> {
        Ok(Self::from_query(compile_path(expression)?, value))
    }

    /// Use an already compiled query.
    pub fn from_query(query: impl PathQuery + 'static, value: impl Into<Value>) -> Self {
        Self {
            query: Arc::new(query),
            value: value.into(),
        }
    }

    pub fn expression(&self) -> Cow<'_, str> {
        self.query.expression()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// A single match is compared to the expected value directly; several
    /// matches are compared, in order, to the expected value as a list.
    pub fn matches(&self, document: &Value) -> bool {
        let results = self.query.find(document);
        match results.as_slice() {
            [] => false,
            [single] => json_equals(single, &self.value),
            many => json_sequence_equals(many, &self.value),
        }
    }
}
