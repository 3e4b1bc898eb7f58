//! Success and alarm conditions.
//!
//! - `criterion` - the [`Criterion`] record and its construction from raw JSON
//! - `jsonpath` - JSONPath checks and the [`PathQuery`] seam
//! - `equality` - structural JSON equality used by `json` and `jsonpath`
//! - `evaluator` - [`matches`], one response against one criterion

mod criterion;
mod equality;
mod evaluator;
mod jsonpath;

use std::fmt;

use serde_json::Value;

pub use criterion::{Callback, Criterion, Field};
pub use equality::json_equals;
pub use evaluator::matches;
pub use jsonpath::{compile_path, CompiledPath, JsonPathCheck, PathQuery};

use crate::error::{ConditionError, EvaluationError};
use crate::response::Response;

/// Which list a set of criteria belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Success conditions; at least one usable criterion is required.
    Until,
    /// Failure conditions; may be empty.
    Alarms,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Until => f.write_str("success"),
            Role::Alarms => f.write_str("alarm"),
        }
    }
}

/// Anything that can be turned into a list of criteria: a single criterion,
/// a list of them, or raw JSON (an object or an array of objects).
pub trait IntoCriteria {
    fn into_criteria(self) -> Result<Vec<Criterion>, ConditionError>;
}

impl IntoCriteria for Criterion {
    fn into_criteria(self) -> Result<Vec<Criterion>, ConditionError> {
        Ok(vec![self])
    }
}

impl IntoCriteria for Vec<Criterion> {
    fn into_criteria(self) -> Result<Vec<Criterion>, ConditionError> {
        Ok(self)
    }
}

impl<const N: usize> IntoCriteria for [Criterion; N] {
    fn into_criteria(self) -> Result<Vec<Criterion>, ConditionError> {
        Ok(self.into())
    }
}

impl IntoCriteria for &Value {
    fn into_criteria(self) -> Result<Vec<Criterion>, ConditionError> {
        match self {
            Value::Null => Ok(Vec::new()),
            Value::Object(_) => Ok(vec![Criterion::from_value(self)?]),
            Value::Array(items) => items.iter().map(Criterion::from_value).collect(),
            other => Err(ConditionError::InvalidShape(other.to_string())),
        }
    }
}

impl IntoCriteria for Value {
    fn into_criteria(self) -> Result<Vec<Criterion>, ConditionError> {
        (&self).into_criteria()
    }
}

/// Normalize raw criteria for `role`.
///
/// Empty criteria are dropped. If nothing usable remains, that is an error
/// for [`Role::Until`] and an empty list for [`Role::Alarms`]. The order of
/// the remaining criteria is preserved.
pub fn normalize(raw: impl IntoCriteria, role: Role) -> Result<Vec<Criterion>, ConditionError> {
    let criteria: Vec<Criterion> = raw
        .into_criteria()?
        .into_iter()
        .filter(|criterion| !criterion.is_empty())
        .collect();

    if criteria.is_empty() && role == Role::Until {
        return Err(ConditionError::Empty { role });
    }
    Ok(criteria)
}

/// The success and alarm lists of one poll session.
#[derive(Debug, Clone)]
pub struct Conditions {
    until: Vec<Criterion>,
    alarms: Vec<Criterion>,
}

impl Conditions {
    pub fn new(until: impl IntoCriteria, alarms: impl IntoCriteria) -> Result<Self, ConditionError> {
        Ok(Self {
            until: normalize(until, Role::Until)?,
            alarms: normalize(alarms, Role::Alarms)?,
        })
    }

    pub fn until(&self) -> &[Criterion] {
        &self.until
    }

    pub fn alarms(&self) -> &[Criterion] {
        &self.alarms
    }

    /// The first alarm, in declaration order, that `response` matches.
    pub fn triggered_alarm(&self, response: &Response) -> Result<Option<&Criterion>, EvaluationError> {
        for alarm in &self.alarms {
            if matches(response, alarm)? {
                return Ok(Some(alarm));
            }
        }
        Ok(None)
    }

    /// Whether any success criterion matches `response`.
    pub fn is_satisfied(&self, response: &Response) -> Result<bool, EvaluationError> {
        for criterion in &self.until {
            if matches(response, criterion)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
