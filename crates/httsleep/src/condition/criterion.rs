//! A single AND-combined set of response constraints.

use std::fmt;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Map, Value};

use super::jsonpath::JsonPathCheck;
use crate::error::ConditionError;
use crate::response::Response;

/// Custom predicate run against a response. Only `true` counts as a match.
pub type Callback = Arc<dyn Fn(&Response) -> bool + Send + Sync>;

/// The closed set of keys a criterion may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    StatusCode,
    Json,
    Jsonpath,
    Text,
    Callback,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::StatusCode,
        Field::Json,
        Field::Jsonpath,
        Field::Text,
        Field::Callback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::StatusCode => "status_code",
            Field::Json => "json",
            Field::Jsonpath => "jsonpath",
            Field::Text => "text",
            Field::Callback => "callback",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Self::ALL.into_iter().find(|field| field.as_str() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One success or alarm condition.
///
/// Every field that is set must hold for the criterion to match; a criterion
/// with no fields set matches any response, which is why normalization drops
/// empty criteria instead of keeping them.
#[derive(Clone, Default)]
pub struct Criterion {
    pub(crate) status_code: Option<u16>,
    pub(crate) json: Option<Value>,
    pub(crate) text: Option<String>,
    pub(crate) jsonpath: Vec<JsonPathCheck>,
    pub(crate) callback: Option<Callback>,
}

impl Criterion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a criterion that only checks the status code.
    pub fn status(code: u16) -> Self {
        Self::new().with_status_code(code)
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_json(mut self, json: impl Into<Value>) -> Self {
        self.json = Some(json.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a JSONPath check. All checks of a criterion must hold.
    pub fn with_jsonpath(mut self, check: JsonPathCheck) -> Self {
        self.jsonpath.push(check);
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn jsonpath(&self) -> &[JsonPathCheck] {
        &self.jsonpath
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Fields set on this criterion, in evaluation order.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        if self.status_code.is_some() {
            fields.push(Field::StatusCode);
        }
        if self.json.is_some() {
            fields.push(Field::Json);
        }
        if self.text.is_some() {
            fields.push(Field::Text);
        }
        if !self.jsonpath.is_empty() {
            fields.push(Field::Jsonpath);
        }
        if self.callback.is_some() {
            fields.push(Field::Callback);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Build a criterion from a raw JSON object such as one read from a config file.
    ///
    /// Keys outside [`Field::ALL`] are rejected. `status_code` accepts integers
    /// and numeric strings; `null` for any field means "not set". Callbacks
    /// cannot be expressed as data and must be attached with [`Criterion::with_callback`].
    pub fn from_value(raw: &Value) -> Result<Self, ConditionError> {
        let object = raw
            .as_object()
            .ok_or_else(|| ConditionError::InvalidShape(raw.to_string()))?;

        let mut criterion = Criterion::new();
        for (key, value) in object {
            let field = Field::from_key(key).ok_or_else(|| ConditionError::InvalidKey {
                key: key.clone(),
                condition: raw.to_string(),
            })?;
            if value.is_null() {
                continue;
            }
            match field {
                Field::StatusCode => criterion.status_code = coerce_status_code(value, raw)?,
                Field::Json => criterion.json = Some(value.clone()),
                Field::Text => {
                    let text = value.as_str().ok_or_else(|| ConditionError::InvalidValue {
                        field,
                        reason: format!("expected a string, got {value}"),
                    })?;
                    criterion.text = Some(text.to_string());
                }
                Field::Jsonpath => criterion.jsonpath = parse_jsonpath_checks(value)?,
                Field::Callback => {
                    return Err(ConditionError::InvalidValue {
                        field,
                        reason: "callbacks can only be attached programmatically".to_string(),
                    })
                }
            }
        }
        Ok(criterion)
    }

    /// Render the criterion as JSON for messages; callbacks show as a marker string.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(code) = self.status_code {
            map.insert(Field::StatusCode.to_string(), Value::from(code));
        }
        if let Some(json) = &self.json {
            map.insert(Field::Json.to_string(), json.clone());
        }
        if let Some(text) = &self.text {
            map.insert(Field::Text.to_string(), Value::from(text.as_str()));
        }
        if !self.jsonpath.is_empty() {
            let checks = self
                .jsonpath
                .iter()
                .map(|check| {
                    serde_json::json!({
                        "expression": check.expression(),
                        "value": check.value(),
                    })
                })
                .collect();
            map.insert(Field::Jsonpath.to_string(), Value::Array(checks));
        }
        if self.callback.is_some() {
            map.insert(Field::Callback.to_string(), Value::from("<callback>"));
        }
        Value::Object(map)
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Criterion")
            .field("status_code", &self.status_code)
            .field("json", &self.json)
            .field("text", &self.text)
            .field("jsonpath", &self.jsonpath)
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

fn coerce_status_code(value: &Value, condition: &Value) -> Result<Option<u16>, ConditionError> {
    let invalid = || ConditionError::InvalidStatusCode {
        value: value.to_string(),
        condition: condition.to_string(),
    };

    let code = match value {
        Value::Number(n) => {
            if let Some(code) = n.as_u64() {
                code
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f >= 0.0 => f as u64,
                    _ => return Err(invalid()),
                }
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<u64>().map_err(|_| invalid())?
        }
        _ => return Err(invalid()),
    };

    // 0 is "unset", the same as an empty string
    if code == 0 {
        return Ok(None);
    }
    let code = u16::try_from(code).map_err(|_| invalid())?;
    StatusCode::from_u16(code).map_err(|_| invalid())?;
    Ok(Some(code))
}

fn parse_jsonpath_checks(value: &Value) -> Result<Vec<JsonPathCheck>, ConditionError> {
    let entries = value.as_array().ok_or_else(|| ConditionError::InvalidValue {
        field: Field::Jsonpath,
        reason: format!("expected a list of {{expression, value}} objects, got {value}"),
    })?;

    entries
        .iter()
        .map(|entry| {
            let invalid = |reason: String| ConditionError::InvalidValue {
                field: Field::Jsonpath,
                reason,
            };
            let object = entry
                .as_object()
                .ok_or_else(|| invalid(format!("expected an object, got {entry}")))?;
            if let Some(key) = object
                .keys()
                .find(|key| key.as_str() != "expression" && key.as_str() != "value")
            {
                return Err(invalid(format!("unexpected key \"{key}\" in {entry}")));
            }
            let expression = object
                .get("expression")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!("missing string \"expression\" in {entry}")))?;
            let expected = object
                .get("value")
                .ok_or_else(|| invalid(format!("missing \"value\" in {entry}")))?;
            JsonPathCheck::new(expression, expected.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_all_fields() {
        let criterion = Criterion::from_value(&json!({
            "status_code": 200,
            "text": "done",
            "json": {"state": "ready"},
            "jsonpath": [{"expression": "state", "value": "ready"}],
        }))
        .unwrap();

        assert_eq!(criterion.status_code(), Some(200));
        assert_eq!(criterion.text(), Some("done"));
        assert_eq!(criterion.json(), Some(&json!({"state": "ready"})));
        assert_eq!(criterion.jsonpath().len(), 1);
        assert_eq!(criterion.jsonpath()[0].expression(), "state");
        assert!(!criterion.has_callback());
    }

    #[test]
    fn test_invalid_key_names_key() {
        let err = Criterion::from_value(&json!({"status_code": 200, "lol": "invalid"})).unwrap_err();
        match &err {
            ConditionError::InvalidKey { key, .. } => assert_eq!(key, "lol"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("\"lol\""));
    }

    #[test]
    fn test_status_code_coercion() {
        let criterion = Criterion::from_value(&json!({"status_code": "200"})).unwrap();
        assert_eq!(criterion.status_code(), Some(200));

        let criterion = Criterion::from_value(&json!({"status_code": 404.0})).unwrap();
        assert_eq!(criterion.status_code(), Some(404));

        let criterion = Criterion::from_value(&json!({"status_code": " 503 "})).unwrap();
        assert_eq!(criterion.status_code(), Some(503));
    }

    #[test]
    fn test_status_code_not_coercible() {
        for raw in [
            json!({"status_code": "five"}),
            json!({"status_code": true}),
            json!({"status_code": 20.5}),
            json!({"status_code": -1}),
            json!({"status_code": 70000}),
            json!({"status_code": 42}),
        ] {
            let err = Criterion::from_value(&raw).unwrap_err();
            assert!(
                matches!(err, ConditionError::InvalidStatusCode { .. }),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_falsy_status_code_is_unset() {
        let criterion = Criterion::from_value(&json!({"status_code": 0})).unwrap();
        assert!(criterion.is_empty());
        let criterion = Criterion::from_value(&json!({"status_code": ""})).unwrap();
        assert!(criterion.is_empty());
    }

    #[test]
    fn test_null_fields_are_unset() {
        let criterion = Criterion::from_value(&json!({"json": null, "text": null})).unwrap();
        assert!(criterion.is_empty());
    }

    #[test]
    fn test_callback_rejected_in_data() {
        let err = Criterion::from_value(&json!({"callback": "is_ready"})).unwrap_err();
        assert!(matches!(
            err,
            ConditionError::InvalidValue {
                field: Field::Callback,
                ..
            }
        ));
    }

    #[test]
    fn test_text_must_be_string() {
        let err = Criterion::from_value(&json!({"text": 12})).unwrap_err();
        assert!(matches!(err, ConditionError::InvalidValue { field: Field::Text, .. }));
    }

    #[test]
    fn test_jsonpath_entry_validation() {
        assert!(Criterion::from_value(&json!({"jsonpath": {"expression": "a", "value": 1}})).is_err());
        assert!(Criterion::from_value(&json!({"jsonpath": [{"expression": "a"}]})).is_err());
        assert!(Criterion::from_value(&json!({"jsonpath": [{"value": 1}]})).is_err());
        assert!(
            Criterion::from_value(&json!({"jsonpath": [{"expression": "a", "value": 1, "x": 2}]}))
                .is_err()
        );
        let err =
            Criterion::from_value(&json!({"jsonpath": [{"expression": "$[", "value": 1}]})).unwrap_err();
        assert!(matches!(err, ConditionError::InvalidJsonPath { .. }));
    }

    #[test]
    fn test_not_an_object() {
        let err = Criterion::from_value(&json!("status_code")).unwrap_err();
        assert!(matches!(err, ConditionError::InvalidShape(_)));
    }

    #[test]
    fn test_fields_in_evaluation_order() {
        let criterion = Criterion::new()
            .with_callback(|_| true)
            .with_text("x")
            .with_status_code(200);
        assert_eq!(
            criterion.fields(),
            vec![Field::StatusCode, Field::Text, Field::Callback]
        );
    }

    #[test]
    fn test_display_marks_callback() {
        let criterion = Criterion::status(500).with_callback(|_| false);
        let rendered = criterion.to_string();
        assert!(rendered.contains("\"status_code\":500"));
        assert!(rendered.contains("<callback>"));
    }

    #[test]
    fn test_field_from_key() {
        assert_eq!(Field::from_key("jsonpath"), Some(Field::Jsonpath));
        assert_eq!(Field::from_key("headers"), None);
    }
}
