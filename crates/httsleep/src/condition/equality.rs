//! Structural equality for JSON values with numeric coercion.

use serde_json::{Number, Value};

/// Deep equality where numbers compare by value, so `1 == 1.0`.
///
/// Objects must have the same key set; arrays must match element-wise in order.
pub fn json_equals(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| json_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && b.iter().all(|(key, expected_val)| {
                    a.get(key)
                        .is_some_and(|actual_val| json_equals(actual_val, expected_val))
                })
        }
        _ => false,
    }
}

/// Compare several query results, in order, against an expected list.
pub fn json_sequence_equals(actual: &[&Value], expected: &Value) -> bool {
    match expected {
        Value::Array(items) => {
            actual.len() == items.len()
                && actual
                    .iter()
                    .zip(items.iter())
                    .all(|(x, y)| json_equals(x, y))
        }
        _ => false,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(json_equals(&json!(1), &json!(1.0)));
        assert!(json_equals(&json!(-3), &json!(-3.0)));
        assert!(!json_equals(&json!(1), &json!(1.5)));
        assert!(json_equals(&json!(u64::MAX), &json!(u64::MAX)));
    }

    #[test]
    fn test_no_cross_type_coercion() {
        assert!(!json_equals(&json!("1"), &json!(1)));
        assert!(!json_equals(&json!(true), &json!(1)));
        assert!(!json_equals(&json!(null), &json!(false)));
    }

    #[test]
    fn test_objects_require_same_keys() {
        assert!(json_equals(
            &json!({"a": 1, "b": [1, 2]}),
            &json!({"b": [1.0, 2], "a": 1})
        ));
        assert!(!json_equals(&json!({"a": 1, "b": 2}), &json!({"a": 1})));
        assert!(!json_equals(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_arrays_are_ordered() {
        assert!(!json_equals(&json!([1, 2]), &json!([2, 1])));
        assert!(!json_equals(&json!([1, 2]), &json!([1, 2, 3])));
    }

    #[test]
    fn test_sequence_equals() {
        let one = json!(1);
        let two = json!(2);
        assert!(json_sequence_equals(&[&one, &two], &json!([1, 2])));
        assert!(!json_sequence_equals(&[&one, &two], &json!([1])));
        assert!(!json_sequence_equals(&[&one, &two], &json!({"0": 1})));
    }
}
