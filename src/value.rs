//! Dynamic value helpers.
//!
//! Option values are plain JSON data (`serde_json::Value`). Numbers compare by
//! magnitude so `5` and `5.0` are the same value, and class instances are JSON
//! objects carrying a `"$class"` member with the class name.

pub use serde_json::Value;

/// Ordered JSON object (insertion order is preserved).
pub type Object = serde_json::Map<String, Value>;

/// Member that identifies the class of a class-kind value.
pub const CLASS_TAG: &str = "$class";

/// Deep equality where numbers are compared as `f64`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

/// Merge `over` onto `base`. Objects merge key by key, anything else is replaced.
pub fn merge_deep(base: &Value, over: &Value) -> Value {
    match (base, over) {
        (Value::Object(b), Value::Object(o)) => {
            let mut merged = b.clone();
            for (key, value) in o {
                let next = match merged.get(key) {
                    Some(existing) => merge_deep(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => over.clone(),
    }
}

/// Build a JSON number, keeping integral values as integers.
pub fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Single-key object `{key: value}`, the payload shape used when bubbling.
pub fn keyed(key: &str, value: Value) -> Value {
    let mut obj = Object::new();
    obj.insert(key.to_string(), value);
    Value::Object(obj)
}

/// Build a class instance: `fields` plus the `"$class"` tag.
pub fn class_instance(class: &str, fields: Object) -> Value {
    let mut obj = Object::new();
    obj.insert(CLASS_TAG.to_string(), Value::String(class.to_string()));
    obj.extend(fields);
    Value::Object(obj)
}

/// Class name carried by a value, if it is a class instance.
pub fn class_of(value: &Value) -> Option<&str> {
    value.get(CLASS_TAG).and_then(Value::as_str)
}

/// Short name of the JSON type of a value, for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// True when `partial` matches `value`: every member of a partial object must
/// match the same member of `value`; anything else compares deeply.
pub fn matches_partial(value: &Value, partial: &Value) -> bool {
    match (value, partial) {
        (Value::Object(v), Value::Object(p)) => p
            .iter()
            .all(|(k, pv)| v.get(k).is_some_and(|vv| values_equal(vv, pv))),
        _ => values_equal(value, partial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_compare_by_magnitude() {
        assert!(values_equal(&json!(5), &json!(5.0)));
        assert!(!values_equal(&json!(5), &json!(5.5)));
        assert!(values_equal(&json!({"a": [1, 2.0]}), &json!({"a": [1.0, 2]})));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn merge_deep_overrides_leaves_and_keeps_siblings() {
        let base = json!({"type": "number", "nested": {"a": 1, "b": 2}});
        let over = json!({"nested": {"b": 3}, "value": 4});
        assert_eq!(
            merge_deep(&base, &over),
            json!({"type": "number", "nested": {"a": 1, "b": 3}, "value": 4})
        );
        assert_eq!(merge_deep(&json!([1]), &json!([2, 3])), json!([2, 3]));
    }

    #[test]
    fn number_value_keeps_integers() {
        assert_eq!(number_value(3.0), json!(3));
        assert_eq!(number_value(2.5), json!(2.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }

    #[test]
    fn class_instances_carry_their_tag() {
        let mut fields = Object::new();
        fields.insert("host".to_string(), json!("localhost"));
        let value = class_instance("Endpoint", fields);
        assert_eq!(class_of(&value), Some("Endpoint"));
        assert_eq!(class_of(&json!({"host": "x"})), None);
    }

    #[test]
    fn partial_match_checks_only_given_members() {
        let item = json!({"name": "a", "port": 80});
        assert!(matches_partial(&item, &json!({"port": 80.0})));
        assert!(!matches_partial(&item, &json!({"port": 81})));
        assert!(matches_partial(&json!(3), &json!(3)));
    }
}
