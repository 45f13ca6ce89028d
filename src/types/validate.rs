//! Value validation and generation per kind.

use super::kind::Kind;
use super::model::{KindSpec, OptionType};
use crate::error::{OptreeError, Result};
use crate::link;
use crate::value::{class_of, number_value, type_name, values_equal, Object, Value};

impl OptionType {
    fn invalid(&self, msg: String) -> OptreeError {
        OptreeError::ValueValidationError(format!("option {}: {}", self, msg))
    }

    /// Check that `value` belongs to this type's domain.
    ///
    /// Map values may hold link strings for their children. An unknown map
    /// key is an access error listing the declared keys.
    pub fn validate_value(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            return if self.nullable {
                Ok(())
            } else {
                Err(self.invalid("value cannot be null".to_string()))
            };
        }

        match (&self.spec, value) {
            (_, _) if self.kind == Kind::Untyped => Ok(()),
            (_, Value::Bool(_)) if self.kind == Kind::Boolean => Ok(()),
            (_, Value::Object(_)) if self.kind == Kind::Object => Ok(()),
            (_, Value::Array(_)) if self.kind == Kind::Array => Ok(()),
            (KindSpec::Number { min, max }, Value::Number(n)) => {
                let n = n.as_f64().unwrap_or(f64::NAN);
                if let Some(min) = min {
                    if n < *min {
                        return Err(self.invalid(format!("{} is less than minimum {}", n, min)));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        return Err(self.invalid(format!("{} is greater than maximum {}", n, max)));
                    }
                }
                Ok(())
            }
            (
                KindSpec::String {
                    pattern,
                    min_len,
                    max_len,
                },
                Value::String(s),
            ) => {
                if let Some(pattern) = pattern {
                    if !pattern.is_match(s) {
                        return Err(self.invalid(format!(
                            "\"{}\" does not match pattern \"{}\"",
                            s,
                            pattern.as_str()
                        )));
                    }
                }
                let len = s.chars().count();
                if let Some(min) = min_len {
                    if len < *min {
                        return Err(self.invalid(format!(
                            "\"{}\" is shorter than {} characters",
                            s, min
                        )));
                    }
                }
                if let Some(max) = max_len {
                    if len > *max {
                        return Err(self.invalid(format!(
                            "\"{}\" is longer than {} characters",
                            s, max
                        )));
                    }
                }
                Ok(())
            }
            (KindSpec::Enum { allows }, v) => {
                if allows.iter().any(|a| values_equal(a, v)) {
                    Ok(())
                } else {
                    Err(self.invalid(format!(
                        "{} is not one of {}",
                        v,
                        Value::Array(allows.clone())
                    )))
                }
            }
            (KindSpec::Mixed { alternatives }, v) => {
                if alternatives.iter().any(|a| a.validate_value(v).is_ok()) {
                    Ok(())
                } else {
                    let kinds: Vec<&str> = alternatives.iter().map(|a| a.kind.as_str()).collect();
                    Err(self.invalid(format!(
                        "{} matches none of the allowed types [{}]",
                        v,
                        kinds.join(", ")
                    )))
                }
            }
            (KindSpec::Class { class }, v) => {
                if class_of(v) == Some(class.as_str()) {
                    Ok(())
                } else {
                    Err(self.invalid(format!("expected an instance of {}, got {}", class, v)))
                }
            }
            (KindSpec::Map { children }, Value::Object(obj)) => {
                for (key, member) in obj {
                    let Some((_, child)) = children.iter().find(|(n, _)| n == key) else {
                        return Err(self.unknown_key(key));
                    };
                    if member.as_str().is_some_and(link::is_link) {
                        continue;
                    }
                    child.validate_value(member)?;
                }
                Ok(())
            }
            (KindSpec::ArrayCollection { proto }, Value::Array(items)) => {
                items.iter().try_for_each(|item| proto.validate_value(item))
            }
            (KindSpec::ObjectCollection { proto, options }, Value::Object(obj)) => {
                for (key, member) in obj {
                    if key == "options" {
                        options.validate_value(member)?;
                    } else {
                        proto.validate_value(member)?;
                    }
                }
                Ok(())
            }
            (_, v) => Err(self.invalid(format!(
                "expected a value of type '{}', got {} {}",
                self.kind,
                type_name(v),
                v
            ))),
        }
    }

    /// Access error for a key that is not declared by this map type.
    pub(crate) fn unknown_key(&self, key: &str) -> OptreeError {
        let allowed: Vec<&str> = self.children().iter().map(|(n, _)| n.as_str()).collect();
        OptreeError::AccessError(format!(
            "option {} has no member '{}'; allowed members: {}",
            self,
            key,
            allowed.join(", ")
        ))
    }

    /// The kind's empty value.
    pub fn empty_value(&self) -> Value {
        match &self.spec {
            KindSpec::Enum { allows } => allows.first().cloned().unwrap_or(Value::Null),
            KindSpec::Mixed { alternatives } => alternatives
                .first()
                .map(|a| a.empty_value())
                .unwrap_or(Value::Null),
            _ => match self.kind {
                Kind::Boolean => Value::Bool(false),
                Kind::Number => Value::from(0),
                Kind::String => Value::String(String::new()),
                Kind::Object | Kind::Map | Kind::ObjectCollection => Value::Object(Object::new()),
                Kind::Array | Kind::ArrayCollection => Value::Array(Vec::new()),
                _ => Value::Null,
            },
        }
    }

    /// Produce a value this type accepts, as close to `value` as possible.
    ///
    /// Numbers are clamped to their range, strings are padded or truncated to
    /// their length bounds, anything else falls back to the empty value.
    pub fn generate_value(&self, value: &Value) -> Value {
        if value.is_null() && self.nullable {
            return Value::Null;
        }
        if self.validate_value(value).is_ok() && !self.kind.is_composite() {
            return value.clone();
        }

        match &self.spec {
            KindSpec::Number { min, max } => {
                let mut n = value.as_f64().unwrap_or(0.0);
                if let Some(min) = min {
                    n = n.max(*min);
                }
                if let Some(max) = max {
                    n = n.min(*max);
                }
                number_value(n)
            }
            KindSpec::String {
                min_len, max_len, ..
            } => {
                let mut s = value.as_str().unwrap_or("").to_string();
                let len = s.chars().count();
                if let Some(min) = min_len {
                    if len < *min {
                        s.push_str(&" ".repeat(min - len));
                    }
                }
                if let Some(max) = max_len {
                    if s.chars().count() > *max {
                        s = s.chars().take(*max).collect();
                    }
                }
                Value::String(s)
            }
            KindSpec::Mixed { alternatives } => match alternatives.first() {
                Some(first) if value.is_null() => first.generate_value(&first.empty_value()),
                Some(first) => first.generate_value(value),
                None => Value::Null,
            },
            KindSpec::Map { children } => {
                let mut obj = Object::new();
                for (name, child) in children {
                    let member = value.get(name).cloned().unwrap_or(Value::Null);
                    obj.insert(name.clone(), child.generate_value(&member));
                }
                Value::Object(obj)
            }
            KindSpec::ArrayCollection { proto } => match value {
                Value::Array(items) => {
                    Value::Array(items.iter().map(|v| proto.generate_value(v)).collect())
                }
                _ => Value::Array(Vec::new()),
            },
            KindSpec::ObjectCollection { proto, options } => match value {
                Value::Object(obj) => Value::Object(
                    obj.iter()
                        .map(|(k, v)| {
                            let ty = if k == "options" { options } else { proto };
                            (k.clone(), ty.generate_value(v))
                        })
                        .collect(),
                ),
                _ => Value::Object(Object::new()),
            },
            _ => self.empty_value(),
        }
    }

    /// Default of a fresh option of this type: the declared value, else the
    /// generated empty value. Maps compose their children's defaults.
    pub fn default_value(&self) -> Value {
        if let KindSpec::Map { children } = &self.spec {
            let mut obj = Object::new();
            for (name, child) in children {
                let member = match self.value.as_ref().and_then(|v| v.get(name)) {
                    Some(v) if !v.as_str().is_some_and(link::is_link) => v.clone(),
                    _ => child.default_value(),
                };
                obj.insert(name.clone(), member);
            }
            return Value::Object(obj);
        }
        match &self.value {
            Some(v) => v.clone(),
            None => self.generate_value(&self.empty_value()),
        }
    }
}
