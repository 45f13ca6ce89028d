//! Building type nodes from resolved definitions.

use super::definition::OptionDef;
use super::kind::Kind;
use super::model::{KindSpec, OptionType, PROTO_NAME};
use crate::error::{OptreeError, Result};
use crate::link;
use crate::value::Value;
use regex::Regex;
use std::rc::Rc;
use tracing::{debug, warn};

/// Attributes every kind understands.
const UNIVERSAL_ATTRIBUTES: &[&str] = &["value", "link", "writable", "nullable", "extends"];

/// Flattens custom-type inheritance for a definition.
///
/// Implemented by the option manager; the returned definition names a
/// primitive kind (or an unknown name, which the builder rejects).
pub trait TypeResolver {
    fn resolve_definition(&self, def: &OptionDef, full_name: &str) -> Result<OptionDef>;
}

impl OptionType {
    /// Build the type node for `def`, recursively building child types.
    ///
    /// # Arguments
    ///
    /// * `name` - Local name of the slot
    /// * `parent` - Full name of the parent slot, if any
    /// * `def` - Definition, possibly naming a custom type
    /// * `resolver` - Custom-type resolver
    ///
    /// # Returns
    ///
    /// * `Ok(Rc<OptionType>)` - Immutable type node
    /// * `Err(OptreeError::SchemaDefinitionError)` - Invalid definition
    pub fn build(
        name: &str,
        parent: Option<&str>,
        def: &OptionDef,
        resolver: &dyn TypeResolver,
    ) -> Result<Rc<OptionType>> {
        Builder { resolver }.build(name, join(parent, name), def, false)
    }
}

fn join(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) if !p.is_empty() => format!("{}.{}", p, name),
        _ => name.to_string(),
    }
}

fn schema_err(msg: String) -> OptreeError {
    OptreeError::SchemaDefinitionError(msg)
}

struct Builder<'a> {
    resolver: &'a dyn TypeResolver,
}

impl Builder<'_> {
    fn build(
        &self,
        name: &str,
        full_name: String,
        def: &OptionDef,
        read_only: bool,
    ) -> Result<Rc<OptionType>> {
        let resolved = self.resolver.resolve_definition(def, &full_name)?;
        let kind = Kind::from_str(&resolved.kind).ok_or_else(|| {
            schema_err(format!(
                "option \"{}\" has unknown type '{}'",
                full_name, resolved.kind
            ))
        })?;
        let base = OptionDef {
            kind: kind.as_str().to_string(),
            attrs: kind.base_definition(),
            ..OptionDef::default()
        };
        let def = resolved.merged_over(&base);

        for attr in kind.required_attributes() {
            if !def.has_attr(attr) {
                return Err(schema_err(format!(
                    "option \"{}\" of type '{}' requires attribute '{}'",
                    full_name, kind, attr
                )));
            }
        }
        for key in def.attrs.keys() {
            if !UNIVERSAL_ATTRIBUTES.contains(&key.as_str())
                && !kind.specific_attributes().contains(&key.as_str())
            {
                debug!(option = %full_name, attribute = %key, "ignoring unknown attribute");
            }
        }

        let writable = bool_attr(&def, "writable", &full_name)? && !read_only;
        let nullable = bool_attr(&def, "nullable", &full_name)?;
        let extends = bool_attr(&def, "extends", &full_name)?;
        if kind == Kind::Class && !nullable {
            return Err(schema_err(format!(
                "option \"{}\" of type 'class' is always nullable",
                full_name
            )));
        }

        let mut links = Vec::new();
        match def.get_attr("link") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => links.push(link::parse(s).ok_or_else(|| {
                schema_err(format!(
                    "option \"{}\" has invalid link '{}'",
                    full_name, s
                ))
            })?),
            Some(other) => {
                return Err(schema_err(format!(
                    "attribute 'link' of option \"{}\" must be a link string, got {}",
                    full_name, other
                )));
            }
        }

        let spec = self.build_spec(kind, &def, &full_name, writable)?;
        let mut ty = OptionType {
            name: name.to_string(),
            full_name,
            kind,
            value: None,
            links,
            writable,
            nullable,
            extends,
            watcher: def.watcher.clone(),
            getter: def.getter.clone(),
            setter: def.setter.clone(),
            spec,
        };

        if let Some(value) = def.get_attr("value") {
            match value.as_str().and_then(link::parse) {
                Some(parsed) => ty.links.push(parsed),
                None if value.is_null() => {}
                None => {
                    ty.validate_value(value).map_err(|e| {
                        schema_err(format!("default value of option {} is invalid: {}", ty, e))
                    })?;
                    ty.value = Some(value.clone());
                }
            }
        }
        ty.links.sort_by(|a, b| b.priority.cmp(&a.priority));

        Ok(Rc::new(ty))
    }

    fn build_spec(
        &self,
        kind: Kind,
        def: &OptionDef,
        full_name: &str,
        writable: bool,
    ) -> Result<KindSpec> {
        let spec = match kind {
            Kind::Number => {
                let min = number_attr(def, "minValue", full_name)?;
                let max = number_attr(def, "maxValue", full_name)?;
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(schema_err(format!(
                            "option \"{}\": minValue {} is greater than maxValue {}",
                            full_name, lo, hi
                        )));
                    }
                }
                KindSpec::Number { min, max }
            }
            Kind::String => {
                let pattern = match def.get_attr("pattern") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(p)) => Some(Regex::new(p).map_err(|e| {
                        schema_err(format!(
                            "option \"{}\" has invalid pattern '{}': {}",
                            full_name, p, e
                        ))
                    })?),
                    Some(other) => {
                        return Err(schema_err(format!(
                            "attribute 'pattern' of option \"{}\" must be a string, got {}",
                            full_name, other
                        )));
                    }
                };
                let min_len = length_attr(def, "minLength", full_name)?;
                let max_len = length_attr(def, "maxLength", full_name)?;
                if let (Some(lo), Some(hi)) = (min_len, max_len) {
                    if lo > hi {
                        return Err(schema_err(format!(
                            "option \"{}\": minLength {} is greater than maxLength {}",
                            full_name, lo, hi
                        )));
                    }
                }
                KindSpec::String {
                    pattern,
                    min_len,
                    max_len,
                }
            }
            Kind::Enum => {
                let allows = allows_attr(def, full_name)?;
                if let Some(bad) = allows.iter().find(|v| v.is_array() || v.is_object()) {
                    return Err(schema_err(format!(
                        "option \"{}\": enum values must be scalars, got {}",
                        full_name, bad
                    )));
                }
                KindSpec::Enum { allows }
            }
            Kind::Mixed => self.build_mixed(def, full_name, writable)?,
            Kind::Class => match def.get_attr("class") {
                Some(Value::String(class)) if !class.is_empty() => KindSpec::Class {
                    class: class.clone(),
                },
                _ => {
                    return Err(schema_err(format!(
                        "attribute 'class' of option \"{}\" must be a non-empty class name",
                        full_name
                    )));
                }
            },
            Kind::Map => {
                let mut children = Vec::new();
                for (child_name, child_def) in def.schema.iter().flatten() {
                    let child = self.build(
                        child_name,
                        join(Some(full_name), child_name),
                        child_def,
                        !writable,
                    )?;
                    children.push((child_name.clone(), child));
                }
                KindSpec::Map { children }
            }
            Kind::ArrayCollection => KindSpec::ArrayCollection {
                proto: self.build_proto(def, full_name, writable, false)?,
            },
            Kind::ObjectCollection => {
                let proto = self.build_proto(def, full_name, writable, true)?;
                let mut options_def = OptionDef::map();
                options_def.schema = Some(def.options.clone().unwrap_or_default());
                let options = self.build(
                    "options",
                    join(Some(full_name), "options"),
                    &options_def,
                    !writable,
                )?;
                KindSpec::ObjectCollection { proto, options }
            }
            Kind::Untyped | Kind::Boolean | Kind::Object | Kind::Array => KindSpec::Plain,
        };
        Ok(spec)
    }

    fn build_proto(
        &self,
        def: &OptionDef,
        full_name: &str,
        writable: bool,
        with_priority: bool,
    ) -> Result<Rc<OptionType>> {
        let proto_name = join(Some(full_name), PROTO_NAME);
        let Some(proto) = def.proto.as_deref() else {
            return Err(schema_err(format!(
                "option \"{}\" requires attribute 'proto'",
                full_name
            )));
        };
        let mut proto = self.resolver.resolve_definition(proto, &proto_name)?;
        if with_priority && proto.kind == Kind::Map.as_str() {
            let schema = proto.schema.get_or_insert_with(Vec::new);
            if !schema.iter().any(|(n, _)| n == "priority") {
                schema.push((
                    "priority".to_string(),
                    OptionDef::new("number").nullable(false),
                ));
            }
        }
        self.build(PROTO_NAME, proto_name, &proto, !writable)
    }

    fn build_mixed(&self, def: &OptionDef, full_name: &str, writable: bool) -> Result<KindSpec> {
        let mut alternatives: Vec<Rc<OptionType>> = Vec::new();
        for (index, raw) in allows_attr(def, full_name)?.iter().enumerate() {
            let alt_name = format!("{}[{}]", full_name, index);
            let alt_def = match raw {
                Value::String(kind) => OptionDef::new(kind),
                other => OptionDef::from_json(other)?,
            };
            let mut alt_def = self.resolver.resolve_definition(&alt_def, &alt_name)?;
            if alt_def.attrs.remove("value").is_some_and(|v| !v.is_null()) {
                warn!(option = %alt_name, "ignoring default value of a mixed alternative");
            }
            alt_def.attrs.remove("link");
            alt_def.attrs.insert("nullable".to_string(), Value::Bool(true));

            let alt = self.build(&index.to_string(), alt_name, &alt_def, !writable)?;
            if alt.kind.is_composite() {
                return Err(schema_err(format!(
                    "option \"{}\": mixed alternatives cannot be of type '{}'",
                    full_name, alt.kind
                )));
            }
            if alternatives.iter().any(|a| a.kind == alt.kind) {
                return Err(schema_err(format!(
                    "option \"{}\": type '{}' is allowed more than once",
                    full_name, alt.kind
                )));
            }
            alternatives.push(alt);
        }
        Ok(KindSpec::Mixed { alternatives })
    }
}

fn bool_attr(def: &OptionDef, key: &str, full_name: &str) -> Result<bool> {
    match def.get_attr(key) {
        Some(Value::Bool(b)) => Ok(*b),
        None | Some(Value::Null) => Ok(false),
        Some(other) => Err(schema_err(format!(
            "attribute '{}' of option \"{}\" must be a boolean, got {}",
            key, full_name, other
        ))),
    }
}

fn number_attr(def: &OptionDef, key: &str, full_name: &str) -> Result<Option<f64>> {
    match def.get_attr(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(schema_err(format!(
            "attribute '{}' of option \"{}\" must be a number or null, got {}",
            key, full_name, other
        ))),
    }
}

fn length_attr(def: &OptionDef, key: &str, full_name: &str) -> Result<Option<usize>> {
    match def.get_attr(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) if n.as_u64().is_some() => Ok(n.as_u64().map(|v| v as usize)),
        Some(other) => Err(schema_err(format!(
            "attribute '{}' of option \"{}\" must be a non-negative integer or null, got {}",
            key, full_name, other
        ))),
    }
}

fn allows_attr(def: &OptionDef, full_name: &str) -> Result<Vec<Value>> {
    match def.get_attr("allows") {
        Some(Value::Array(items)) if !items.is_empty() => Ok(items.clone()),
        _ => Err(schema_err(format!(
            "attribute 'allows' of option \"{}\" must be a non-empty list",
            full_name
        ))),
    }
}
