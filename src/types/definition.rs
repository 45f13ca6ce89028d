//! Option definitions: the raw, mergeable input a type is built from.

use crate::error::{OptreeError, Result};
use crate::tree::{Getter, GetterFn, Setter, SetterFn, Tree, WatchEvent, WatcherFn};
use crate::value::{merge_deep, Object, Value};
use std::fmt;
use std::rc::Rc;

/// Definition of one option, before inheritance is resolved.
///
/// Plain attributes (`value`, `link`, `writable`, `minValue`, ...) live in
/// `attrs`. Child definitions and hooks are kept apart so that definitions
/// can be merged member by member.
#[derive(Clone, Default)]
pub struct OptionDef {
    /// Primitive kind name or the name of a registered custom type.
    pub kind: String,
    pub attrs: Object,
    /// Named children of a map.
    pub schema: Option<Vec<(String, OptionDef)>>,
    /// Item template of a collection.
    pub proto: Option<Box<OptionDef>>,
    /// Collection-wide settings of an object collection.
    pub options: Option<Vec<(String, OptionDef)>>,
    pub watcher: Option<WatcherFn>,
    pub getter: Option<GetterFn>,
    pub setter: Option<SetterFn>,
}

impl OptionDef {
    /// Definition of the given kind (primitive or custom) with no attributes.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    /// An empty map definition.
    pub fn map() -> Self {
        Self {
            kind: "map".to_string(),
            schema: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Set the default value.
    pub fn value(self, value: impl Into<Value>) -> Self {
        self.attr("value", value)
    }

    /// Declare a link.
    pub fn link(self, link: &str) -> Self {
        self.attr("link", link)
    }

    pub fn writable(self, writable: bool) -> Self {
        self.attr("writable", writable)
    }

    pub fn nullable(self, nullable: bool) -> Self {
        self.attr("nullable", nullable)
    }

    pub fn extends(self, extends: bool) -> Self {
        self.attr("extends", extends)
    }

    /// Set any attribute.
    pub fn attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Add or replace a map child.
    pub fn child(mut self, name: &str, def: OptionDef) -> Self {
        upsert(self.schema.get_or_insert_with(Vec::new), name, def);
        self
    }

    /// Set the collection item template.
    pub fn proto(mut self, def: OptionDef) -> Self {
        self.proto = Some(Box::new(def));
        self
    }

    /// Add or replace an object-collection setting.
    pub fn option(mut self, name: &str, def: OptionDef) -> Self {
        upsert(self.options.get_or_insert_with(Vec::new), name, def);
        self
    }

    /// Attach the type-level watcher.
    pub fn watcher<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Tree, &mut WatchEvent) -> Result<()> + 'static,
    {
        self.watcher = Some(Rc::new(f));
        self
    }

    /// Attach a custom getter. It receives the default getter as `Getter::value`.
    pub fn getter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Getter<'_>) -> Result<Value> + 'static,
    {
        self.getter = Some(Rc::new(f));
        self
    }

    /// Attach a custom setter. It stores through `Setter::set`.
    pub fn setter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Setter<'_>, Value) -> Result<()> + 'static,
    {
        self.setter = Some(Rc::new(f));
        self
    }

    /// Attribute lookup.
    pub fn get_attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Whether an attribute (or child block) is present with a non-null value.
    pub fn has_attr(&self, key: &str) -> bool {
        match key {
            "schema" => self.schema.is_some(),
            "proto" => self.proto.is_some(),
            "options" => self.options.is_some(),
            _ => self.attrs.get(key).is_some_and(|v| !v.is_null()),
        }
    }

    /// Parse a JSON (or YAML-derived) definition.
    ///
    /// A node with a string `type` is an option definition; any other object
    /// is a namespace and becomes a map of its members.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            OptreeError::SchemaDefinitionError(format!(
                "option definition must be an object, got {}",
                value
            ))
        })?;

        let kind = match obj.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_string(),
            None => return Self::namespace(obj),
        };

        let mut def = OptionDef::new(&kind);
        for (key, member) in obj {
            match key.as_str() {
                "type" => {}
                "schema" => def.schema = Some(parse_entries(member, "schema")?),
                "options" => def.options = Some(parse_entries(member, "options")?),
                "proto" => def.proto = Some(Box::new(Self::from_json(member)?)),
                "watcher" | "getter" | "setter" => {
                    if !member.is_null() {
                        return Err(OptreeError::SchemaDefinitionError(format!(
                            "attribute '{}' can only be attached in code",
                            key
                        )));
                    }
                }
                _ => {
                    def.attrs.insert(key.clone(), member.clone());
                }
            }
        }
        Ok(def)
    }

    /// Build a map definition from the members of a namespace node.
    pub fn namespace(entries: &Object) -> Result<Self> {
        let mut def = OptionDef::map();
        def.schema = Some(parse_members(entries)?);
        Ok(def)
    }

    /// Merge this definition over `base`; this definition wins.
    ///
    /// Attributes merge deeply, children merge by name and the item template
    /// merges recursively. The kind is kept unless this definition has none.
    pub fn merged_over(&self, base: &OptionDef) -> OptionDef {
        let kind = if self.kind.is_empty() {
            base.kind.clone()
        } else {
            self.kind.clone()
        };

        let mut attrs = base.attrs.clone();
        for (key, value) in &self.attrs {
            let merged = match attrs.get(key) {
                Some(existing) => merge_deep(existing, value),
                None => value.clone(),
            };
            attrs.insert(key.clone(), merged);
        }

        let proto = match (&self.proto, &base.proto) {
            (Some(own), Some(inherited)) => Some(Box::new(own.merged_over(inherited))),
            (Some(own), None) => Some(own.clone()),
            (None, inherited) => inherited.clone(),
        };

        OptionDef {
            kind,
            attrs,
            schema: merge_entries(&self.schema, &base.schema),
            proto,
            options: merge_entries(&self.options, &base.options),
            watcher: self.watcher.clone().or_else(|| base.watcher.clone()),
            getter: self.getter.clone().or_else(|| base.getter.clone()),
            setter: self.setter.clone().or_else(|| base.setter.clone()),
        }
    }

    /// Child definition by name: map children, `*` for the item template,
    /// `options` for object-collection settings.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut OptionDef> {
        if let Some(entries) = self.schema.as_mut() {
            if let Some((_, def)) = entries.iter_mut().find(|(n, _)| n == name) {
                return Some(def);
            }
        }
        if name == super::PROTO_NAME {
            return self.proto.as_deref_mut();
        }
        None
    }

    /// Settings definition of an object collection by name.
    pub fn setting_mut(&mut self, name: &str) -> Option<&mut OptionDef> {
        self.options
            .as_mut()?
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, def)| def)
    }
}

impl fmt::Debug for OptionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionDef")
            .field("kind", &self.kind)
            .field("attrs", &self.attrs)
            .field("schema", &self.schema)
            .field("proto", &self.proto)
            .field("options", &self.options)
            .field("watcher", &self.watcher.is_some())
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

fn upsert(entries: &mut Vec<(String, OptionDef)>, name: &str, def: OptionDef) {
    match entries.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = def,
        None => entries.push((name.to_string(), def)),
    }
}

fn parse_entries(value: &Value, attr: &str) -> Result<Vec<(String, OptionDef)>> {
    let obj = value.as_object().ok_or_else(|| {
        OptreeError::SchemaDefinitionError(format!(
            "attribute '{}' must be an object of option definitions",
            attr
        ))
    })?;
    parse_members(obj)
}

fn parse_members(obj: &Object) -> Result<Vec<(String, OptionDef)>> {
    obj.iter()
        .map(|(name, member)| {
            OptionDef::from_json(member)
                .map(|def| (name.clone(), def))
                .map_err(|e| match e {
                    OptreeError::SchemaDefinitionError(msg) => {
                        OptreeError::SchemaDefinitionError(format!("{}: {}", name, msg))
                    }
                    other => other,
                })
        })
        .collect()
}

fn merge_entries(
    own: &Option<Vec<(String, OptionDef)>>,
    base: &Option<Vec<(String, OptionDef)>>,
) -> Option<Vec<(String, OptionDef)>> {
    match (own, base) {
        (None, None) => None,
        (Some(own), None) => Some(own.clone()),
        (None, Some(base)) => Some(base.clone()),
        (Some(own), Some(base)) => {
            let mut merged: Vec<(String, OptionDef)> = base.clone();
            for (name, def) in own {
                match merged.iter_mut().find(|(n, _)| n == name) {
                    Some(slot) => slot.1 = def.merged_over(&slot.1),
                    None => merged.push((name.clone(), def.clone())),
                }
            }
            Some(merged)
        }
    }
}
