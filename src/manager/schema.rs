//! Schema definitions and built schemas.

use crate::error::{OptreeError, Result};
use crate::types::{OptionDef, OptionType};
use crate::value::Value;
use std::rc::Rc;

/// Ordered root namespace of option definitions.
#[derive(Debug, Clone, Default)]
pub struct SchemaDef {
    entries: Vec<(String, OptionDef)>,
}

impl SchemaDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`SchemaDef::insert`].
    pub fn with(mut self, name: &str, def: OptionDef) -> Self {
        self.insert(name, def);
        self
    }

    /// Add or replace a root entry.
    pub fn insert(&mut self, name: &str, def: OptionDef) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = def,
            None => self.entries.push((name.to_string(), def)),
        }
    }

    pub fn entries(&self) -> &[(String, OptionDef)] {
        &self.entries
    }

    /// Parse a root namespace from JSON.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            OptreeError::SchemaDefinitionError("schema root must be an object".to_string())
        })?;
        let root = OptionDef::namespace(obj)?;
        Ok(Self {
            entries: root.schema.unwrap_or_default(),
        })
    }

    /// Definition at a dotted path, for attaching hooks after parsing.
    ///
    /// `*` addresses a collection's item template and `options.<name>` an
    /// object collection's setting.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut OptionDef> {
        let mut segments = path.split('.').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut current = self
            .entries
            .iter_mut()
            .find(|(n, _)| n == first)
            .map(|(_, def)| def)?;
        while let Some(segment) = segments.next() {
            current = if segment == "options" && current.options.is_some() {
                let name = segments.next()?;
                current.setting_mut(name)?
            } else {
                current.child_mut(segment)?
            };
        }
        Some(current)
    }
}

/// Built type tree of a schema.
#[derive(Debug, Clone)]
pub struct Schema {
    root: Vec<(String, Rc<OptionType>)>,
}

impl Schema {
    pub(crate) fn new(root: Vec<(String, Rc<OptionType>)>) -> Self {
        Self { root }
    }

    /// Root entries in declaration order.
    pub fn root(&self) -> &[(String, Rc<OptionType>)] {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&Rc<OptionType>> {
        self.root.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }

    /// Type at a dotted path. Collection segments accept item keys.
    pub fn find_type(&self, path: &str) -> Option<Rc<OptionType>> {
        let mut segments = path.split('.').filter(|s| !s.is_empty());
        let mut current = Rc::clone(self.get(segments.next()?)?);
        for segment in segments {
            current = current.find_child_type(segment)?;
        }
        Some(current)
    }

    /// Visit every type node, parents first.
    pub fn walk(&self, f: &mut dyn FnMut(&OptionType)) {
        for (_, ty) in &self.root {
            ty.walk(f);
        }
    }

    /// Number of type nodes in the schema.
    pub fn type_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }
}
