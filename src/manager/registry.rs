//! Custom-type registry and inheritance resolution.

use super::schema::{Schema, SchemaDef};
use crate::error::{OptreeError, Result};
use crate::types::{Kind, OptionDef, OptionType, TypeResolver};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Registry of custom types.
///
/// Custom types may extend each other in any registration order. Before any
/// type is built the registry is flattened: every custom type is merged over
/// its ancestors until a primitive kind is reached.
#[derive(Debug, Default)]
pub struct OptionManager {
    custom: Vec<(String, OptionDef)>,
    resolved: HashMap<String, OptionDef>,
    dirty: bool,
}

impl OptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom type.
    ///
    /// # Arguments
    ///
    /// * `name` - Type name used in `type` attributes
    /// * `def` - Definition; its kind is a primitive or another custom type
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Registered
    /// * `Err(OptreeError::SchemaDefinitionError)` - Name clashes with a primitive or registered type
    pub fn register_type(&mut self, name: &str, def: OptionDef) -> Result<()> {
        if name.is_empty() {
            return Err(OptreeError::SchemaDefinitionError(
                "custom type name must not be empty".to_string(),
            ));
        }
        if Kind::from_str(name).is_some() {
            return Err(OptreeError::SchemaDefinitionError(format!(
                "cannot redefine primitive type '{}'",
                name
            )));
        }
        if self.has_custom_type(name) {
            return Err(OptreeError::SchemaDefinitionError(format!(
                "type '{}' is already registered",
                name
            )));
        }
        debug!(name, base = %def.kind, "registering custom type");
        self.custom.push((name.to_string(), def));
        self.dirty = true;
        Ok(())
    }

    pub fn has_custom_type(&self, name: &str) -> bool {
        self.custom.iter().any(|(n, _)| n == name)
    }

    /// Names of primitive kinds followed by custom types.
    pub fn type_names(&self) -> Vec<&str> {
        Kind::ALL
            .iter()
            .map(|k| k.as_str())
            .chain(self.custom.iter().map(|(n, _)| n.as_str()))
            .collect()
    }

    /// Flatten the extends graph of all registered custom types.
    ///
    /// Fails on cycles and on custom types whose base is unknown.
    pub fn resolve(&mut self) -> Result<()> {
        let mut resolved = HashMap::new();
        for (name, _) in &self.custom {
            let mut stack = Vec::new();
            self.flatten(name, &mut resolved, &mut stack)?;
        }
        self.resolved = resolved;
        self.dirty = false;
        Ok(())
    }

    fn flatten(
        &self,
        name: &str,
        resolved: &mut HashMap<String, OptionDef>,
        stack: &mut Vec<String>,
    ) -> Result<OptionDef> {
        if let Some(done) = resolved.get(name) {
            return Ok(done.clone());
        }
        if stack.iter().any(|n| n == name) {
            stack.push(name.to_string());
            return Err(OptreeError::SchemaDefinitionError(format!(
                "custom types form an inheritance cycle: {}",
                stack.join(" -> ")
            )));
        }
        let Some((_, def)) = self.custom.iter().find(|(n, _)| n == name) else {
            return Err(OptreeError::SchemaDefinitionError(format!(
                "unknown type '{}'",
                name
            )));
        };

        let flat = if Kind::from_str(&def.kind).is_some() {
            def.clone()
        } else if self.has_custom_type(&def.kind) {
            stack.push(name.to_string());
            let base = self.flatten(&def.kind, resolved, stack)?;
            stack.pop();
            let mut merged = def.merged_over(&base);
            merged.kind = base.kind;
            merged
        } else {
            return Err(OptreeError::SchemaDefinitionError(format!(
                "custom type '{}' extends unknown type '{}'",
                name, def.kind
            )));
        };

        resolved.insert(name.to_string(), flat.clone());
        Ok(flat)
    }

    /// Build a single type node.
    pub fn build_type(&mut self, name: &str, def: &OptionDef) -> Result<Rc<OptionType>> {
        if self.dirty {
            self.resolve()?;
        }
        OptionType::build(name, None, def, self)
    }

    /// Build the type tree of every root entry of a schema.
    pub fn build_schema(&mut self, schema: &SchemaDef) -> Result<Schema> {
        if self.dirty {
            self.resolve()?;
        }
        let mut root = Vec::new();
        for (name, def) in schema.entries() {
            root.push((name.clone(), OptionType::build(name, None, def, self)?));
        }
        Ok(Schema::new(root))
    }
}

impl TypeResolver for OptionManager {
    fn resolve_definition(&self, def: &OptionDef, full_name: &str) -> Result<OptionDef> {
        if Kind::from_str(&def.kind).is_some() {
            return Ok(def.clone());
        }
        match self.resolved.get(&def.kind) {
            Some(base) => {
                let mut merged = def.merged_over(base);
                merged.kind = base.kind.clone();
                Ok(merged)
            }
            None => Err(OptreeError::SchemaDefinitionError(format!(
                "option \"{}\" has unknown type '{}'",
                full_name, def.kind
            ))),
        }
    }
}
