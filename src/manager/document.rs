//! Schema documents: custom types plus a root schema in one YAML/JSON file.

use super::registry::OptionManager;
use super::schema::{Schema, SchemaDef};
use crate::error::{OptreeError, Result};
use crate::types::OptionDef;
use crate::value::Value;
use std::path::Path;

/// A schema document.
///
/// ```yaml
/// types:
///   port: { type: number, minValue: 1, maxValue: 65535 }
/// options:
///   server:
///     port: { type: port, value: 8080 }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaDocument {
    /// Custom types in document order.
    pub types: Vec<(String, OptionDef)>,
    /// Root schema.
    pub options: SchemaDef,
}

impl SchemaDocument {
    /// Load a document from a YAML (or JSON) file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OptreeError::UserError(format!(
                "failed to read schema file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a document from YAML. JSON is accepted as a YAML subset.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(yaml)
            .map_err(|e| OptreeError::UserError(format!("failed to parse schema YAML: {}", e)))?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let mut doc = Self::default();
        match value {
            Value::Null => return Ok(doc),
            Value::Object(_) => {}
            _ => {
                return Err(OptreeError::SchemaDefinitionError(
                    "schema document must be a mapping".to_string(),
                ));
            }
        }

        if let Some(types) = value.get("types").filter(|v| !v.is_null()) {
            let types = types.as_object().ok_or_else(|| {
                OptreeError::SchemaDefinitionError("'types' must be a mapping".to_string())
            })?;
            for (name, def) in types {
                doc.types.push((name.clone(), OptionDef::from_json(def)?));
            }
        }
        if let Some(options) = value.get("options").filter(|v| !v.is_null()) {
            doc.options = SchemaDef::from_json(options)?;
        }
        Ok(doc)
    }

    /// Register the custom types and build the schema.
    pub fn build(&self) -> Result<(OptionManager, Schema)> {
        let mut manager = OptionManager::new();
        for (name, def) in &self.types {
            manager.register_type(name, def.clone())?;
        }
        let schema = manager.build_schema(&self.options)?;
        Ok((manager, schema))
    }
}
