//! Primitive kinds and their base definitions.

use crate::value::{Object, Value};

/// Primitive kind of an option type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Untyped,
    Boolean,
    Number,
    String,
    Enum,
    Mixed,
    Class,
    Object,
    Array,
    Map,
    ArrayCollection,
    ObjectCollection,
}

impl Kind {
    /// Every primitive kind, in registration order.
    pub const ALL: [Kind; 12] = [
        Kind::Untyped,
        Kind::Boolean,
        Kind::Number,
        Kind::String,
        Kind::Enum,
        Kind::Mixed,
        Kind::Class,
        Kind::Object,
        Kind::Array,
        Kind::Map,
        Kind::ArrayCollection,
        Kind::ObjectCollection,
    ];

    /// Schema name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Untyped => "untyped",
            Kind::Boolean => "boolean",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Enum => "enum",
            Kind::Mixed => "mixed",
            Kind::Class => "class",
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::Map => "map",
            Kind::ArrayCollection => "arrayCollection",
            Kind::ObjectCollection => "objectCollection",
        }
    }

    /// Parse a kind from its schema name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Kind::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Maps and collections own child options.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Kind::Map | Kind::ArrayCollection | Kind::ObjectCollection
        )
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Kind::ArrayCollection | Kind::ObjectCollection)
    }

    /// Attributes a definition of this kind must carry.
    pub fn required_attributes(&self) -> &'static [&'static str] {
        match self {
            Kind::Map => &["schema"],
            Kind::ArrayCollection | Kind::ObjectCollection => &["proto"],
            Kind::Enum | Kind::Mixed => &["allows"],
            Kind::Class => &["class"],
            _ => &[],
        }
    }

    /// Attributes understood by this kind beyond the universal ones.
    pub fn specific_attributes(&self) -> &'static [&'static str] {
        match self {
            Kind::Number => &["minValue", "maxValue"],
            Kind::String => &["pattern", "minLength", "maxLength"],
            Kind::Enum | Kind::Mixed => &["allows"],
            Kind::Class => &["class"],
            _ => &[],
        }
    }

    /// Generic defaults with this kind's own defaults merged over them.
    pub fn base_definition(&self) -> Object {
        let mut base = Object::new();
        base.insert("writable".to_string(), Value::Bool(true));
        base.insert("nullable".to_string(), Value::Bool(true));
        base.insert("extends".to_string(), Value::Bool(false));
        base.insert("link".to_string(), Value::Null);

        if matches!(
            self,
            Kind::Boolean
                | Kind::Number
                | Kind::String
                | Kind::Map
                | Kind::ArrayCollection
                | Kind::ObjectCollection
        ) {
            base.insert("nullable".to_string(), Value::Bool(false));
        }
        base
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
