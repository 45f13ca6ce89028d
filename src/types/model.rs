//! OptionType: immutable, fully resolved type node.

use super::kind::Kind;
use crate::link::Link;
use crate::tree::{GetterFn, SetterFn, WatcherFn};
use crate::value::Value;
use regex::Regex;
use std::fmt;
use std::rc::Rc;

/// Name of the item template of a collection type.
pub const PROTO_NAME: &str = "*";

/// Kind-specific constraints and children.
#[derive(Debug, Clone)]
pub enum KindSpec {
    /// Kinds without extra attributes.
    Plain,
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    String {
        pattern: Option<Regex>,
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    Enum {
        allows: Vec<Value>,
    },
    Mixed {
        alternatives: Vec<Rc<OptionType>>,
    },
    Class {
        class: String,
    },
    Map {
        children: Vec<(String, Rc<OptionType>)>,
    },
    ArrayCollection {
        proto: Rc<OptionType>,
    },
    ObjectCollection {
        proto: Rc<OptionType>,
        options: Rc<OptionType>,
    },
}

/// Immutable description of one schema slot.
pub struct OptionType {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) kind: Kind,
    pub(crate) value: Option<Value>,
    pub(crate) links: Vec<Link>,
    pub(crate) writable: bool,
    pub(crate) nullable: bool,
    pub(crate) extends: bool,
    pub(crate) watcher: Option<WatcherFn>,
    pub(crate) getter: Option<GetterFn>,
    pub(crate) setter: Option<SetterFn>,
    pub(crate) spec: KindSpec,
}

impl OptionType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted name from the schema root.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Literal default declared by the schema.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Declared links, highest priority first.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn extends(&self) -> bool {
        self.extends
    }

    pub fn watcher(&self) -> Option<&WatcherFn> {
        self.watcher.as_ref()
    }

    pub fn getter(&self) -> Option<&GetterFn> {
        self.getter.as_ref()
    }

    pub fn setter(&self) -> Option<&SetterFn> {
        self.setter.as_ref()
    }

    pub fn spec(&self) -> &KindSpec {
        &self.spec
    }

    /// Named children of a map type.
    pub fn children(&self) -> &[(String, Rc<OptionType>)] {
        match &self.spec {
            KindSpec::Map { children } => children,
            _ => &[],
        }
    }

    /// Item template of a collection type.
    pub fn proto(&self) -> Option<&Rc<OptionType>> {
        match &self.spec {
            KindSpec::ArrayCollection { proto } | KindSpec::ObjectCollection { proto, .. } => {
                Some(proto)
            }
            _ => None,
        }
    }

    /// Settings map type of an object collection.
    pub fn options_type(&self) -> Option<&Rc<OptionType>> {
        match &self.spec {
            KindSpec::ObjectCollection { options, .. } => Some(options),
            _ => None,
        }
    }

    /// Whether items of this collection are ordered by their `priority` field.
    pub fn orders_by_priority(&self) -> bool {
        matches!(&self.spec, KindSpec::ObjectCollection { proto, .. } if proto.kind == Kind::Map)
    }

    /// Type of the child slot `name`.
    ///
    /// Maps look up their schema; array collections accept indices; object
    /// collections accept any key, with `options` naming the settings map.
    pub fn find_child_type(&self, name: &str) -> Option<Rc<OptionType>> {
        match &self.spec {
            KindSpec::Map { children } => children
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, ty)| Rc::clone(ty)),
            KindSpec::ArrayCollection { proto } => {
                (name == PROTO_NAME || name.parse::<usize>().is_ok()).then(|| Rc::clone(proto))
            }
            KindSpec::ObjectCollection { proto, options } => {
                if name == "options" {
                    Some(Rc::clone(options))
                } else {
                    Some(Rc::clone(proto))
                }
            }
            _ => None,
        }
    }

    /// Visit this type and every nested type, parents first.
    pub fn walk(&self, f: &mut dyn FnMut(&OptionType)) {
        f(self);
        match &self.spec {
            KindSpec::Map { children } => {
                for (_, child) in children {
                    child.walk(f);
                }
            }
            KindSpec::ArrayCollection { proto } => proto.walk(f),
            KindSpec::ObjectCollection { proto, options } => {
                options.walk(f);
                proto.walk(f);
            }
            _ => {}
        }
    }
}

impl fmt::Debug for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionType")
            .field("full_name", &self.full_name)
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("links", &self.links)
            .field("writable", &self.writable)
            .field("nullable", &self.nullable)
            .field("spec", &self.spec)
            .finish()
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.full_name)
    }
}
