//! Runtime option nodes and their state components.

use super::hooks::{WatcherFn, WatcherId};
use crate::link::Link;
use crate::types::OptionType;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Stable handle of an option in a [`Tree`](super::Tree).
///
/// Handles survive renames (array reindexing); they go stale once the option
/// is removed from its context. A freed arena slot is reused under a new
/// generation, so a stale handle never reaches the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)?;
        if self.generation > 0 {
            write!(f, "/{}", self.generation)?;
        }
        Ok(())
    }
}

/// Parent of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Root,
    Option(OptionId),
}

/// Links of one option, highest priority first.
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkSet {
    links: Vec<Link>,
}

impl LinkSet {
    /// Insert keeping descending priority; equal priorities keep declaration
    /// order. A link with the same target replaces the old one.
    pub(crate) fn insert(&mut self, link: Link) {
        self.links.retain(|l| l.value != link.value);
        let at = self
            .links
            .iter()
            .position(|l| l.priority < link.priority)
            .unwrap_or(self.links.len());
        self.links.insert(at, link);
    }

    pub(crate) fn remove(&mut self, value: &str) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.value != value);
        before != self.links.len()
    }

    pub(crate) fn contains(&self, value: &str) -> bool {
        self.links.iter().any(|l| l.value == value)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub(crate) fn first(&self) -> Option<&Link> {
        self.links.first()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub(crate) fn to_vec(&self) -> Vec<Link> {
        self.links.clone()
    }
}

/// Instance watchers in registration order.
#[derive(Clone, Default)]
pub(crate) struct WatcherList {
    watchers: Vec<(WatcherId, WatcherFn)>,
}

impl WatcherList {
    pub(crate) fn add(&mut self, id: WatcherId, watcher: WatcherFn) {
        self.watchers.push((id, watcher));
    }

    pub(crate) fn remove(&mut self, id: WatcherId) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|(w, _)| *w != id);
        before != self.watchers.len()
    }

    pub(crate) fn callbacks(&self) -> Vec<WatcherFn> {
        self.watchers.iter().map(|(_, f)| Rc::clone(f)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.watchers.len()
    }
}

/// Children owned by a composite option.
#[derive(Debug, Clone)]
pub(crate) enum Container {
    /// Sealed, schema-defined children in schema order.
    Map(Vec<(String, OptionId)>),
    /// Items whose names are their indices.
    Array(Vec<OptionId>),
    /// Keyed items in insertion order plus the permanent settings map.
    Object {
        items: Vec<(String, OptionId)>,
        options: OptionId,
    },
}

impl Container {
    pub(crate) fn child(&self, name: &str) -> Option<OptionId> {
        match self {
            Container::Map(children) => children.iter().find(|(n, _)| n == name).map(|(_, id)| *id),
            Container::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i).copied()),
            Container::Object { items, options } => {
                if name == "options" {
                    Some(*options)
                } else {
                    items.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
                }
            }
        }
    }

    /// Keep only the children `keep` accepts. The settings map always stays.
    pub(crate) fn retain(&mut self, keep: impl Fn(OptionId) -> bool) {
        match self {
            Container::Map(children) => children.retain(|(_, id)| keep(*id)),
            Container::Array(items) => items.retain(|id| keep(*id)),
            Container::Object { items, .. } => items.retain(|(_, id)| keep(*id)),
        }
    }

    /// Every owned option, settings map included.
    pub(crate) fn all_children(&self) -> Vec<OptionId> {
        match self {
            Container::Map(children) => children.iter().map(|(_, id)| *id).collect(),
            Container::Array(items) => items.clone(),
            Container::Object { items, options } => std::iter::once(*options)
                .chain(items.iter().map(|(_, id)| *id))
                .collect(),
        }
    }
}

/// Arena slot. The generation is bumped whenever the occupant is removed.
#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) generation: u32,
    pub(crate) node: Option<Node>,
}

/// One runtime option.
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) ty: Rc<OptionType>,
    pub(crate) context: Context,
    /// Explicit value. Composite options only store an explicit `null` here.
    pub(crate) value: Option<Value>,
    pub(crate) value_default: Option<Value>,
    pub(crate) links: LinkSet,
    pub(crate) locked: bool,
    pub(crate) watchers: WatcherList,
    pub(crate) container: Option<Container>,
}

impl Node {
    pub(crate) fn new(name: &str, ty: Rc<OptionType>, context: Context) -> Self {
        let value_default = if ty.kind().is_composite() {
            None
        } else {
            ty.value().cloned()
        };
        Self {
            name: name.to_string(),
            ty,
            context,
            value: None,
            value_default,
            links: LinkSet::default(),
            locked: false,
            watchers: WatcherList::default(),
            container: None,
        }
    }

    pub(crate) fn is_null(&self) -> bool {
        matches!(self.value, Some(Value::Null))
    }
}
