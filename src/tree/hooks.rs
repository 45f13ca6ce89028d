//! Watcher, getter and setter hooks.

use super::model::Tree;
use super::node::OptionId;
use crate::error::Result;
use crate::value::Value;
use std::rc::Rc;

/// Change callback. Runs synchronously and may mutate the tree.
pub type WatcherFn = Rc<dyn Fn(&mut Tree, &mut WatchEvent) -> Result<()>>;

/// Custom read hook. The default getter is reachable through [`Getter::value`].
pub type GetterFn = Rc<dyn Fn(&Getter<'_>) -> Result<Value>>;

/// Custom write hook. The default setter is reachable through [`Setter::set`].
pub type SetterFn = Rc<dyn Fn(&mut Setter<'_>, Value) -> Result<()>>;

/// Handle returned when a watcher is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(pub(crate) u64);

/// Node an event is about or delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The tree root (root watchers).
    Root,
    Option(OptionId),
}

/// Change notification.
///
/// Ancestors receive single-key payloads naming the changed child, nested
/// once per level: a write of `3` to `a.b.c` reaches `a` as `{"b": {"c": 3}}`.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// Option whose write started the dispatch.
    pub target: Target,
    /// Node whose watchers are running.
    pub current: Target,
    pub value: Value,
    pub old: Value,
    /// Set while the event travels up the ancestor chain.
    pub bubbled: bool,
    stopped: bool,
}

impl WatchEvent {
    pub(crate) fn new(target: Target, value: Value, old: Value) -> Self {
        Self {
            target,
            current: target,
            value,
            old,
            bubbled: false,
            stopped: false,
        }
    }

    /// Halt delivery to further ancestors. Link dependents are still notified.
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped
    }
}

/// Context handed to a custom getter.
pub struct Getter<'a> {
    pub(crate) tree: &'a Tree,
    pub(crate) id: OptionId,
}

impl Getter<'_> {
    pub fn id(&self) -> OptionId {
        self.id
    }

    pub fn tree(&self) -> &Tree {
        self.tree
    }

    /// Value as the default getter computes it.
    pub fn value(&self) -> Result<Value> {
        self.tree.default_value_of(self.id)
    }
}

/// Context handed to a custom setter.
pub struct Setter<'a> {
    pub(crate) tree: &'a mut Tree,
    pub(crate) id: OptionId,
    pub(crate) bubble: bool,
}

impl Setter<'_> {
    pub fn id(&self) -> OptionId {
        self.id
    }

    pub fn tree(&self) -> &Tree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        self.tree
    }

    /// Validate and store through the default setter.
    pub fn set(&mut self, value: Value) -> Result<()> {
        self.tree.store_value(self.id, value, self.bubble)
    }
}
