//! Watcher dispatch: own watchers, ancestor bubbling, dependent forwarding.

use super::hooks::{Target, WatchEvent, WatcherFn};
use super::model::Tree;
use super::node::{Context, OptionId};
use crate::error::Result;
use crate::value::{keyed, Value};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{trace, warn};

impl Tree {
    /// Notify watchers about a change of `id` from `old` to `new`.
    ///
    /// Nested dispatches (watchers that write) are bounded by
    /// `max_dispatch_depth`; deeper ones are dropped with a warning.
    pub(crate) fn dispatch(&mut self, id: OptionId, new: Value, old: Value, bubble: bool) -> Result<()> {
        if self.dispatch_depth >= self.config.max_dispatch_depth {
            warn!(
                option = %self.full_name(id).unwrap_or_default(),
                depth = self.dispatch_depth,
                "dropping change notification beyond the dispatch depth limit"
            );
            return Ok(());
        }
        self.dispatch_depth += 1;
        let mut visited = HashSet::new();
        let result = self.notify(id, id, new, old, bubble, &mut visited);
        self.dispatch_depth -= 1;
        result
    }

    fn notify(
        &mut self,
        origin: OptionId,
        id: OptionId,
        new: Value,
        old: Value,
        bubble: bool,
        visited: &mut HashSet<OptionId>,
    ) -> Result<()> {
        if !visited.insert(id) || !self.is_attached(id) {
            return Ok(());
        }
        trace!(option = %id, origin = %origin, bubble, "dispatching change");

        let mut event = WatchEvent::new(Target::Option(origin), new.clone(), old.clone());
        event.current = Target::Option(id);
        self.run_watchers(id, &mut event)?;

        if bubble && !event.is_propagation_stopped() {
            let chain = self.ancestor_chain(id)?;
            let mut payload_new = new.clone();
            let mut payload_old = old.clone();
            for (ancestor, key) in chain {
                payload_new = keyed(&key, payload_new);
                payload_old = keyed(&key, payload_old);
                event.current = ancestor;
                event.value = payload_new.clone();
                event.old = payload_old.clone();
                event.bubbled = true;
                match ancestor {
                    Target::Option(parent) => self.run_watchers(parent, &mut event)?,
                    Target::Root => self.run_root_watchers(&mut event)?,
                }
                if event.is_propagation_stopped() {
                    break;
                }
            }
        }

        for dependent in self.graph.dependents(id) {
            if self.is_attached(dependent) && self.raw_value(dependent)?.is_none() {
                self.notify(origin, dependent, new.clone(), old.clone(), bubble, visited)?;
            }
        }
        Ok(())
    }

    /// Ancestors of `id`, nearest first, each with the key under which the
    /// previous node sits. Ends with the root.
    fn ancestor_chain(&self, id: OptionId) -> Result<Vec<(Target, String)>> {
        let mut chain = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current)?;
            match node.context {
                Context::Option(parent) => {
                    chain.push((Target::Option(parent), node.name.clone()));
                    current = parent;
                }
                Context::Root => {
                    chain.push((Target::Root, node.name.clone()));
                    break;
                }
            }
        }
        Ok(chain)
    }

    /// Run the type-level watcher, then instance watchers in registration order.
    fn run_watchers(&mut self, id: OptionId, event: &mut WatchEvent) -> Result<()> {
        let node = self.node(id)?;
        let mut callbacks: Vec<WatcherFn> = Vec::new();
        if let Some(type_watcher) = node.ty.watcher() {
            callbacks.push(Rc::clone(type_watcher));
        }
        callbacks.extend(node.watchers.callbacks());

        for callback in callbacks {
            if !self.is_attached(id) {
                break;
            }
            callback(self, event)?;
        }
        Ok(())
    }

    pub(crate) fn run_root_watchers(&mut self, event: &mut WatchEvent) -> Result<()> {
        for callback in self.root_watchers.callbacks() {
            callback(self, event)?;
        }
        Ok(())
    }
}
