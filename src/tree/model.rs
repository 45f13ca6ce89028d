//! The option tree: arena, construction and node bookkeeping.

use super::graph::LinkGraph;
use super::hooks::{WatcherFn, WatcherId};
use super::node::{Container, Context, Node, OptionId, Slot, WatcherList};
use crate::config::Config;
use crate::error::{OptreeError, Result};
use crate::link::{self, Link};
use crate::manager::Schema;
use crate::types::{Kind, KindSpec, OptionType};
use crate::value::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// A link waiting to be attached once the options it may point at exist.
pub(crate) struct PendingLink {
    pub(crate) id: OptionId,
    pub(crate) link: Link,
    /// Links copied down from a composite parent are skipped, not rejected,
    /// when their target does not exist in the schema.
    pub(crate) propagated: bool,
}

/// Live tree of options built from a schema.
///
/// Options live in an arena and are addressed by [`OptionId`]. Composite
/// options own their children; removing an option detaches its subtree.
pub struct Tree {
    pub(crate) config: Config,
    pub(crate) nodes: Vec<Slot>,
    /// Indices of empty slots, reused by new options.
    free: Vec<usize>,
    pub(crate) roots: Vec<(String, OptionId)>,
    pub(crate) root_watchers: WatcherList,
    pub(crate) graph: LinkGraph,
    pub(crate) locked: bool,
    /// Options whose linked default is being computed, innermost last.
    pub(crate) resolving: RefCell<Vec<OptionId>>,
    pub(crate) dispatch_depth: u32,
    /// Options whose link targets may have moved since the last refresh.
    pub(crate) stale_links: Vec<OptionId>,
    next_watcher: u64,
}

impl Tree {
    /// Build the tree for `schema` with default engine settings.
    pub fn new(schema: &Schema) -> Result<Self> {
        Self::with_config(schema, Config::default())
    }

    /// Build the tree for `schema`.
    ///
    /// Every declared link is checked against the schema: its target must
    /// exist and be compatible with the dependent.
    pub fn with_config(schema: &Schema, config: Config) -> Result<Self> {
        config.validate()?;
        let mut tree = Self {
            config,
            nodes: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            root_watchers: WatcherList::default(),
            graph: LinkGraph::default(),
            locked: false,
            resolving: RefCell::new(Vec::new()),
            dispatch_depth: 0,
            stale_links: Vec::new(),
            next_watcher: 0,
        };

        let mut pending = Vec::new();
        for (name, ty) in schema.root() {
            let id = tree.create_option(Context::Root, name, ty, &mut pending)?;
            tree.roots.push((name.clone(), id));
        }
        tree.attach_pending(pending)?;
        tree.check_proto_links()?;
        debug!(options = tree.option_count(), "option tree built");
        Ok(tree)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live options.
    pub fn option_count(&self) -> usize {
        self.nodes.iter().filter(|s| s.node.is_some()).count()
    }

    /// Handles of every live option in arena order.
    pub(crate) fn live_ids(&self) -> Vec<OptionId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.node.is_some())
            .map(|(index, slot)| OptionId {
                index,
                generation: slot.generation,
            })
            .collect()
    }

    /// Root options in schema order.
    pub fn roots(&self) -> &[(String, OptionId)] {
        &self.roots
    }

    pub fn root(&self, name: &str) -> Option<OptionId> {
        self.roots.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
    }

    /// Whether the handle still points at a live option.
    pub fn is_attached(&self, id: OptionId) -> bool {
        self.nodes
            .get(id.index)
            .is_some_and(|slot| slot.generation == id.generation && slot.node.is_some())
    }

    pub(crate) fn node(&self, id: OptionId) -> Result<&Node> {
        self.nodes
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or_else(|| detached(id))
    }

    pub(crate) fn node_mut(&mut self, id: OptionId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| detached(id))
    }

    /// Place a node in a free slot, or a new one.
    fn alloc(&mut self, node: Node) -> OptionId {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.nodes.get_mut(index) {
                slot.node = Some(node);
                return OptionId {
                    index,
                    generation: slot.generation,
                };
            }
        }
        self.nodes.push(Slot {
            generation: 0,
            node: Some(node),
        });
        OptionId {
            index: self.nodes.len() - 1,
            generation: 0,
        }
    }

    pub fn name(&self, id: OptionId) -> Result<&str> {
        Ok(&self.node(id)?.name)
    }

    pub fn context(&self, id: OptionId) -> Result<Context> {
        Ok(self.node(id)?.context)
    }

    pub fn option_type(&self, id: OptionId) -> Result<Rc<OptionType>> {
        Ok(Rc::clone(&self.node(id)?.ty))
    }

    pub fn kind(&self, id: OptionId) -> Result<Kind> {
        Ok(self.node(id)?.ty.kind())
    }

    pub fn is_writable(&self, id: OptionId) -> Result<bool> {
        Ok(self.node(id)?.ty.is_writable())
    }

    /// Dotted path of the option from the root.
    pub fn full_name(&self, id: OptionId) -> Result<String> {
        let mut parts = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current)?;
            parts.push(node.name.as_str());
            match node.context {
                Context::Root => break,
                Context::Option(parent) => current = parent,
            }
        }
        parts.reverse();
        Ok(parts.join("."))
    }

    /// Child of a composite option by name (map member, item key or index,
    /// `options` for an object collection's settings).
    pub fn child(&self, id: OptionId, name: &str) -> Result<Option<OptionId>> {
        Ok(self
            .node(id)?
            .container
            .as_ref()
            .and_then(|c| c.child(name)))
    }

    /// Named children of a composite option; empty for leaves.
    ///
    /// Object collections list their items in iteration order.
    pub fn children(&self, id: OptionId) -> Result<Vec<(String, OptionId)>> {
        let node = self.node(id)?;
        Ok(match &node.container {
            None => Vec::new(),
            Some(Container::Map(children)) => children.clone(),
            Some(Container::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), *item))
                .collect(),
            Some(Container::Object { .. }) => self.ordered_items(id)?,
        })
    }

    pub(crate) fn next_watcher_id(&mut self) -> WatcherId {
        self.next_watcher += 1;
        WatcherId(self.next_watcher)
    }

    /// Register a watcher on the tree root. Root watchers receive every
    /// bubbled change and bulk snapshot writes.
    pub fn watch_root<F>(&mut self, f: F) -> WatcherId
    where
        F: Fn(&mut Tree, &mut super::WatchEvent) -> Result<()> + 'static,
    {
        let id = self.next_watcher_id();
        let watcher: WatcherFn = Rc::new(f);
        self.root_watchers.add(id, watcher);
        id
    }

    pub fn unwatch_root(&mut self, watcher: WatcherId) -> bool {
        self.root_watchers.remove(watcher)
    }

    /// Guard every option of the tree against writes.
    pub fn lock_tree(&mut self) {
        self.locked = true;
    }

    pub fn unlock_tree(&mut self) {
        self.locked = false;
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Create an option (and, for composites, its children) under `context`.
    pub(crate) fn create_option(
        &mut self,
        context: Context,
        name: &str,
        ty: &Rc<OptionType>,
        pending: &mut Vec<PendingLink>,
    ) -> Result<OptionId> {
        let id = self.alloc(Node::new(name, Rc::clone(ty), context));
        for link in ty.links() {
            pending.push(PendingLink {
                id,
                link: link.clone(),
                propagated: false,
            });
        }

        match ty.spec() {
            KindSpec::Map { children } => {
                // Composite children first so their links can address scalar
                // siblings that are created afterwards.
                let mut built: Vec<Option<OptionId>> = vec![None; children.len()];
                for composite_pass in [true, false] {
                    for (index, (child_name, child_ty)) in children.iter().enumerate() {
                        if child_ty.kind().is_composite() == composite_pass {
                            built[index] = Some(self.create_option(
                                Context::Option(id),
                                child_name,
                                child_ty,
                                pending,
                            )?);
                        }
                    }
                }
                let members: Vec<(String, OptionId)> = children
                    .iter()
                    .zip(built)
                    .filter_map(|((child_name, _), child)| child.map(|c| (child_name.clone(), c)))
                    .collect();
                self.node_mut(id)?.container = Some(Container::Map(members));
            }
            KindSpec::ArrayCollection { .. } => {
                self.node_mut(id)?.container = Some(Container::Array(Vec::new()));
            }
            KindSpec::ObjectCollection { options, .. } => {
                let options_id =
                    self.create_option(Context::Option(id), "options", options, pending)?;
                self.node_mut(id)?.container = Some(Container::Object {
                    items: Vec::new(),
                    options: options_id,
                });
            }
            _ => {}
        }

        if ty.kind().is_composite() {
            if let Some(value) = ty.value() {
                self.seed_default(id, value, pending)?;
            }
        }
        Ok(id)
    }

    /// Store `value` as the default of `id` without notifying watchers.
    ///
    /// Composite defaults are distributed to the children by key; link
    /// strings become links of the addressed child.
    pub(crate) fn seed_default(
        &mut self,
        id: OptionId,
        value: &Value,
        pending: &mut Vec<PendingLink>,
    ) -> Result<()> {
        let kind = self.kind(id)?;
        match (kind, value) {
            (Kind::Map, Value::Object(obj)) => {
                for (key, member) in obj {
                    let child = self.require_child(id, key)?;
                    match member.as_str().and_then(link::parse) {
                        Some(parsed) => pending.push(PendingLink {
                            id: child,
                            link: parsed,
                            propagated: false,
                        }),
                        None => self.seed_default(child, member, pending)?,
                    }
                }
            }
            (Kind::ArrayCollection, Value::Array(values)) => {
                let items = self.array_items(id)?;
                for (index, member) in values.iter().enumerate() {
                    match items.get(index) {
                        Some(item) => self.seed_default(*item, member, pending)?,
                        None => {
                            self.create_item(id, None, Some(member), pending)?;
                        }
                    }
                }
            }
            (Kind::ObjectCollection, Value::Object(obj)) => {
                for (key, member) in obj {
                    match self.child(id, key)? {
                        Some(existing) => self.seed_default(existing, member, pending)?,
                        None => {
                            self.create_item(id, Some(key), Some(member), pending)?;
                        }
                    }
                }
            }
            (k, _) if k.is_composite() => {}
            _ => self.node_mut(id)?.value_default = Some(value.clone()),
        }
        Ok(())
    }

    /// Create a collection item and append it to the container.
    ///
    /// Links of the collection option are copied down to the item.
    pub(crate) fn create_item(
        &mut self,
        collection: OptionId,
        key: Option<&str>,
        default: Option<&Value>,
        pending: &mut Vec<PendingLink>,
    ) -> Result<OptionId> {
        let node = self.node(collection)?;
        let proto = node
            .ty
            .proto()
            .cloned()
            .ok_or_else(|| not_a_collection(&node.ty))?;
        let name = match (key, &node.container) {
            (Some(key), _) => key.to_string(),
            (None, Some(Container::Array(items))) => items.len().to_string(),
            (None, _) => {
                return Err(OptreeError::StructuralError(format!(
                    "items of option {} need a key",
                    node.ty
                )));
            }
        };
        let inherited: Vec<Link> = node.links.iter().map(|l| l.for_child(&name)).collect();

        let item = self.create_option(Context::Option(collection), &name, &proto, pending)?;
        if let Some(default) = default {
            if let Err(err) = self.seed_default(item, default, pending) {
                self.detach(item);
                return Err(err);
            }
        }
        for link in inherited {
            pending.push(PendingLink {
                id: item,
                link,
                propagated: true,
            });
        }

        match self.node_mut(collection)?.container.as_mut() {
            Some(Container::Array(items)) => items.push(item),
            Some(Container::Object { items, .. }) => items.push((name, item)),
            _ => {}
        }
        Ok(item)
    }

    pub(crate) fn require_child(&self, id: OptionId, name: &str) -> Result<OptionId> {
        match self.child(id, name)? {
            Some(child) => Ok(child),
            None => {
                let ty = &self.node(id)?.ty;
                if ty.kind() == Kind::Map {
                    Err(ty.unknown_key(name))
                } else {
                    Err(OptreeError::AccessError(format!(
                        "option {} has no member '{}'",
                        ty, name
                    )))
                }
            }
        }
    }

    /// Remove an option and everything below it from the arena.
    ///
    /// Freed slots are recycled. Options that linked into the removed subtree
    /// are queued for the next link refresh.
    pub(crate) fn detach(&mut self, id: OptionId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self
                .nodes
                .get_mut(current.index)
                .filter(|slot| slot.generation == current.generation)
            else {
                continue;
            };
            let Some(node) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            if let Some(container) = &node.container {
                stack.extend(container.all_children());
            }
            let dependents = self.graph.forget(current);
            self.stale_links.extend(dependents);
        }
    }

    /// Rename in place; the handle stays valid.
    pub(crate) fn rename(&mut self, id: OptionId, name: &str) -> Result<()> {
        self.node_mut(id)?.name = name.to_string();
        Ok(())
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("roots", &self.roots)
            .field("options", &self.option_count())
            .field("locked", &self.locked)
            .finish()
    }
}

pub(crate) fn detached(id: OptionId) -> OptreeError {
    OptreeError::StructuralError(format!("option {} has been removed from its context", id))
}

pub(crate) fn not_a_collection(ty: &OptionType) -> OptreeError {
    OptreeError::AccessError(format!("option {} is not a collection", ty))
}
