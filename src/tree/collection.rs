//! Collection containers: array- and object-keyed items of one proto type.
//!
//! Array items are named by their index. Removing, inserting, swapping or
//! sorting renames items in place so that outstanding handles stay valid.

use super::model::{not_a_collection, PendingLink, Tree};
use super::node::{Container, OptionId};
use crate::error::{OptreeError, Result};
use crate::link::Link;
use crate::types::{Kind, OptionType};
use crate::value::{matches_partial, values_equal, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::rc::Rc;

impl Tree {
    // =========================================================================
    // Guards and raw container access
    // =========================================================================

    fn collection_type(&self, id: OptionId, kind: Kind) -> Result<Rc<OptionType>> {
        let ty = self.option_type(id)?;
        if ty.kind() != kind {
            return Err(OptreeError::AccessError(format!(
                "option {} is not of type '{}'",
                ty, kind
            )));
        }
        Ok(ty)
    }

    /// Collection type of `id`, checked for kind and writability.
    fn writable_collection(&self, id: OptionId, kind: Kind) -> Result<Rc<OptionType>> {
        let ty = self.collection_type(id, kind)?;
        if !ty.is_writable() {
            return Err(OptreeError::AccessError(format!(
                "option {} is not writable",
                ty
            )));
        }
        Ok(ty)
    }

    fn proto_of(ty: &Rc<OptionType>) -> Result<Rc<OptionType>> {
        ty.proto().cloned().ok_or_else(|| not_a_collection(ty))
    }

    pub(crate) fn array_items(&self, id: OptionId) -> Result<Vec<OptionId>> {
        match &self.node(id)?.container {
            Some(Container::Array(items)) => Ok(items.clone()),
            _ => Err(OptreeError::AccessError(format!(
                "option {} is not of type 'arrayCollection'",
                self.node(id)?.ty
            ))),
        }
    }

    /// Detach-free removal of the last item from the container.
    pub(crate) fn array_pop_raw(&mut self, id: OptionId) -> Result<Option<OptionId>> {
        match self.node_mut(id)?.container.as_mut() {
            Some(Container::Array(items)) => Ok(items.pop()),
            _ => Ok(None),
        }
    }

    /// Object-collection items in iteration order: descending `priority` for
    /// map protos (ties keep insertion order), insertion order otherwise.
    pub(crate) fn ordered_items(&self, id: OptionId) -> Result<Vec<(String, OptionId)>> {
        let node = self.node(id)?;
        let Some(Container::Object { items, .. }) = &node.container else {
            return Err(OptreeError::AccessError(format!(
                "option {} is not of type 'objectCollection'",
                node.ty
            )));
        };
        let mut items = items.clone();
        if node.ty.orders_by_priority() {
            let mut keyed = Vec::with_capacity(items.len());
            for (key, item) in items {
                let priority = match self.child(item, "priority")? {
                    Some(p) => self.value(p)?.as_f64().unwrap_or(0.0),
                    None => 0.0,
                };
                keyed.push((priority, key, item));
            }
            keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
            items = keyed.into_iter().map(|(_, k, i)| (k, i)).collect();
        }
        Ok(items)
    }

    /// Rename an item and re-point the links it inherited from the
    /// collection at its new name.
    fn rename_item(&mut self, collection: OptionId, item: OptionId, name: &str) -> Result<()> {
        let old_name = self.node(item)?.name.clone();
        self.rename(item, name)?;
        self.mark_subtree_stale(item)?;
        let links: Vec<Link> = self.node(collection)?.links.to_vec();
        for link in links {
            self.retarget_inherited(item, &link.for_child(&old_name), &link.for_child(name))?;
        }
        Ok(())
    }

    fn retarget_inherited(&mut self, id: OptionId, old: &Link, new: &Link) -> Result<()> {
        if !self.node_mut(id)?.links.remove(&old.value) {
            return Ok(());
        }
        self.graph.remove_edge(id, &old.value);
        self.node_mut(id)?.links.insert(new.clone());
        self.stale_links.push(id);
        for (name, child) in self.children(id)? {
            self.retarget_inherited(child, &old.for_child(&name), &new.for_child(&name))?;
        }
        Ok(())
    }

    /// Three-way rename through a temporary index past the end.
    fn swap_raw(&mut self, id: OptionId, i: usize, j: usize) -> Result<()> {
        let items = self.array_items(id)?;
        let temp = items.len().to_string();
        let (a, b) = (items[i], items[j]);
        self.rename_item(id, a, &temp)?;
        self.rename_item(id, b, &i.to_string())?;
        self.rename_item(id, a, &j.to_string())?;
        if let Some(Container::Array(items)) = self.node_mut(id)?.container.as_mut() {
            items.swap(i, j);
        }
        Ok(())
    }

    fn remove_raw(&mut self, id: OptionId, index: usize) -> Result<Value> {
        let items = self.array_items(id)?;
        let Some(&removed) = items.get(index) else {
            return Err(self.missing_item(id, &index.to_string()));
        };
        let value = self.value(removed)?;
        if let Some(Container::Array(stored)) = self.node_mut(id)?.container.as_mut() {
            stored.remove(index);
        }
        self.detach(removed);
        for (position, item) in items.iter().enumerate().skip(index + 1) {
            self.rename_item(id, *item, &(position - 1).to_string())?;
        }
        Ok(value)
    }

    fn missing_item(&self, id: OptionId, key: &str) -> OptreeError {
        OptreeError::AccessError(format!(
            "option \"{}\" has no item '{}'",
            self.full_name(id).unwrap_or_default(),
            key
        ))
    }

    /// Run a structural change and notify watchers of the collection once.
    ///
    /// A change that fails leaves the collection as it found it.
    fn mutate<T>(
        &mut self,
        id: OptionId,
        change: impl FnOnce(&mut Tree, &mut Vec<PendingLink>) -> Result<T>,
    ) -> Result<T> {
        let old = self.value(id)?;
        let saved = self.node(id)?.container.clone();
        let names = match &saved {
            Some(container) => container
                .all_children()
                .into_iter()
                .map(|child| Ok((child, self.node(child)?.name.clone())))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let explicit = self.node_mut(id)?.value.take();

        let mut pending = Vec::new();
        let out = match change(self, &mut pending)
            .and_then(|out| self.attach_pending(pending).map(|()| out))
        {
            Ok(out) => out,
            Err(err) => {
                self.roll_back(id, saved, names, explicit)?;
                return Err(err);
            }
        };

        let new = self.value(id)?;
        if !values_equal(&new, &old) {
            self.dispatch(id, new, old, true)?;
        }
        Ok(out)
    }

    /// Detach items created by a failed change and restore item names, order
    /// and the explicit value.
    fn roll_back(
        &mut self,
        id: OptionId,
        mut saved: Option<Container>,
        names: Vec<(OptionId, String)>,
        explicit: Option<Value>,
    ) -> Result<()> {
        let known: HashSet<OptionId> = names.iter().map(|(child, _)| *child).collect();
        let current = self
            .node(id)?
            .container
            .as_ref()
            .map(Container::all_children)
            .unwrap_or_default();
        for child in current {
            if !known.contains(&child) {
                self.detach(child);
            }
        }
        for (child, name) in names {
            if self.is_attached(child) && self.node(child)?.name != name {
                self.rename_item(id, child, &name)?;
            }
        }
        if let Some(container) = saved.as_mut() {
            container.retain(|child| self.is_attached(child));
        }
        let node = self.node_mut(id)?;
        node.container = saved;
        node.value = explicit;
        self.refresh_links();
        Ok(())
    }

    // =========================================================================
    // Array collections
    // =========================================================================

    /// Append an item. The value becomes the item's default.
    pub fn push(&mut self, id: OptionId, value: Value) -> Result<OptionId> {
        let proto = Self::proto_of(&self.writable_collection(id, Kind::ArrayCollection)?)?;
        proto.validate_value(&value)?;
        self.mutate(id, |tree, pending| {
            tree.create_item(id, None, Some(&value), pending)
        })
    }

    /// Insert an item at `index`, renumbering the items after it.
    pub fn insert(&mut self, id: OptionId, index: usize, value: Value) -> Result<OptionId> {
        let proto = Self::proto_of(&self.writable_collection(id, Kind::ArrayCollection)?)?;
        let items = self.array_items(id)?;
        if index > items.len() {
            return Err(OptreeError::StructuralError(format!(
                "cannot insert at index {} of option \"{}\" with {} items",
                index,
                self.full_name(id)?,
                items.len()
            )));
        }
        proto.validate_value(&value)?;
        self.mutate(id, |tree, pending| {
            for position in (index..items.len()).rev() {
                tree.rename_item(id, items[position], &(position + 1).to_string())?;
            }
            let item = tree.create_item(id, Some(&index.to_string()), Some(&value), pending)?;
            if let Some(Container::Array(stored)) = tree.node_mut(id)?.container.as_mut() {
                if let Some(last) = stored.pop() {
                    stored.insert(index, last);
                }
            }
            Ok(item)
        })
    }

    /// Prepend an item.
    pub fn unshift(&mut self, id: OptionId, value: Value) -> Result<OptionId> {
        self.insert(id, 0, value)
    }

    /// Remove the item at `index`. Later items move down one index and keep
    /// their identity.
    pub fn remove(&mut self, id: OptionId, index: usize) -> Result<Value> {
        self.writable_collection(id, Kind::ArrayCollection)?;
        if index >= self.array_items(id)?.len() {
            return Err(self.missing_item(id, &index.to_string()));
        }
        self.mutate(id, |tree, _| tree.remove_raw(id, index))
    }

    /// Remove up to `count` items starting at `start`.
    pub fn remove_range(&mut self, id: OptionId, start: usize, count: usize) -> Result<Vec<Value>> {
        self.writable_collection(id, Kind::ArrayCollection)?;
        let len = self.array_items(id)?.len();
        if start >= len || count == 0 {
            return Ok(Vec::new());
        }
        let count = count.min(len - start);
        self.mutate(id, |tree, _| {
            (0..count)
                .map(|_| tree.remove_raw(id, start))
                .collect::<Result<Vec<_>>>()
        })
    }

    /// Remove and return the last item's value.
    pub fn pop(&mut self, id: OptionId) -> Result<Option<Value>> {
        self.writable_collection(id, Kind::ArrayCollection)?;
        match self.array_items(id)?.len() {
            0 => Ok(None),
            len => self.remove(id, len - 1).map(Some),
        }
    }

    /// Remove and return the first item's value.
    pub fn shift(&mut self, id: OptionId) -> Result<Option<Value>> {
        self.writable_collection(id, Kind::ArrayCollection)?;
        if self.array_items(id)?.is_empty() {
            return Ok(None);
        }
        self.remove(id, 0).map(Some)
    }

    /// Exchange two items by renaming them.
    pub fn swap(&mut self, id: OptionId, i: usize, j: usize) -> Result<()> {
        self.writable_collection(id, Kind::ArrayCollection)?;
        let len = self.array_items(id)?.len();
        for index in [i, j] {
            if index >= len {
                return Err(self.missing_item(id, &index.to_string()));
            }
        }
        if i == j {
            return Ok(());
        }
        self.mutate(id, |tree, _| tree.swap_raw(id, i, j))
    }

    /// Stable sort of the items by value, carried out as a series of swaps.
    pub fn sort_by<F>(&mut self, id: OptionId, mut compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.writable_collection(id, Kind::ArrayCollection)?;
        let values = self
            .array_items(id)?
            .into_iter()
            .map(|item| self.value(item))
            .collect::<Result<Vec<_>>>()?;
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|a, b| compare(&values[*a], &values[*b]));

        self.mutate(id, |tree, _| {
            let mut current: Vec<usize> = (0..order.len()).collect();
            for (position, wanted) in order.iter().enumerate() {
                let at = current
                    .iter()
                    .position(|c| c == wanted)
                    .unwrap_or(position);
                if at != position {
                    tree.swap_raw(id, position, at)?;
                    current.swap(position, at);
                }
            }
            Ok(())
        })
    }

    /// Reverse the item order, carried out as a series of swaps.
    pub fn reverse(&mut self, id: OptionId) -> Result<()> {
        self.writable_collection(id, Kind::ArrayCollection)?;
        let len = self.array_items(id)?.len();
        self.mutate(id, |tree, _| {
            for i in 0..len / 2 {
                tree.swap_raw(id, i, len - 1 - i)?;
            }
            Ok(())
        })
    }

    /// Index of the first item equal to `value`.
    pub fn index_of(&self, id: OptionId, value: &Value) -> Result<Option<usize>> {
        for (index, item) in self.array_items(id)?.into_iter().enumerate() {
            if values_equal(&self.value(item)?, value) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Index of the last item equal to `value`.
    pub fn last_index_of(&self, id: OptionId, value: &Value) -> Result<Option<usize>> {
        let mut found = None;
        for (index, item) in self.array_items(id)?.into_iter().enumerate() {
            if values_equal(&self.value(item)?, value) {
                found = Some(index);
            }
        }
        Ok(found)
    }

    /// Values of the items in `start..end` (clamped to the length).
    pub fn slice(&self, id: OptionId, start: usize, end: usize) -> Result<Vec<Value>> {
        let items = self.array_items(id)?;
        let end = end.min(items.len());
        if start >= end {
            return Ok(Vec::new());
        }
        items[start..end]
            .iter()
            .map(|item| self.value(*item))
            .collect()
    }

    // =========================================================================
    // Object collections
    // =========================================================================

    /// Add an item under a new key. The value becomes the item's default.
    ///
    /// # Returns
    ///
    /// * `Ok(OptionId)` - The new item
    /// * `Err(OptreeError::StructuralError)` - Key is taken or reserved (`options`)
    /// * `Err(OptreeError::ValueValidationError)` - Value rejected by the proto
    pub fn add(&mut self, id: OptionId, key: &str, value: Value) -> Result<OptionId> {
        let proto = Self::proto_of(&self.writable_collection(id, Kind::ObjectCollection)?)?;
        if key == "options" {
            return Err(OptreeError::StructuralError(format!(
                "'options' is a reserved key of option \"{}\"",
                self.full_name(id)?
            )));
        }
        if key.is_empty() || self.child(id, key)?.is_some() {
            return Err(OptreeError::StructuralError(format!(
                "option \"{}\" already has an item '{}'",
                self.full_name(id)?,
                key
            )));
        }
        proto.validate_value(&value)?;
        self.mutate(id, |tree, pending| {
            tree.create_item(id, Some(key), Some(&value), pending)
        })
    }

    /// Remove the item under `key`.
    pub fn remove_key(&mut self, id: OptionId, key: &str) -> Result<Value> {
        self.writable_collection(id, Kind::ObjectCollection)?;
        let item = match self.child(id, key)? {
            Some(item) if key != "options" => item,
            _ => return Err(self.missing_item(id, key)),
        };
        self.mutate(id, |tree, _| {
            let value = tree.value(item)?;
            if let Some(Container::Object { items, .. }) = tree.node_mut(id)?.container.as_mut() {
                items.retain(|(k, _)| k != key);
            }
            tree.detach(item);
            Ok(value)
        })
    }

    /// Item keys in iteration order.
    pub fn keys(&self, id: OptionId) -> Result<Vec<String>> {
        Ok(self.items(id)?.into_iter().map(|(k, _)| k).collect())
    }

    /// The permanent settings map of an object collection.
    pub fn options_map(&self, id: OptionId) -> Result<OptionId> {
        match &self.node(id)?.container {
            Some(Container::Object { options, .. }) => Ok(*options),
            _ => Err(OptreeError::AccessError(format!(
                "option {} is not of type 'objectCollection'",
                self.node(id)?.ty
            ))),
        }
    }

    // =========================================================================
    // Both flavors
    // =========================================================================

    /// Items in iteration order with their keys.
    pub fn items(&self, id: OptionId) -> Result<Vec<(String, OptionId)>> {
        match self.kind(id)? {
            Kind::ArrayCollection | Kind::ObjectCollection => self.children(id),
            _ => Err(not_a_collection(&self.node(id)?.ty)),
        }
    }

    pub fn len(&self, id: OptionId) -> Result<usize> {
        Ok(self.items(id)?.len())
    }

    /// Item under `key` (an index for array collections).
    pub fn item(&self, id: OptionId, key: &str) -> Result<Option<OptionId>> {
        self.items(id)?;
        if key == "options" {
            return Ok(None);
        }
        self.child(id, key)
    }

    pub fn get_item(&self, id: OptionId, key: &str) -> Result<Option<Value>> {
        match self.item(id, key)? {
            Some(item) => self.value(item).map(Some),
            None => Ok(None),
        }
    }

    /// Write the item under `key`, creating it when missing.
    ///
    /// Array collections pad with default items up to the index. The value
    /// is stored as the item's explicit value.
    pub fn set_item(&mut self, id: OptionId, key: &str, value: Value) -> Result<()> {
        if let Some(item) = self.item(id, key)? {
            return self.set_value(item, value);
        }
        let ty = self.option_type(id)?;
        let proto = Self::proto_of(&self.writable_collection(id, ty.kind())?)?;
        proto.validate_value(&value)?;

        match ty.kind() {
            Kind::ArrayCollection => {
                let index: usize = key.parse().map_err(|_| self.missing_item(id, key))?;
                self.mutate(id, |tree, pending| {
                    while tree.array_items(id)?.len() < index {
                        tree.create_item(id, None, None, pending)?;
                    }
                    let item = tree.create_item(id, None, None, pending)?;
                    tree.store_value(item, value, false)
                })
            }
            _ => {
                if key == "options" || key.is_empty() {
                    return Err(OptreeError::StructuralError(format!(
                        "'{}' cannot be used as an item key of option \"{}\"",
                        key,
                        self.full_name(id)?
                    )));
                }
                self.mutate(id, |tree, pending| {
                    let item = tree.create_item(id, Some(key), None, pending)?;
                    tree.store_value(item, value, false)
                })
            }
        }
    }

    /// First item (in iteration order) matching `partial`: object items match
    /// when every given member is equal, other values compare deeply.
    pub fn find(&self, id: OptionId, partial: &Value) -> Result<Option<(String, Value)>> {
        for (key, item) in self.items(id)? {
            let value = self.value(item)?;
            if matches_partial(&value, partial) {
                return Ok(Some((key, value)));
            }
        }
        Ok(None)
    }

    /// Items whose value satisfies `predicate`, in iteration order.
    pub fn filter<F>(&self, id: OptionId, predicate: F) -> Result<Vec<(String, Value)>>
    where
        F: Fn(&Value) -> bool,
    {
        let mut matched = Vec::new();
        for (key, item) in self.items(id)? {
            let value = self.value(item)?;
            if predicate(&value) {
                matched.push((key, value));
            }
        }
        Ok(matched)
    }
}
