//! Option state machine: reads, writes, defaults and resets.

use super::capability::Lockable;
use super::hooks::{Getter, Setter};
use super::model::{PendingLink, Tree};
use super::node::{Container, OptionId};
use crate::config::LockedWritePolicy;
use crate::error::{OptreeError, Result};
use crate::link;
use crate::types::Kind;
use crate::value::{values_equal, Object, Value};
use std::rc::Rc;
use tracing::warn;

impl Tree {
    // =========================================================================
    // Reads
    // =========================================================================

    /// Current value: the custom getter if the type has one, else the
    /// default getter.
    pub fn value(&self, id: OptionId) -> Result<Value> {
        match self.node(id)?.ty.getter().cloned() {
            Some(getter) => getter(&Getter { tree: self, id }),
            None => self.default_value_of(id),
        }
    }

    /// Default getter: the explicit value, else the computed default.
    /// Composite options assemble their children's values.
    pub(crate) fn default_value_of(&self, id: OptionId) -> Result<Value> {
        let node = self.node(id)?;
        if node.is_null() {
            return Ok(Value::Null);
        }
        match &node.container {
            None => match &node.value {
                Some(value) => Ok(value.clone()),
                None => self.value_default(id),
            },
            Some(_) => self.assemble(id, |tree, child| tree.value(child)),
        }
    }

    /// Default value: the stored default, else the linked value, else the
    /// type's generated empty value.
    pub fn value_default(&self, id: OptionId) -> Result<Value> {
        let node = self.node(id)?;
        if node.container.is_some() {
            return self.assemble(id, |tree, child| tree.value_default(child));
        }
        if let Some(value) = &node.value_default {
            return Ok(value.clone());
        }
        if !node.links.is_empty() {
            if let Some(value) = self.linked_value(id)? {
                return Ok(value);
            }
        }
        let ty = &node.ty;
        Ok(ty.generate_value(&ty.empty_value()))
    }

    /// Build a composite value from its children.
    fn assemble(
        &self,
        id: OptionId,
        read: impl Fn(&Tree, OptionId) -> Result<Value>,
    ) -> Result<Value> {
        let node = self.node(id)?;
        match &node.container {
            Some(Container::Map(children)) => {
                let mut obj = Object::new();
                for (name, child) in children {
                    obj.insert(name.clone(), read(self, *child)?);
                }
                Ok(Value::Object(obj))
            }
            Some(Container::Array(items)) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| read(self, *item))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Some(Container::Object { options, .. }) => {
                let mut obj = Object::new();
                for (key, item) in self.ordered_items(id)? {
                    obj.insert(key, read(self, item)?);
                }
                if !self.node(*options)?.ty.children().is_empty() {
                    obj.insert("options".to_string(), read(self, *options)?);
                }
                Ok(Value::Object(obj))
            }
            None => read(self, id),
        }
    }

    /// Explicitly stored value, `None` while the option is unset.
    ///
    /// Composite options report the explicit values of their members, and
    /// collections with items always count as set.
    pub fn raw_value(&self, id: OptionId) -> Result<Option<Value>> {
        let node = self.node(id)?;
        if node.is_null() {
            return Ok(Some(Value::Null));
        }
        match &node.container {
            None => Ok(node.value.clone()),
            Some(Container::Map(children)) => {
                let mut obj = Object::new();
                for (name, child) in children {
                    if let Some(value) = self.raw_value(*child)? {
                        obj.insert(name.clone(), value);
                    }
                }
                Ok((!obj.is_empty()).then_some(Value::Object(obj)))
            }
            Some(Container::Array(items)) if items.is_empty() => Ok(None),
            Some(Container::Object { items, options }) if items.is_empty() => {
                Ok(self.raw_value(*options)?.map(|o| {
                    let mut obj = Object::new();
                    obj.insert("options".to_string(), o);
                    Value::Object(obj)
                }))
            }
            Some(_) => self.value(id).map(Some),
        }
    }

    /// Explicitly stored default, `None` when the default is computed.
    pub fn raw_value_default(&self, id: OptionId) -> Result<Option<Value>> {
        let node = self.node(id)?;
        match &node.container {
            None => Ok(node.value_default.clone()),
            Some(_) => self.value_default(id).map(Some),
        }
    }

    /// Whether the current value is null.
    pub fn is_empty(&self, id: OptionId) -> Result<bool> {
        Ok(self.value(id)?.is_null())
    }

    /// Whether the current value passes the option's type.
    pub fn is_valid(&self, id: OptionId) -> Result<bool> {
        let value = self.value(id)?;
        Ok(self.node(id)?.ty.validate_value(&value).is_ok())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Write a value and bubble the change to ancestors.
    pub fn set_value(&mut self, id: OptionId, value: Value) -> Result<()> {
        self.set_value_with(id, value, true)
    }

    /// Write a value.
    ///
    /// # Arguments
    ///
    /// * `id` - Option to write
    /// * `value` - New value; validated against the option type
    /// * `bubble` - Whether ancestors are notified
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Stored, or ignored because the option is locked
    /// * `Err(OptreeError::AccessError)` - Option is not writable
    /// * `Err(OptreeError::ValueValidationError)` - Value rejected by the type
    pub fn set_value_with(&mut self, id: OptionId, value: Value, bubble: bool) -> Result<()> {
        let ty = Rc::clone(&self.node(id)?.ty);
        if !ty.is_writable() {
            return Err(OptreeError::AccessError(format!(
                "option {} is not writable",
                ty
            )));
        }
        if self.is_locked(id)? {
            return self.locked_write(id);
        }
        match ty.setter().cloned() {
            Some(setter) => {
                let mut ctx = Setter {
                    tree: self,
                    id,
                    bubble,
                };
                setter(&mut ctx, value)
            }
            None => self.store_value(id, value, bubble),
        }
    }

    fn locked_write(&self, id: OptionId) -> Result<()> {
        let name = self.full_name(id)?;
        match self.config.locked_writes {
            LockedWritePolicy::Warn => {
                warn!(option = %name, "ignoring write to a locked option");
                Ok(())
            }
            LockedWritePolicy::Ignore => Ok(()),
            LockedWritePolicy::Reject => Err(OptreeError::AccessError(format!(
                "option \"{}\" is locked",
                name
            ))),
        }
    }

    /// Default setter: validate, store and notify when the value changed.
    pub(crate) fn store_value(&mut self, id: OptionId, value: Value, bubble: bool) -> Result<()> {
        let ty = Rc::clone(&self.node(id)?.ty);
        ty.validate_value(&value)?;
        let old = self.value(id)?;

        match ty.kind() {
            Kind::Map => self.store_map(id, value)?,
            Kind::ArrayCollection => self.store_array(id, value)?,
            Kind::ObjectCollection => self.store_object(id, value)?,
            _ => self.node_mut(id)?.value = Some(value),
        }

        let new = self.value(id)?;
        if !values_equal(&new, &old) {
            self.dispatch(id, new, old, bubble)?;
        }
        Ok(())
    }

    /// Members are written without bubbling; link strings replace the
    /// member's explicit value with a link, copied down to its own members
    /// when the member is a map.
    fn store_map(&mut self, id: OptionId, value: Value) -> Result<()> {
        let Value::Object(members) = value else {
            self.node_mut(id)?.value = Some(Value::Null);
            return Ok(());
        };
        self.node_mut(id)?.value = None;

        let mut writes = Vec::new();
        for (key, member) in members {
            let child = self.require_child(id, &key)?;
            let link = member.as_str().and_then(link::parse);
            if link.is_none() && !self.is_writable(child)? {
                return Err(OptreeError::AccessError(format!(
                    "option \"{}\" is not writable",
                    self.full_name(child)?
                )));
            }
            writes.push((child, member, link));
        }

        let mut pending = Vec::new();
        for (child, member, link) in writes {
            match link {
                Some(link) => {
                    self.clear_explicit(child)?;
                    pending.push(PendingLink {
                        id: child,
                        link,
                        propagated: false,
                    });
                }
                None => self.set_value_with(child, member, false)?,
            }
        }
        self.attach_pending(pending)
    }

    fn store_array(&mut self, id: OptionId, value: Value) -> Result<()> {
        let Value::Array(values) = value else {
            self.node_mut(id)?.value = Some(Value::Null);
            return Ok(());
        };
        self.node_mut(id)?.value = None;

        let target_len = values.len();
        let mut pending = Vec::new();
        for (index, member) in values.into_iter().enumerate() {
            let item = match self.array_items(id)?.get(index).copied() {
                Some(existing) => existing,
                None => self.create_item(id, None, None, &mut pending)?,
            };
            self.store_value(item, member, false)?;
        }
        while self.array_items(id)?.len() > target_len {
            if let Some(last) = self.array_pop_raw(id)? {
                self.detach(last);
            }
        }
        self.attach_pending(pending)?;
        Ok(())
    }

    fn store_object(&mut self, id: OptionId, value: Value) -> Result<()> {
        let Value::Object(members) = value else {
            self.node_mut(id)?.value = Some(Value::Null);
            return Ok(());
        };
        self.node_mut(id)?.value = None;

        let mut pending = Vec::new();
        let mut keep: Vec<String> = Vec::new();
        for (key, member) in members {
            if key == "options" {
                let options = self.require_child(id, "options")?;
                self.set_value_with(options, member, false)?;
                continue;
            }
            let item = match self.child(id, &key)? {
                Some(existing) => existing,
                None => self.create_item(id, Some(&key), None, &mut pending)?,
            };
            self.store_value(item, member, false)?;
            keep.push(key);
        }

        let stale: Vec<OptionId> = match &self.node(id)?.container {
            Some(Container::Object { items, .. }) => items
                .iter()
                .filter(|(k, _)| !keep.contains(k))
                .map(|(_, item)| *item)
                .collect(),
            _ => Vec::new(),
        };
        if let Some(Container::Object { items, .. }) = self.node_mut(id)?.container.as_mut() {
            items.retain(|(k, _)| keep.contains(k));
        }
        for item in stale {
            self.detach(item);
        }
        self.attach_pending(pending)?;
        Ok(())
    }

    /// Drop the explicit value (and those of all members) so reads fall back
    /// to the default chain again.
    pub fn reset_value(&mut self, id: OptionId) -> Result<()> {
        let ty = Rc::clone(&self.node(id)?.ty);
        if !ty.is_writable() {
            return Err(OptreeError::AccessError(format!(
                "option {} is not writable",
                ty
            )));
        }
        if self.is_locked(id)? {
            return self.locked_write(id);
        }
        let old = self.value(id)?;
        self.clear_explicit(id)?;
        let new = self.value(id)?;
        if !values_equal(&new, &old) {
            self.dispatch(id, new, old, true)?;
        }
        Ok(())
    }

    fn clear_explicit(&mut self, id: OptionId) -> Result<()> {
        let node = self.node_mut(id)?;
        node.value = None;
        let children = node
            .container
            .as_ref()
            .map(|c| c.all_children())
            .unwrap_or_default();
        for child in children {
            self.clear_explicit(child)?;
        }
        Ok(())
    }

    /// Replace the stored default.
    ///
    /// Composite defaults are distributed to the members; link strings in a
    /// map default become links of the member.
    pub fn set_value_default(&mut self, id: OptionId, value: Value) -> Result<()> {
        let ty = Rc::clone(&self.node(id)?.ty);
        ty.validate_value(&value)?;
        let old = self.value(id)?;

        let mut pending = Vec::new();
        self.seed_default(id, &value, &mut pending)?;
        self.attach_pending(pending)?;

        let new = self.value(id)?;
        if !values_equal(&new, &old) {
            self.dispatch(id, new, old, true)?;
        }
        Ok(())
    }
}
