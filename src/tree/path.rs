//! Path-addressed surface of the tree: `a.b[2].c` lookups, watchers and
//! bulk snapshots.

use super::capability::Watchable;
use super::hooks::{Target, WatchEvent, WatcherFn, WatcherId};
use super::model::Tree;
use super::node::OptionId;
use crate::error::{OptreeError, Result};
use crate::value::{values_equal, Object, Value};
use regex::Regex;
use std::rc::Rc;
use std::sync::LazyLock;

static SEGMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^.\[\]]*)((?:\[\d+\])*)$").expect("segment pattern is valid")
});

static INDEX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("index pattern is valid"));

/// Split a path into segments. `a.b[2].c` and `a.b.2.c` are equivalent.
pub fn parse_path(path: &str) -> Result<Vec<String>> {
    let invalid = || OptreeError::AccessError(format!("invalid option path '{}'", path));
    if path.is_empty() {
        return Err(invalid());
    }
    let mut segments = Vec::new();
    for part in path.split('.') {
        let caps = SEGMENT_PATTERN.captures(part).ok_or_else(invalid)?;
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let indices = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        if name.is_empty() && (indices.is_empty() || segments.is_empty()) {
            return Err(invalid());
        }
        if !name.is_empty() {
            segments.push(name.to_string());
        }
        for index in INDEX_PATTERN.captures_iter(indices) {
            segments.push(index[1].to_string());
        }
    }
    Ok(segments)
}

impl Tree {
    /// Option at `path`.
    pub fn option(&self, path: &str) -> Result<OptionId> {
        self.lookup(path)?
            .ok_or_else(|| OptreeError::AccessError(format!("unknown option '{}'", path)))
    }

    fn lookup(&self, path: &str) -> Result<Option<OptionId>> {
        let segments = parse_path(path)?;
        let mut iter = segments.iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let mut current = self.root(first);
        for segment in iter {
            current = match current {
                Some(id) => self.child(id, segment)?,
                None => return Ok(None),
            };
        }
        Ok(current)
    }

    /// Whether an option exists at `path`.
    pub fn has(&self, path: &str) -> bool {
        matches!(self.lookup(path), Ok(Some(_)))
    }

    /// Value at `path`.
    pub fn get(&self, path: &str) -> Result<Value> {
        self.value(self.option(path)?)
    }

    /// Write the option at `path`.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let id = self.option(path)?;
        self.set_value(id, value)
    }

    /// Register a watcher on the option at `path`.
    pub fn watch<F>(&mut self, path: &str, f: F) -> Result<WatcherId>
    where
        F: Fn(&mut Tree, &mut WatchEvent) -> Result<()> + 'static,
    {
        let id = self.option(path)?;
        let watcher: WatcherFn = Rc::new(f);
        self.add_watcher(id, watcher)
    }

    /// Remove a watcher from the option at `path`.
    pub fn unwatch(&mut self, path: &str, watcher: WatcherId) -> Result<bool> {
        let id = self.option(path)?;
        self.remove_watcher(id, watcher)
    }

    /// Values of every root option.
    pub fn snapshot(&self) -> Result<Value> {
        let mut obj = Object::new();
        for (name, id) in &self.roots {
            obj.insert(name.clone(), self.value(*id)?);
        }
        Ok(Value::Object(obj))
    }

    /// Only explicitly stored data; unset options are left out.
    pub fn explicit_values(&self) -> Result<Value> {
        let mut obj = Object::new();
        for (name, id) in &self.roots {
            if let Some(value) = self.raw_value(*id)? {
                obj.insert(name.clone(), value);
            }
        }
        Ok(Value::Object(obj))
    }

    /// Bulk write of root options.
    ///
    /// Every key must name a root option. Options are written without
    /// bubbling; root watchers then run once with the whole snapshot.
    pub fn set_snapshot(&mut self, snapshot: Value) -> Result<()> {
        let Value::Object(members) = snapshot else {
            return Err(OptreeError::ValueValidationError(format!(
                "snapshot must be an object, got {}",
                snapshot
            )));
        };
        let mut writes = Vec::with_capacity(members.len());
        for (name, value) in members {
            let id = self
                .root(&name)
                .ok_or_else(|| OptreeError::AccessError(format!("unknown option '{}'", name)))?;
            writes.push((id, value));
        }

        let old = self.snapshot()?;
        for (id, value) in writes {
            self.set_value_with(id, value, false)?;
        }
        let new = self.snapshot()?;
        if !values_equal(&new, &old) {
            let mut event = WatchEvent::new(Target::Root, new, old);
            self.run_root_watchers(&mut event)?;
        }
        Ok(())
    }
}
