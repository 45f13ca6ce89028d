//! Capability traits of the option tree.
//!
//! Each trait covers one concern of an option (write guarding, change
//! watching, default links) and is implemented by [`Tree`] over option handles.

use super::hooks::{WatchEvent, WatcherFn, WatcherId};
use super::model::Tree;
use super::node::OptionId;
use crate::error::Result;
use crate::link::Link;

/// Write guarding.
pub trait Lockable {
    fn lock(&mut self, id: OptionId) -> Result<()>;
    fn unlock(&mut self, id: OptionId) -> Result<()>;
    /// True if the option, any ancestor, or the whole tree is locked.
    fn is_locked(&self, id: OptionId) -> Result<bool>;
}

/// Change watching.
pub trait Watchable {
    fn add_watcher(&mut self, id: OptionId, watcher: WatcherFn) -> Result<WatcherId>;
    fn remove_watcher(&mut self, id: OptionId, watcher: WatcherId) -> Result<bool>;
    /// Number of instance watchers (the type-level watcher is not counted).
    fn watcher_count(&self, id: OptionId) -> Result<usize>;
}

/// Default-value links.
pub trait Linkable {
    /// Parse, check and attach a link; composite options copy it down to
    /// their children.
    fn add_link(&mut self, id: OptionId, link: &str) -> Result<()>;
    fn remove_link(&mut self, id: OptionId, link: &str) -> Result<bool>;
    /// Links of the option, highest priority first.
    fn links(&self, id: OptionId) -> Result<Vec<Link>>;
    fn has_link(&self, id: OptionId, link: &str) -> Result<bool>;
    /// Options whose links currently resolve to `id`.
    fn dependents(&self, id: OptionId) -> Result<Vec<OptionId>>;
}

impl Lockable for Tree {
    fn lock(&mut self, id: OptionId) -> Result<()> {
        self.node_mut(id)?.locked = true;
        Ok(())
    }

    fn unlock(&mut self, id: OptionId) -> Result<()> {
        self.node_mut(id)?.locked = false;
        Ok(())
    }

    fn is_locked(&self, id: OptionId) -> Result<bool> {
        if self.locked {
            return Ok(true);
        }
        let mut current = Some(id);
        while let Some(option) = current {
            let node = self.node(option)?;
            if node.locked {
                return Ok(true);
            }
            current = match node.context {
                super::Context::Root => None,
                super::Context::Option(parent) => Some(parent),
            };
        }
        Ok(false)
    }
}

impl Watchable for Tree {
    fn add_watcher(&mut self, id: OptionId, watcher: WatcherFn) -> Result<WatcherId> {
        self.node(id)?;
        let watcher_id = self.next_watcher_id();
        self.node_mut(id)?.watchers.add(watcher_id, watcher);
        Ok(watcher_id)
    }

    fn remove_watcher(&mut self, id: OptionId, watcher: WatcherId) -> Result<bool> {
        Ok(self.node_mut(id)?.watchers.remove(watcher))
    }

    fn watcher_count(&self, id: OptionId) -> Result<usize> {
        Ok(self.node(id)?.watchers.len())
    }
}

/// Wrap a closure as a [`WatcherFn`].
pub fn watcher<F>(f: F) -> WatcherFn
where
    F: Fn(&mut Tree, &mut WatchEvent) -> Result<()> + 'static,
{
    std::rc::Rc::new(f)
}
