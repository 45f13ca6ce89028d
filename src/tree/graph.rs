//! Directed link graph between options.

use super::node::OptionId;
use std::collections::{HashMap, HashSet};

/// Resolved link edges.
///
/// `targets` memoises, per dependent and link, the option the link resolves
/// to; `dependents` is the reverse index used to forward notifications.
/// `unresolved` holds dependents with at least one link that found no target.
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkGraph {
    targets: HashMap<OptionId, Vec<(String, OptionId)>>,
    dependents: HashMap<OptionId, Vec<OptionId>>,
    unresolved: HashSet<OptionId>,
}

impl LinkGraph {
    /// Drop every edge from and to a removed option.
    ///
    /// Returns the options that linked to it.
    pub(crate) fn forget(&mut self, id: OptionId) -> Vec<OptionId> {
        if let Some(edges) = self.targets.remove(&id) {
            for (_, target) in edges {
                if let Some(reverse) = self.dependents.get_mut(&target) {
                    reverse.retain(|d| *d != id);
                }
            }
        }
        self.unresolved.remove(&id);
        self.dependents.remove(&id).unwrap_or_default()
    }

    pub(crate) fn set_unresolved(&mut self, id: OptionId, unresolved: bool) {
        if unresolved {
            self.unresolved.insert(id);
        } else {
            self.unresolved.remove(&id);
        }
    }

    pub(crate) fn unresolved(&self) -> Vec<OptionId> {
        self.unresolved.iter().copied().collect()
    }

    pub(crate) fn add_edge(&mut self, dependent: OptionId, link: &str, target: OptionId) {
        self.remove_edge(dependent, link);
        let edges = self.targets.entry(dependent).or_default();
        edges.push((link.to_string(), target));
        let reverse = self.dependents.entry(target).or_default();
        if !reverse.contains(&dependent) {
            reverse.push(dependent);
        }
    }

    pub(crate) fn remove_edge(&mut self, dependent: OptionId, link: &str) {
        let Some(edges) = self.targets.get_mut(&dependent) else {
            return;
        };
        let removed: Vec<OptionId> = edges
            .iter()
            .filter(|(l, _)| l == link)
            .map(|(_, t)| *t)
            .collect();
        edges.retain(|(l, _)| l != link);
        for target in removed {
            let still_linked = edges.iter().any(|(_, t)| *t == target);
            if !still_linked {
                if let Some(reverse) = self.dependents.get_mut(&target) {
                    reverse.retain(|d| *d != dependent);
                }
            }
        }
    }

    /// Memoised target of `link` declared on `dependent`.
    pub(crate) fn target(&self, dependent: OptionId, link: &str) -> Option<OptionId> {
        self.targets
            .get(&dependent)?
            .iter()
            .find(|(l, _)| l == link)
            .map(|(_, t)| *t)
    }

    pub(crate) fn dependents(&self, target: OptionId) -> Vec<OptionId> {
        self.dependents.get(&target).cloned().unwrap_or_default()
    }

    /// Whether following links from `from` eventually reaches `to`.
    pub(crate) fn reaches(&self, from: OptionId, to: OptionId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(edges) = self.targets.get(&current) {
                stack.extend(edges.iter().map(|(_, t)| *t));
            }
        }
        false
    }

    /// Whether adding `dependent -> target` would close a cycle.
    pub(crate) fn would_cycle(&self, dependent: OptionId, target: OptionId) -> bool {
        dependent == target || self.reaches(target, dependent)
    }
}
