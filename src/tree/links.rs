//! Link attachment, graph maintenance and linked-default resolution.

use super::capability::Linkable;
use super::model::{PendingLink, Tree};
use super::node::{Context, OptionId};
use crate::config::LinkTargetPolicy;
use crate::error::{OptreeError, Result};
use crate::link::{self, Link};
use crate::types::OptionType;
use crate::value::{values_equal, Value};
use std::rc::Rc;
use tracing::{debug, warn};

/// Where a link path starts: a live context, or the type of an option that
/// does not exist yet.
enum LinkBase {
    Context(Context),
    Type(Rc<OptionType>),
}

impl Tree {
    /// Attach links collected while options were created, then refresh the
    /// link graph. Links of composite options are copied down to their
    /// children, addressing the same-named member of the target.
    pub(crate) fn attach_pending(&mut self, pending: Vec<PendingLink>) -> Result<()> {
        for PendingLink {
            id,
            link,
            propagated,
        } in pending
        {
            let composite = self.node(id)?.container.is_some();
            if self.attach_link(id, link.clone(), propagated)? && composite {
                self.propagate_link(id, &link)?;
            }
        }
        self.refresh_links();
        Ok(())
    }

    /// Check a link against the schema and store it on the option.
    ///
    /// Returns whether the link was stored.
    pub(crate) fn attach_link(&mut self, id: OptionId, link: Link, propagated: bool) -> Result<bool> {
        let dependent_ty = self.option_type(id)?;
        let full_name = self.full_name(id)?;

        let Some(target_ty) = self.link_target_type(id, &link)? else {
            if propagated {
                debug!(option = %full_name, link = %link.value, "skipping propagated link without target");
                return Ok(false);
            }
            return match self.config.unknown_link_targets {
                LinkTargetPolicy::Reject => Err(OptreeError::SchemaDefinitionError(format!(
                    "link {} of option \"{}\" points to an unknown option",
                    link.value, full_name
                ))),
                LinkTargetPolicy::Ignore => {
                    warn!(option = %full_name, link = %link.value, "dropping link to an unknown option");
                    Ok(false)
                }
            };
        };

        if !target_ty.is_compatible(&dependent_ty) {
            if propagated {
                warn!(option = %full_name, link = %link.value, "skipping propagated link to an incompatible option");
                return Ok(false);
            }
            return Err(OptreeError::SchemaDefinitionError(format!(
                "option \"{}\" cannot link to {}: type {} ({}) is not compatible",
                full_name,
                link.value,
                target_ty,
                target_ty.kind()
            )));
        }

        if let Some(target) = self.resolve_link_target(id, &link)? {
            if self.graph.would_cycle(id, target) {
                if propagated {
                    warn!(option = %full_name, link = %link.value, "skipping propagated link that closes a cycle");
                    return Ok(false);
                }
                return Err(OptreeError::SchemaDefinitionError(format!(
                    "link {} of option \"{}\" creates a cycle",
                    link.value, full_name
                )));
            }
            self.graph.add_edge(id, &link.value, target);
        } else {
            self.graph.set_unresolved(id, true);
        }

        self.node_mut(id)?.links.insert(link);
        Ok(true)
    }

    /// Context a link's path is resolved from.
    ///
    /// Absolute links start at the root. `./` starts at the dependent's
    /// parent context and every `../` climbs one more level.
    fn link_base(&self, id: OptionId, link: &Link) -> Result<Option<Context>> {
        if !link.relative {
            return Ok(Some(Context::Root));
        }
        self.climb(self.node(id)?.context, link.parent_level)
    }

    /// Context `levels` steps above `context`, `None` past the root.
    fn climb(&self, mut context: Context, levels: usize) -> Result<Option<Context>> {
        for _ in 0..levels {
            context = match context {
                Context::Root => return Ok(None),
                Context::Option(parent) => self.node(parent)?.context,
            };
        }
        Ok(Some(context))
    }

    /// Option a link currently points at, never the dependent itself.
    pub(crate) fn resolve_link_target(&self, id: OptionId, link: &Link) -> Result<Option<OptionId>> {
        let Some(base) = self.link_base(id, link)? else {
            return Ok(None);
        };
        let mut segments = link.segments();
        let Some(first) = segments.next() else {
            return Ok(None);
        };
        let mut current = match base {
            Context::Root => self.root(first),
            Context::Option(parent) => self.child(parent, first)?,
        };
        for segment in segments {
            current = match current {
                Some(option) => self.child(option, segment)?,
                None => return Ok(None),
            };
        }
        Ok(current.filter(|target| *target != id))
    }

    /// Type a link points at, resolved through the type tree so that targets
    /// which do not exist yet (collection items) can still be checked.
    fn link_target_type(&self, id: OptionId, link: &Link) -> Result<Option<Rc<OptionType>>> {
        if let Some(target) = self.resolve_link_target(id, link)? {
            return Ok(Some(self.option_type(target)?));
        }
        match self.link_base(id, link)? {
            Some(base) => self.type_at(LinkBase::Context(base), link),
            None => Ok(None),
        }
    }

    /// Type reached by walking the link's path from `base`.
    fn type_at(&self, base: LinkBase, link: &Link) -> Result<Option<Rc<OptionType>>> {
        let mut segments = link.segments();
        let Some(first) = segments.next() else {
            return Ok(None);
        };
        let mut current = match base {
            LinkBase::Context(Context::Root) => match self.root(first) {
                Some(root) => Some(self.option_type(root)?),
                None => None,
            },
            LinkBase::Context(Context::Option(parent)) => {
                self.node(parent)?.ty.find_child_type(first)
            }
            LinkBase::Type(ty) => ty.find_child_type(first),
        };
        for segment in segments {
            current = match current {
                Some(ty) => ty.find_child_type(segment),
                None => return Ok(None),
            };
        }
        Ok(current)
    }

    // =========================================================================
    // Graph maintenance
    // =========================================================================

    /// Re-resolve the links a structural change may have moved: those of
    /// options queued by removals and renames, and those that had no target.
    pub(crate) fn refresh_links(&mut self) {
        let mut affected = std::mem::take(&mut self.stale_links);
        affected.extend(self.graph.unresolved());
        affected.sort();
        affected.dedup();
        for id in affected {
            self.resolve_links_of(id);
        }
    }

    /// Edges that would close a cycle are refused and stay unresolved.
    fn resolve_links_of(&mut self, id: OptionId) {
        let links = match self.node(id) {
            Ok(node) => node.links.to_vec(),
            Err(_) => return,
        };
        let mut unresolved = false;
        for link in links {
            self.graph.remove_edge(id, &link.value);
            match self.resolve_link_target(id, &link) {
                Ok(Some(target)) if self.graph.would_cycle(id, target) => {
                    warn!(option = %id, link = %link.value, "refusing link edge that closes a cycle");
                    unresolved = true;
                }
                Ok(Some(target)) => self.graph.add_edge(id, &link.value, target),
                Ok(None) | Err(_) => unresolved = true,
            }
        }
        self.graph.set_unresolved(id, unresolved);
    }

    /// Queue every option linked into the subtree of `id` for re-resolution.
    pub(crate) fn mark_subtree_stale(&mut self, id: OptionId) -> Result<()> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let dependents = self.graph.dependents(current);
            self.stale_links.extend(dependents);
            if let Some(container) = &self.node(current)?.container {
                stack.extend(container.all_children());
            }
        }
        Ok(())
    }

    // =========================================================================
    // Proto links
    // =========================================================================

    /// Check the links declared inside collection protos against the type
    /// tree, before any item exists.
    pub(crate) fn check_proto_links(&self) -> Result<()> {
        for id in self.live_ids() {
            if let Some(proto) = self.node(id)?.ty.proto() {
                self.check_type_links(id, &mut Vec::new(), proto)?;
            }
        }
        Ok(())
    }

    /// `scope` lists the not-yet-created ancestors of `ty` below the
    /// collection `anchor`, outermost first.
    fn check_type_links(
        &self,
        anchor: OptionId,
        scope: &mut Vec<Rc<OptionType>>,
        ty: &Rc<OptionType>,
    ) -> Result<()> {
        for link in ty.links() {
            self.check_type_link(anchor, scope, ty, link)?;
        }

        let mut nested: Vec<Rc<OptionType>> =
            ty.children().iter().map(|(_, child)| Rc::clone(child)).collect();
        nested.extend(ty.options_type().cloned());
        nested.extend(ty.proto().cloned());

        scope.push(Rc::clone(ty));
        let result = nested
            .iter()
            .try_for_each(|child| self.check_type_links(anchor, scope, child));
        scope.pop();
        result
    }

    fn check_type_link(
        &self,
        anchor: OptionId,
        scope: &[Rc<OptionType>],
        ty: &OptionType,
        link: &Link,
    ) -> Result<()> {
        let base = if !link.relative {
            Some(LinkBase::Context(Context::Root))
        } else if link.parent_level < scope.len() {
            Some(LinkBase::Type(Rc::clone(
                &scope[scope.len() - 1 - link.parent_level],
            )))
        } else {
            self.climb(Context::Option(anchor), link.parent_level - scope.len())?
                .map(LinkBase::Context)
        };
        let target = match base {
            Some(base) => self.type_at(base, link)?,
            None => None,
        };

        let Some(target_ty) = target else {
            return match self.config.unknown_link_targets {
                LinkTargetPolicy::Reject => Err(OptreeError::SchemaDefinitionError(format!(
                    "link {} of option \"{}\" points to an unknown option",
                    link.value,
                    ty.full_name()
                ))),
                LinkTargetPolicy::Ignore => Ok(()),
            };
        };
        if !target_ty.is_compatible(ty) {
            return Err(OptreeError::SchemaDefinitionError(format!(
                "option \"{}\" cannot link to {}: type {} ({}) is not compatible",
                ty.full_name(),
                link.value,
                target_ty,
                target_ty.kind()
            )));
        }
        Ok(())
    }

    /// Target chosen for the linked default of `id`.
    ///
    /// Two passes over the links in priority order: first a target that is
    /// not itself linked or already holds an explicit value, then one that
    /// is not linked or holds an explicit default. Failing both, the
    /// highest-priority link's target.
    pub(crate) fn pick_link_target(&self, id: OptionId) -> Result<Option<OptionId>> {
        let node = self.node(id)?;
        let candidates: Vec<OptionId> = node
            .links
            .iter()
            .filter_map(|l| self.graph.target(id, &l.value))
            .collect();

        for candidate in &candidates {
            let target = self.node(*candidate)?;
            if target.links.is_empty() || self.raw_value(*candidate)?.is_some() {
                return Ok(Some(*candidate));
            }
        }
        for candidate in &candidates {
            let target = self.node(*candidate)?;
            if target.links.is_empty() || self.raw_value_default(*candidate)?.is_some() {
                return Ok(Some(*candidate));
            }
        }
        Ok(node
            .links
            .first()
            .and_then(|l| self.graph.target(id, &l.value)))
    }

    /// Value supplied by the links of `id`, if any link resolves.
    pub(crate) fn linked_value(&self, id: OptionId) -> Result<Option<Value>> {
        {
            let mut resolving = self.resolving.borrow_mut();
            if resolving.contains(&id) {
                warn!(option = %id, "link resolution re-entered an option; using its empty value");
                return Ok(None);
            }
            resolving.push(id);
        }
        let result = match self.pick_link_target(id) {
            Ok(Some(target)) => self.value(target).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        self.resolving.borrow_mut().retain(|r| *r != id);
        result
    }

    fn propagate_link(&mut self, id: OptionId, link: &Link) -> Result<()> {
        let mut pending = Vec::new();
        for (name, child) in self.children(id)? {
            pending.push(PendingLink {
                id: child,
                link: link.for_child(&name),
                propagated: true,
            });
        }
        for PendingLink {
            id: child,
            link: child_link,
            ..
        } in pending
        {
            if self.attach_link(child, child_link.clone(), true)? {
                self.propagate_link(child, &child_link)?;
            }
        }
        Ok(())
    }

    fn unpropagate_link(&mut self, id: OptionId, link: &Link) -> Result<()> {
        for (name, child) in self.children(id)? {
            let child_link = link.for_child(&name);
            if self.node_mut(child)?.links.remove(&child_link.value) {
                self.graph.remove_edge(child, &child_link.value);
                self.unpropagate_link(child, &child_link)?;
            }
        }
        Ok(())
    }

    fn parse_link(&self, id: OptionId, link: &str) -> Result<Link> {
        link::parse(link).ok_or_else(|| {
            OptreeError::SchemaDefinitionError(format!(
                "'{}' is not a valid link for option \"{}\"",
                link,
                self.full_name(id).unwrap_or_default()
            ))
        })
    }
}

impl Linkable for Tree {
    fn add_link(&mut self, id: OptionId, link: &str) -> Result<()> {
        let parsed = self.parse_link(id, link)?;
        let old = self.value(id)?;
        if self.attach_link(id, parsed.clone(), false)? && self.node(id)?.container.is_some() {
            self.propagate_link(id, &parsed)?;
        }
        self.refresh_links();
        let new = self.value(id)?;
        if !values_equal(&new, &old) {
            self.dispatch(id, new, old, true)?;
        }
        Ok(())
    }

    fn remove_link(&mut self, id: OptionId, link: &str) -> Result<bool> {
        let parsed = self.parse_link(id, link)?;
        let old = self.value(id)?;
        if !self.node_mut(id)?.links.remove(&parsed.value) {
            return Ok(false);
        }
        self.graph.remove_edge(id, &parsed.value);
        self.unpropagate_link(id, &parsed)?;
        let new = self.value(id)?;
        if !values_equal(&new, &old) {
            self.dispatch(id, new, old, true)?;
        }
        Ok(true)
    }

    fn links(&self, id: OptionId) -> Result<Vec<Link>> {
        Ok(self.node(id)?.links.to_vec())
    }

    fn has_link(&self, id: OptionId, link: &str) -> Result<bool> {
        let parsed = self.parse_link(id, link)?;
        Ok(self.node(id)?.links.contains(&parsed.value))
    }

    fn dependents(&self, id: OptionId) -> Result<Vec<OptionId>> {
        self.node(id)?;
        Ok(self.graph.dependents(id))
    }
}
