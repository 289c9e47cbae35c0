//! Unsynchronized arena holding the nodes of one layer tree.
//!
//! [`Arena`] owns every node in a `SlotMap` and implements structural edits,
//! upward propagation, and change event construction. It never emits
//! events itself: mutations append [`PropertyChange`]s to a caller-supplied
//! buffer, which [`LayerTree`](super::LayerTree) emits after releasing its
//! lock.

use std::sync::Arc;

use slotmap::SlotMap;

use super::node::{NodeData, NodeId, NodeKind};
use crate::error::{TreeError, TreeResult};
use crate::logging::targets;
use crate::property::{NodeProperty, PropertyChange, PropertyValue};

/// Buffer of changes produced by one mutation.
pub(crate) type Changes = Vec<PropertyChange>;

pub(crate) struct Arena {
    nodes: SlotMap<NodeId, NodeData>,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    pub(crate) fn insert(&mut self, data: NodeData) -> NodeId {
        let kind = data.kind;
        let id = self.nodes.insert(data);
        tracing::trace!(target: targets::TREE, ?id, ?kind, "created node");
        id
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, id: NodeId) -> TreeResult<&NodeData> {
        self.nodes.get(id).ok_or(TreeError::InvalidNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut NodeData> {
        self.nodes.get_mut(id).ok_or(TreeError::InvalidNode(id))
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Ancestors of `id` from immediate parent to the top of its tree.
    pub(crate) fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.nodes.get(id).and_then(|d| d.parent);
        while let Some(current_id) = current {
            result.push(current_id);
            current = self.nodes.get(current_id).and_then(|d| d.parent);
        }
        result
    }

    /// Whether `ancestor` is `id` itself or one of its ancestors.
    pub(crate) fn is_self_or_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(current_id) = current {
            if current_id == ancestor {
                return true;
            }
            current = self.nodes.get(current_id).and_then(|d| d.parent);
        }
        false
    }

    /// Depth-first pre-order traversal of the subtree rooted at `id`.
    pub(crate) fn preorder(&self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        let mut result = Vec::new();
        self.preorder_recursive(id, &mut result)?;
        Ok(result)
    }

    fn preorder_recursive(&self, id: NodeId, result: &mut Vec<NodeId>) -> TreeResult<()> {
        let data = self.node(id)?;
        result.push(id);
        for &child_id in &data.children {
            self.preorder_recursive(child_id, result)?;
        }
        Ok(())
    }

    // =========================================================================
    // Change events
    // =========================================================================

    pub(crate) fn change(
        &self,
        id: NodeId,
        property: NodeProperty,
        old: PropertyValue,
        new: PropertyValue,
    ) -> PropertyChange {
        PropertyChange {
            node: id,
            ancestors: Arc::from(self.ancestors(id)),
            property,
            old,
            new,
        }
    }

    /// Replace one attribute, recording a change only if the value differs.
    ///
    /// Returns whether the value changed.
    pub(crate) fn replace<T, F, W>(
        &mut self,
        id: NodeId,
        property: NodeProperty,
        value: T,
        field: F,
        wrap: W,
        changes: &mut Changes,
    ) -> TreeResult<bool>
    where
        T: PartialEq + Clone,
        F: for<'a> FnOnce(&'a mut NodeData) -> &'a mut T,
        W: Fn(T) -> PropertyValue,
    {
        let slot = field(self.node_mut(id)?);
        if *slot == value {
            return Ok(false);
        }
        let old = std::mem::replace(slot, value.clone());
        let change = self.change(id, property, wrap(old), wrap(value));
        changes.push(change);
        Ok(true)
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Attach `child` under `parent`, moving it out of its current parent.
    ///
    /// `index` of `None` appends.
    pub(crate) fn attach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: Option<usize>,
        changes: &mut Changes,
    ) -> TreeResult<()> {
        self.check_attachable(parent, child)?;
        let current_parent = self.node(child)?.parent;

        // Validate the index against the sequence as it will be after a
        // possible detach from the same parent, before mutating anything.
        if let Some(index) = index {
            let mut len = self.node(parent)?.children.len();
            if current_parent == Some(parent) {
                len -= 1;
            }
            if index > len {
                return Err(TreeError::IndexOutOfRange { index, len });
            }
        }

        if let Some(old_parent) = current_parent {
            self.detach(old_parent, child, changes)?;
        }

        let parent_data = self.node_mut(parent)?;
        let old_children = parent_data.children.clone();
        match index {
            Some(index) => parent_data.children.insert(index, child),
            None => parent_data.children.push(child),
        }
        let new_children = parent_data.children.clone();
        self.node_mut(child)?.parent = Some(parent);

        tracing::trace!(target: targets::TREE, ?parent, ?child, "attached node");
        let change = self.change(
            parent,
            NodeProperty::Children,
            PropertyValue::Children(old_children),
            PropertyValue::Children(new_children),
        );
        changes.push(change);
        self.children_changed(parent, changes)
    }

    /// Detach `child` from `parent`.
    pub(crate) fn detach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        changes: &mut Changes,
    ) -> TreeResult<()> {
        self.node(child)?;
        let parent_data = self.node_mut(parent)?;
        let position = parent_data
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(TreeError::NotAChild { parent, child })?;
        let old_children = parent_data.children.clone();
        parent_data.children.remove(position);
        let new_children = parent_data.children.clone();
        self.node_mut(child)?.parent = None;

        tracing::trace!(target: targets::TREE, ?parent, ?child, "detached node");
        let change = self.change(
            parent,
            NodeProperty::Children,
            PropertyValue::Children(old_children),
            PropertyValue::Children(new_children),
        );
        changes.push(change);
        self.children_changed(parent, changes)
    }

    /// Replace the whole child sequence of `parent`.
    pub(crate) fn set_children(
        &mut self,
        parent: NodeId,
        children: Vec<NodeId>,
        changes: &mut Changes,
    ) -> TreeResult<()> {
        for (i, &child) in children.iter().enumerate() {
            self.check_attachable(parent, child)?;
            if children[..i].contains(&child) {
                return Err(TreeError::DuplicateChild(child));
            }
        }
        if self.node(parent)?.children == children {
            return Ok(());
        }

        // Incoming nodes owned elsewhere are moved out of their old parents.
        for &child in &children {
            let old_parent = self.node(child)?.parent;
            if let Some(old_parent) = old_parent.filter(|&p| p != parent) {
                self.detach(old_parent, child, changes)?;
            }
        }

        let old_children = std::mem::replace(&mut self.node_mut(parent)?.children, children.clone());
        for &removed in old_children.iter().filter(|c| !children.contains(c)) {
            self.node_mut(removed)?.parent = None;
        }
        for &child in &children {
            self.node_mut(child)?.parent = Some(parent);
        }

        let change = self.change(
            parent,
            NodeProperty::Children,
            PropertyValue::Children(old_children),
            PropertyValue::Children(children),
        );
        changes.push(change);
        self.children_changed(parent, changes)
    }

    /// Remove `id` and all its descendants from the arena.
    pub(crate) fn destroy(&mut self, id: NodeId, changes: &mut Changes) -> TreeResult<usize> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.detach(parent, id, changes)?;
        }
        let doomed = self.preorder(id)?;
        for &node in &doomed {
            self.nodes.remove(node);
        }
        tracing::trace!(target: targets::TREE, ?id, count = doomed.len(), "destroyed subtree");
        Ok(doomed.len())
    }

    fn check_attachable(&self, parent: NodeId, child: NodeId) -> TreeResult<()> {
        self.node(parent)?;
        if self.node(child)?.kind == NodeKind::Root {
            return Err(TreeError::RootImmovable);
        }
        if self.is_self_or_ancestor(child, parent) {
            return Err(TreeError::CircularParentage { child, parent });
        }
        Ok(())
    }

    // =========================================================================
    // Upward propagation
    // =========================================================================

    /// Structural change below (or at) `id`: invalidate the caches of `id`
    /// and every ancestor, and refresh their any/all-enabled aggregates.
    pub(crate) fn children_changed(&mut self, id: NodeId, changes: &mut Changes) -> TreeResult<()> {
        let mut current = Some(id);
        while let Some(node) = current {
            let data = self.node_mut(node)?;
            data.caches.get_mut().invalidate_all();
            current = data.parent;
            self.refresh_enabled_aggregates(node, changes)?;
        }
        Ok(())
    }

    /// Enabled state changed at `id`: refresh aggregates up to the top.
    pub(crate) fn enabled_changed(&mut self, id: NodeId, changes: &mut Changes) -> TreeResult<()> {
        let mut current = Some(id);
        while let Some(node) = current {
            current = self.node(node)?.parent;
            self.refresh_enabled_aggregates(node, changes)?;
        }
        Ok(())
    }

    /// Invalidate one cache slot on `id` and every ancestor.
    pub(crate) fn invalidate_upward<F>(&mut self, id: NodeId, invalidate: F) -> TreeResult<()>
    where
        F: Fn(&mut super::node::NodeCaches),
    {
        let mut current = Some(id);
        while let Some(node) = current {
            let data = self.node_mut(node)?;
            invalidate(data.caches.get_mut());
            current = data.parent;
        }
        Ok(())
    }

    pub(crate) fn refresh_enabled_aggregates(
        &mut self,
        id: NodeId,
        changes: &mut Changes,
    ) -> TreeResult<()> {
        let any = self.any_enabled_equals(id, true)?;
        let all = !self.any_enabled_equals(id, false)?;

        let data = self.node_mut(id)?;
        let old_all = std::mem::replace(&mut data.last_all_enabled, all);
        let old_any = std::mem::replace(&mut data.last_any_enabled, any);

        if old_all != all {
            let change = self.change(
                id,
                NodeProperty::AllChildrenEnabled,
                PropertyValue::Bool(old_all),
                PropertyValue::Bool(all),
            );
            changes.push(change);
        }
        if old_any != any {
            let change = self.change(
                id,
                NodeProperty::AnyChildrenEnabled,
                PropertyValue::Bool(old_any),
                PropertyValue::Bool(any),
            );
            changes.push(change);
        }
        Ok(())
    }

    /// Whether `id` (if enableable) or any descendant has `enabled == value`.
    pub(crate) fn any_enabled_equals(&self, id: NodeId, value: bool) -> TreeResult<bool> {
        let data = self.node(id)?;
        if data.kind.is_enableable() && data.enabled == value {
            return Ok(true);
        }
        for &child in &data.children {
            if self.any_enabled_equals(child, value)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
