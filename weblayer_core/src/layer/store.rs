// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer storage with allocation, topology, and the removal lifecycle.

use std::collections::BTreeMap;

use understory_dirty::{Channel, CycleHandling, DirtyTracker};

use crate::dirty;
use crate::dom::Element;
use crate::tagger;

use super::id::LayerId;
use super::node::{LayerNode, LayerState};

/// Storage for every live layer of one tree.
///
/// Layers are addressed by [`LayerId`]. Ids are allocated monotonically and
/// never reused, so an id that is no longer in the store is known to have
/// been disposed.
#[derive(Debug)]
pub struct LayerStore<E> {
    nodes: BTreeMap<LayerId, LayerNode<E>>,
    next_id: u32,
    root: Option<LayerId>,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Lifecycle tracking --
    pending_added: Vec<LayerId>,
    pending_removed: Vec<LayerId>,
}

impl<E> Default for LayerStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> LayerStore<E> {
    /// Creates an empty layer store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 0,
            root: None,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
        }
    }

    // -- Allocation API --

    /// Creates a new `Active` layer for `element` below `parent`.
    ///
    /// The layer is not inserted into the parent's child list; the tree
    /// builder sets complete child lists with [`set_children`](Self::set_children).
    pub(crate) fn create_layer(&mut self, element: E, parent: Option<LayerId>) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        let depth = parent
            .and_then(|p| self.nodes.get(&p))
            .map_or(0, |p| p.depth + 1);
        self.nodes
            .insert(id, LayerNode::new(id, element, parent, depth));
        self.dirty.mark(id.0, dirty::TOPOLOGY);
        id
    }

    /// Returns whether `id` refers to a layer that has not been disposed.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns the lifecycle state of `id`.
    ///
    /// Ids that were allocated by this store and later disposed report
    /// [`LayerState::Disposed`]; ids never allocated here return `None`.
    #[must_use]
    pub fn lifecycle(&self, id: LayerId) -> Option<LayerState> {
        match self.nodes.get(&id) {
            Some(node) => Some(node.lifecycle),
            None if id.0 < self.next_id => Some(LayerState::Disposed),
            None => None,
        }
    }

    /// Number of live layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store holds no live layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // -- Topology API --

    /// The root layer, once the tree has been built.
    #[must_use]
    pub fn root(&self) -> Option<LayerId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, id: LayerId) {
        self.root = Some(id);
    }

    /// Returns the layer with this id.
    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&LayerNode<E>> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: LayerId) -> Option<&mut LayerNode<E>> {
        self.nodes.get_mut(&id)
    }

    /// Returns the parent of `id`.
    #[must_use]
    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Returns the children of `id`, or an empty slice for unknown ids.
    #[must_use]
    pub fn children(&self, id: LayerId) -> &[LayerId] {
        self.nodes.get(&id).map_or(&[], |n| &n.children)
    }

    /// Replaces the child list of `parent`.
    pub(crate) fn set_children(&mut self, parent: LayerId, children: Vec<LayerId>) {
        if let Some(node) = self.nodes.get_mut(&parent)
            && node.children != children
        {
            node.children = children;
            self.dirty.mark(parent.0, dirty::TOPOLOGY);
        }
    }

    /// Returns live layer ids in depth-first pre-order from the root.
    #[must_use]
    pub fn traverse(&self) -> Vec<LayerId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if let Some(root) = self.root {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                let Some(node) = self.nodes.get(&id) else {
                    continue;
                };
                order.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    // -- Removal lifecycle --

    /// Moves `id` and its whole subtree from `Active` to `PendingRemoval`.
    ///
    /// Returns the layers that changed state. Layers already pending removal
    /// are left alone; the transition never reverses.
    pub(crate) fn begin_removal(&mut self, id: LayerId) -> Vec<LayerId> {
        let mut changed = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if node.lifecycle == LayerState::Active {
                node.lifecycle = LayerState::PendingRemoval;
                changed.push(id);
            }
            stack.extend(node.children.iter().copied());
        }
        changed
    }

    /// Disposes `id` and its subtree.
    ///
    /// Detaches the layer from its parent, disconnects its observers,
    /// releases its textures and recursively disposes its children. Returns
    /// the disposed ids in pre-order. Disposing an id that is already gone
    /// does nothing.
    pub(crate) fn dispose(&mut self, id: LayerId) -> Vec<LayerId> {
        let mut disposed = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(mut node) = self.nodes.remove(&id) else {
                continue;
            };
            if let Some(parent) = node.parent
                && let Some(p) = self.nodes.get_mut(&parent)
            {
                p.children.retain(|&c| c != id);
                self.dirty.mark(parent.0, dirty::TOPOLOGY);
            }
            node.lifecycle = LayerState::Disposed;
            let was_attached = node.attached;
            node.release();
            self.dirty.remove_key(id.0);

            if let Some(pos) = self.pending_added.iter().position(|&a| a == id) {
                // Never presented; nothing to take back.
                self.pending_added.remove(pos);
            } else if was_attached {
                self.pending_removed.push(id);
            }
            if self.root == Some(id) {
                self.root = None;
            }
            disposed.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        disposed
    }

    // -- Content --

    /// Marks the layer's content as attached to the scene.
    ///
    /// The first attachment reports the layer as added; later ones report a
    /// content change.
    pub(crate) fn attach(&mut self, id: LayerId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.attached {
            self.dirty.mark(id.0, dirty::CONTENT);
        } else {
            node.attached = true;
            self.pending_added.push(id);
            self.dirty.mark(id.0, dirty::TOPOLOGY);
        }
    }

    // -- Dirty tracking --

    pub(crate) fn mark(&mut self, id: LayerId, channel: Channel) {
        if self.nodes.contains_key(&id) {
            self.dirty.mark(id.0, channel);
        }
    }

    /// Drains `channel`, returning live ids in ascending order.
    pub(crate) fn drain(&mut self, channel: Channel) -> Vec<LayerId> {
        let drained: Vec<u32> = self.dirty.drain(channel).deterministic().run().collect();
        drained
            .into_iter()
            .map(LayerId)
            .filter(|id| self.nodes.contains_key(id))
            .collect()
    }

    pub(crate) fn take_added(&mut self) -> Vec<LayerId> {
        core::mem::take(&mut self.pending_added)
    }

    pub(crate) fn take_removed(&mut self) -> Vec<LayerId> {
        core::mem::take(&mut self.pending_removed)
    }
}

impl<E: Element> LayerStore<E> {
    /// Returns the live layer whose boundary element is `element`.
    #[must_use]
    pub fn find_by_element(&self, element: &E) -> Option<LayerId> {
        let id = tagger::layer_id(element)?;
        let node = self.nodes.get(&id)?;
        (node.element == *element).then_some(id)
    }

    /// Returns the live layer owning `element`: the layer of the nearest
    /// boundary element at or above it.
    ///
    /// Layers pending removal still own their content, but callers that only
    /// care about active layers should check the lifecycle.
    #[must_use]
    pub fn owning_layer(&self, element: &E) -> Option<LayerId> {
        let mut current = Some(element.clone());
        while let Some(el) = current {
            if let Some(id) = self.find_by_element(&el) {
                return Some(id);
            }
            current = el.parent();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestElement;

    fn store_with_tree() -> (LayerStore<TestElement>, LayerId, LayerId, LayerId) {
        let mut store = LayerStore::new();
        let root = store.create_layer(TestElement::new("main"), None);
        store.set_root(root);
        let a = store.create_layer(TestElement::new("section"), Some(root));
        let b = store.create_layer(TestElement::new("aside"), Some(a));
        store.set_children(root, vec![a]);
        store.set_children(a, vec![b]);
        (store, root, a, b)
    }

    #[test]
    fn ids_are_never_reused() {
        let mut store = LayerStore::new();
        let a = store.create_layer(TestElement::new("div"), None);
        store.dispose(a);
        let b = store.create_layer(TestElement::new("div"), None);
        assert_ne!(a, b);
        assert!(!store.is_alive(a));
        assert!(store.is_alive(b));
    }

    #[test]
    fn depth_follows_parent() {
        let (store, root, a, b) = store_with_tree();
        assert_eq!(store.get(root).map(LayerNode::depth), Some(0));
        assert_eq!(store.get(a).map(LayerNode::depth), Some(1));
        assert_eq!(store.get(b).map(LayerNode::depth), Some(2));
    }

    #[test]
    fn traverse_is_pre_order() {
        let (mut store, root, a, b) = store_with_tree();
        let c = store.create_layer(TestElement::new("footer"), Some(root));
        store.set_children(root, vec![a, c]);
        assert_eq!(store.traverse(), vec![root, a, b, c]);
    }

    #[test]
    fn removal_covers_subtree_and_latches() {
        let (mut store, _root, a, b) = store_with_tree();
        let changed = store.begin_removal(a);
        assert_eq!(changed.len(), 2);
        assert_eq!(store.lifecycle(a), Some(LayerState::PendingRemoval));
        assert_eq!(store.lifecycle(b), Some(LayerState::PendingRemoval));
        assert!(store.begin_removal(a).is_empty(), "already pending");
    }

    #[test]
    fn dispose_detaches_and_recurses() {
        let (mut store, root, a, b) = store_with_tree();
        let disposed = store.dispose(a);
        assert_eq!(disposed, vec![a, b]);
        assert!(store.children(root).is_empty());
        assert_eq!(store.lifecycle(a), Some(LayerState::Disposed));
        assert_eq!(store.lifecycle(b), Some(LayerState::Disposed));
        assert_eq!(store.lifecycle(LayerId(99)), None);
    }

    #[test]
    fn dispose_is_idempotent() {
        let (mut store, root, a, _b) = store_with_tree();
        store.dispose(a);
        assert!(store.dispose(a).is_empty());
        assert_eq!(store.traverse(), vec![root]);
    }

    #[test]
    fn attach_reports_added_once() {
        let (mut store, root, _a, _b) = store_with_tree();
        store.attach(root);
        store.attach(root);
        assert_eq!(store.take_added(), vec![root]);
        assert_eq!(store.drain(dirty::CONTENT), vec![root]);
    }

    #[test]
    fn removed_only_reports_presented_layers() {
        let (mut store, root, a, b) = store_with_tree();
        store.attach(a);
        store.attach(b);
        // `a` and `b` were never handed to a presenter.
        store.dispose(a);
        assert!(store.take_added().is_empty());
        assert!(store.take_removed().is_empty());

        store.attach(root);
        let _ = store.take_added();
        store.dispose(root);
        assert_eq!(store.take_removed(), vec![root]);
        assert_eq!(store.root(), None);
    }

    #[test]
    fn owning_layer_walks_up_to_boundary() {
        let mut store = LayerStore::new();
        let root_el = TestElement::new("main");
        let section = TestElement::new("section");
        let leaf = TestElement::new("span");
        root_el.append_child(&section);
        section.append_child(&leaf);

        let root = store.create_layer(root_el.clone(), None);
        tagger::mark_boundary(&root_el, root);
        let layer = store.create_layer(section.clone(), Some(root));
        tagger::mark_boundary(&section, layer);

        assert_eq!(store.owning_layer(&leaf), Some(layer));
        assert_eq!(store.owning_layer(&section), Some(layer));
        assert_eq!(store.owning_layer(&root_el), Some(root));
        assert_eq!(store.owning_layer(&TestElement::new("p")), None);
    }

    #[test]
    fn stale_marker_does_not_match() {
        let mut store = LayerStore::new();
        let el = TestElement::new("div");
        let other = TestElement::new("div");
        let id = store.create_layer(el, None);
        // A copy of the element carrying the same marker, e.g. a clone.
        tagger::mark_boundary(&other, id);
        assert_eq!(store.find_by_element(&other), None);
    }
}
