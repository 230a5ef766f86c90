// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Building and updating the layer tree from the live document.
//!
//! The walk starts at the root element and descends depth-first. Every
//! visited element receives an identity token. An element carrying the
//! boundary marker becomes a child layer of the layer being walked, and the
//! walk does not descend into it: its own layer walks its subtree.
//!
//! Existing layers are matched by the id in the boundary marker. A match
//! needs a live `Active` layer that was a child of the same parent and whose
//! element is the same node. Anything else gets a fresh layer with a fresh
//! id. Previous children that are not found again start the removal
//! lifecycle and stay in the child list until they are disposed.

use crate::dom::Element;
use crate::host::{ChangeSink, Host};
use crate::layer::{LayerId, LayerState, LayerStore};
use crate::tagger;

/// Collaborators needed while walking.
pub(crate) struct TreeContext<'a, E: Element> {
    pub(crate) host: &'a dyn Host<E>,
    pub(crate) sink: &'a ChangeSink<E>,
}

/// Builds the tree on first call and updates it on later calls.
///
/// Returns the root layer id, which stays stable as long as `root` is the
/// same element.
pub(crate) fn build_or_update_tree<E: Element>(
    store: &mut LayerStore<E>,
    root: &E,
    cx: &TreeContext<'_, E>,
) -> LayerId {
    let root_id = match store.root() {
        Some(id)
            if store
                .get(id)
                .is_some_and(|n| n.lifecycle() == LayerState::Active && n.element() == root) =>
        {
            id
        }
        previous => {
            if let Some(previous) = previous {
                store.dispose(previous);
            }
            let id = create_layer(store, root, None, cx);
            store.set_root(id);
            id
        }
    };
    tagger::ensure_uid(root);
    sync_layer(store, root_id, cx);
    root_id
}

fn create_layer<E: Element>(
    store: &mut LayerStore<E>,
    element: &E,
    parent: Option<LayerId>,
    cx: &TreeContext<'_, E>,
) -> LayerId {
    let id = store.create_layer(element.clone(), parent);
    tagger::mark_boundary(element, id);
    let observation = cx.host.observe_resize(element, cx.sink.clone());
    if let Some(node) = store.get_mut(id) {
        node.observation = Some(observation);
    }
    tracing::trace!(layer = %id, ?parent, "layer created");
    id
}

fn sync_layer<E: Element>(store: &mut LayerStore<E>, id: LayerId, cx: &TreeContext<'_, E>) {
    let Some(node) = store.get(id) else {
        return;
    };
    let element = node.element().clone();
    let previous = node.children().to_vec();

    let mut found = Vec::new();
    collect_boundaries(&element, &mut found);

    let mut children = Vec::with_capacity(found.len());
    for el in found {
        let matched = tagger::layer_id(&el).filter(|child| {
            previous.contains(child)
                && store
                    .get(*child)
                    .is_some_and(|n| n.lifecycle() == LayerState::Active && *n.element() == el)
        });
        let child = match matched {
            Some(child) if !children.contains(&child) => child,
            _ => create_layer(store, &el, Some(id), cx),
        };
        children.push(child);
    }

    let active = children.len();
    for prev in previous {
        if children.contains(&prev) || !store.is_alive(prev) {
            continue;
        }
        let newly = store.begin_removal(prev);
        if !newly.is_empty() {
            tracing::debug!(layer = %prev, subtree = newly.len(), "layer pending removal");
        }
        children.push(prev);
    }

    store.set_children(id, children.clone());
    for &child in &children[..active] {
        sync_layer(store, child, cx);
    }
}

fn collect_boundaries<E: Element>(element: &E, found: &mut Vec<E>) {
    for child in element.children() {
        tagger::ensure_uid(&child);
        if tagger::is_boundary(&child) {
            found.push(child);
        } else {
            collect_boundaries(&child, found);
        }
    }
}
