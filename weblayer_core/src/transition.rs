// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-tick transitions and frame change tracking.
//!
//! Each tick walks the tree parent-before-child and:
//!
//! 1. Eases every laid-out layer's pose toward its default pose.
//! 2. Eases opacity toward 1 for attached `Active` layers and toward 0 for
//!    layers pending removal, then multiplies in the parent's effective
//!    opacity.
//! 3. Disposes layers pending removal whose opacity reached zero.
//!
//! Values within the configured tolerance of their target snap to it, so
//! every transition ends after finitely many ticks.
//!
//! Movement is recorded on the [`dirty`](crate::dirty) channels and drained
//! into [`FrameChanges`], the same way for every tick.

use std::collections::HashMap;

use crate::config::WebLayerConfig;
use crate::dirty;
use crate::layer::{LayerId, LayerState, LayerStore, Pose};

/// Changes produced by a single tick.
///
/// Ids refer to layers in the store the tick ran on; read current values
/// with [`LayerStore::get`] and [`LayerNode::content`](crate::layer::LayerNode::content).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameChanges {
    /// Layers whose interpolated pose moved.
    pub poses: Vec<LayerId>,
    /// Layers whose effective opacity changed.
    pub opacities: Vec<LayerId>,
    /// Layers whose displayed texture changed.
    pub content: Vec<LayerId>,
    /// Layers whose content was attached since the previous tick.
    pub added: Vec<LayerId>,
    /// Presented layers disposed since the previous tick.
    pub removed: Vec<LayerId>,
    /// Whether layers were created, attached, or disposed.
    pub topology_changed: bool,
}

impl FrameChanges {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
            && self.opacities.is_empty()
            && self.content.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
            && !self.topology_changed
    }

    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.poses.clear();
        self.opacities.clear();
        self.content.clear();
        self.added.clear();
        self.removed.clear();
        self.topology_changed = false;
    }
}

/// Moves `current` one step toward `target`.
fn approach(current: f64, target: f64, config: &WebLayerConfig) -> f64 {
    if (target - current).abs() <= config.tolerance {
        return target;
    }
    let next = (config.interpolate)(current, target, config.lerp_factor);
    if (target - next).abs() <= config.tolerance || !next.is_finite() {
        target
    } else {
        next
    }
}

fn approach_pose(current: Pose, target: Pose, config: &WebLayerConfig) -> Pose {
    let mut next = current;
    for i in 0..3 {
        next.position[i] = approach(current.position[i], target.position[i], config);
        next.scale[i] = approach(current.scale[i], target.scale[i], config);
    }
    next
}

/// Advances every transition by one tick.
///
/// Returns the accumulated changes and the ids disposed during this tick.
pub(crate) fn tick<E>(store: &mut LayerStore<E>, config: &WebLayerConfig) -> (FrameChanges, Vec<LayerId>) {
    let mut effective: HashMap<LayerId, f64> = HashMap::new();
    let mut converged = Vec::new();

    for id in store.traverse() {
        let parent_opacity = store
            .parent(id)
            .and_then(|p| effective.get(&p).copied())
            .unwrap_or(1.0);
        let Some(node) = store.get_mut(id) else {
            continue;
        };

        let mut pose_moved = false;
        if node.laid_out {
            let next = approach_pose(node.pose, node.default_pose, config);
            pose_moved = next != node.pose;
            node.pose = next;
        }

        let target = match node.lifecycle {
            LayerState::Active if node.attached => 1.0,
            LayerState::Active => node.opacity,
            LayerState::PendingRemoval | LayerState::Disposed => 0.0,
        };
        node.opacity = approach(node.opacity, target, config);
        let eff = parent_opacity * node.opacity;
        let opacity_moved = eff != node.effective_opacity;
        node.effective_opacity = eff;
        effective.insert(id, eff);

        if node.lifecycle == LayerState::PendingRemoval && node.opacity == 0.0 {
            converged.push(id);
        }

        if pose_moved {
            store.mark(id, dirty::POSE);
        }
        if opacity_moved {
            store.mark(id, dirty::OPACITY);
        }
    }

    let mut disposed = Vec::new();
    for id in converged {
        let ids = store.dispose(id);
        if !ids.is_empty() {
            tracing::debug!(layer = %id, subtree = ids.len(), "layer disposed");
        }
        disposed.extend(ids);
    }

    let changes = FrameChanges {
        poses: store.drain(dirty::POSE),
        opacities: store.drain(dirty::OPACITY),
        content: store.drain(dirty::CONTENT),
        topology_changed: !store.drain(dirty::TOPOLOGY).is_empty() || !disposed.is_empty(),
        added: store.take_added(),
        removed: store.take_removed(),
    };
    (changes, disposed)
}
