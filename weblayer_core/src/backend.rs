// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentation contract for scene integrations.
//!
//! `weblayer_core` does not own a scene graph. Each tick produces
//! [`FrameChanges`] naming the layers that moved, faded, changed texture,
//! appeared, or disappeared; a [`Presenter`] applies them to whatever scene
//! graph displays the layers (a WebGL mesh per layer, an XR compositor
//! layer, or a test double).

use crate::layer::LayerStore;
use crate::transition::FrameChanges;

/// Applies tick changes to a scene graph.
///
/// # Frame loop pseudocode
///
/// ```rust,ignore
/// fn on_frame() {
///     // Advance pose and opacity transitions, dispose faded layers.
///     let changes = web_layer.tick();
///
///     // Present: apply incremental changes to the scene.
///     presenter.apply(&web_layer.store(), &changes);
/// }
/// ```
///
/// [`WebLayer::tick_and_present`](crate::WebLayer::tick_and_present) does
/// both steps.
pub trait Presenter<E> {
    /// Applies the given [`FrameChanges`], reading current values from
    /// `store` as needed.
    ///
    /// Ids in [`removed`](FrameChanges::removed) are no longer in the store.
    fn apply(&mut self, store: &LayerStore<E>, changes: &FrameChanges);
}
