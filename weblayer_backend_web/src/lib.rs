// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Browser backend for weblayer.
//!
//! This crate provides integration with browser APIs:
//!
//! - [`WebElement`]: [`Element`](weblayer_core::Element) over `HtmlElement`
//! - [`WebHost`]: display metrics, off-screen parking, and mutation, resize
//!   and form-interaction observers
//! - [`FrameLoop`]: `requestAnimationFrame` loop ticking a layer tree into a
//!   presenter
//! - [`CanvasPresenter`]: flat `<canvas>` presentation for inspection
//!
//! The rasterizer is supplied by the embedder.

mod element;
mod frame_loop;
mod host;
mod presenter;

pub use element::WebElement;
pub use frame_loop::FrameLoop;
pub use host::WebHost;
pub use presenter::CanvasPresenter;
pub use weblayer_core::backend::Presenter;

use weblayer_core::WebLayer;

/// Spawns the change coordinator of `layer` on the browser's microtask
/// queue.
///
/// Returns `false` if the coordinator was already taken. The task ends when
/// the layer is disposed.
pub fn spawn_coordinator(layer: &WebLayer<WebElement>) -> bool {
    match layer.run() {
        Some(coordinator) => {
            wasm_bindgen_futures::spawn_local(coordinator);
            true
        }
        None => false,
    }
}
