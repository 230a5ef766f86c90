// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `requestAnimationFrame` tick source.
//!
//! [`FrameLoop`] calls [`WebLayer::tick_and_present`] once per animation
//! frame, so pose and opacity transitions advance at display rate and every
//! [`FrameChanges`](weblayer_core::FrameChanges) reaches the presenter.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

use weblayer_core::{Presenter, WebLayer};

use crate::element::WebElement;

// Direct global bindings instead of `web_sys::Window` methods; avoids
// fetching the Window object on every frame.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = "requestAnimationFrame")]
    fn request_animation_frame(callback: &JsValue) -> i32;

    #[wasm_bindgen(js_name = "cancelAnimationFrame")]
    fn cancel_animation_frame(id: i32);
}

/// An animation loop ticking one [`WebLayer`] into one presenter.
///
/// Create with [`FrameLoop::new`], then call [`start`](Self::start). The
/// loop re-registers itself each frame until [`stop`](Self::stop) is called,
/// the layer is disposed, or the `FrameLoop` is dropped.
pub struct FrameLoop {
    inner: Rc<FrameInner>,
}

type FrameClosure = Closure<dyn FnMut(f64)>;

struct FrameInner {
    /// The closure registered with `requestAnimationFrame`; refers to itself
    /// to re-register.
    closure: RefCell<Option<FrameClosure>>,
    layer: Rc<WebLayer<WebElement>>,
    presenter: RefCell<Box<dyn Presenter<WebElement>>>,
    frames: Cell<u64>,
    running: Cell<bool>,
    raf_id: Cell<i32>,
}

impl FrameLoop {
    /// Creates a loop that is **not yet running**.
    pub fn new(
        layer: Rc<WebLayer<WebElement>>,
        presenter: impl Presenter<WebElement> + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(FrameInner {
                closure: RefCell::new(None),
                layer,
                presenter: RefCell::new(Box::new(presenter)),
                frames: Cell::new(0),
                running: Cell::new(false),
                raf_id: Cell::new(0),
            }),
        }
    }

    /// Starts the loop. No-op if already running.
    pub fn start(&self) {
        if self.inner.running.get() {
            return;
        }
        self.inner.running.set(true);

        let inner = Rc::clone(&self.inner);
        let closure = Closure::wrap(Box::new(move |_timestamp_ms: f64| {
            if !inner.running.get() {
                return;
            }
            if inner.layer.is_disposed() {
                tracing::debug!(frames = inner.frames.get(), "layer disposed; frame loop ends");
                inner.running.set(false);
                return;
            }

            inner.frames.set(inner.frames.get() + 1);
            let mut presenter = inner.presenter.borrow_mut();
            inner.layer.tick_and_present(&mut **presenter);
            drop(presenter);

            if inner.running.get()
                && let Some(ref closure) = *inner.closure.borrow()
            {
                let id = request_animation_frame(closure.as_ref().unchecked_ref());
                inner.raf_id.set(id);
            }
        }) as Box<dyn FnMut(f64)>);

        let id = request_animation_frame(closure.as_ref().unchecked_ref());
        self.inner.raf_id.set(id);
        *self.inner.closure.borrow_mut() = Some(closure);
    }

    /// Stops the loop and cancels the pending frame. Can be restarted.
    pub fn stop(&self) {
        if !self.inner.running.get() {
            return;
        }
        self.inner.running.set(false);
        cancel_animation_frame(self.inner.raf_id.get());
    }

    /// Returns `true` if the loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Number of frames ticked so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.inner.frames.get()
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
        // Breaks the closure's reference cycle through `inner`.
        self.inner.closure.borrow_mut().take();
    }
}

impl core::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("running", &self.inner.running.get())
            .field("frames", &self.inner.frames.get())
            .field("layer", &self.inner.layer)
            .finish_non_exhaustive()
    }
}
