// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat canvas presentation.
//!
//! Shows each attached layer as a `<canvas>` holding its current texture,
//! placed with a CSS `matrix3d()` derived from the layer's world pose. Meant
//! for inspecting a layer tree without a 3D scene; a real scene integration
//! implements [`Presenter`] over its own meshes the same way.

use std::collections::HashMap;

use wasm_bindgen::{Clamped, JsCast as _};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlElement, ImageData};

use weblayer_core::FrameChanges;
use weblayer_core::backend::Presenter;
use weblayer_core::layer::{LayerId, LayerStore};
use weblayer_core::raster::PixelBuffer;
use weblayer_core::transform::Transform3d;

use crate::element::WebElement;

/// Maps layers to `<canvas>` children of a container, applying incremental
/// updates from [`FrameChanges`].
///
/// World space is centred on the container: the container should be
/// positioned (`position: relative` or similar) and sized like the root
/// element. `pixel_size` must match
/// [`WebLayerConfig::pixel_size`](weblayer_core::WebLayerConfig::pixel_size).
pub struct CanvasPresenter {
    container: HtmlElement,
    pixel_size: f64,
    canvases: HashMap<LayerId, HtmlCanvasElement>,
}

impl core::fmt::Debug for CanvasPresenter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CanvasPresenter")
            .field("container", &"HtmlElement")
            .field("pixel_size", &self.pixel_size)
            .field("canvases", &self.canvases.len())
            .finish()
    }
}

impl CanvasPresenter {
    /// Creates a presenter that manages child elements of `container`.
    #[must_use]
    pub fn new(container: HtmlElement, pixel_size: f64) -> Self {
        Self {
            container,
            pixel_size,
            canvases: HashMap::new(),
        }
    }

    /// Returns a reference to the container element.
    #[must_use]
    pub fn container(&self) -> &HtmlElement {
        &self.container
    }

    /// Returns the canvas showing `id`, if any.
    #[must_use]
    pub fn canvas(&self, id: LayerId) -> Option<&HtmlCanvasElement> {
        self.canvases.get(&id)
    }

    fn create_canvas(&self) -> Option<HtmlCanvasElement> {
        let doc = self.container.owner_document()?;
        let canvas: HtmlCanvasElement = doc.create_element("canvas").ok()?.dyn_into().ok()?;
        let s = canvas.style();
        // A 1px square centred in the container; the transform stretches it
        // over the layer box.
        let _ = s.set_property("position", "absolute");
        let _ = s.set_property("left", "calc(50% - 0.5px)");
        let _ = s.set_property("top", "calc(50% - 0.5px)");
        let _ = s.set_property("width", "1px");
        let _ = s.set_property("height", "1px");
        let _ = s.set_property("transform-origin", "50% 50%");
        let _ = s.set_property("pointer-events", "none");
        self.container.append_child(&canvas).ok()?;
        Some(canvas)
    }
}

impl Presenter<WebElement> for CanvasPresenter {
    fn apply(&mut self, store: &LayerStore<WebElement>, changes: &FrameChanges) {
        // 1. Removals
        for id in &changes.removed {
            if let Some(canvas) = self.canvases.remove(id) {
                canvas.remove();
            }
        }

        // 2. Additions
        for &id in &changes.added {
            if self.canvases.contains_key(&id) {
                continue;
            }
            if let Some(canvas) = self.create_canvas() {
                self.canvases.insert(id, canvas);
            }
        }

        // 3. Everything new or changed, from current content.
        let touched = changes
            .added
            .iter()
            .chain(&changes.poses)
            .chain(&changes.opacities)
            .chain(&changes.content);
        for &id in touched {
            let Some(canvas) = self.canvases.get(&id) else {
                continue;
            };
            let Some(content) = store.get(id).and_then(|node| node.content()) else {
                continue;
            };
            let s = canvas.style();
            apply_css_transform(canvas, &world_to_css(content.transform, self.pixel_size));
            let _ = s.set_property("opacity", &format!("{}", content.opacity));
            if changes.added.contains(&id) || changes.content.contains(&id) {
                match content.texture {
                    Some(buffer) => draw_texture(canvas, &buffer),
                    None => {
                        canvas.set_width(0);
                        canvas.set_height(0);
                    }
                }
            }
        }

        // 4. Topology reorder: parents below children.
        if changes.topology_changed {
            for id in store.traverse() {
                if let Some(canvas) = self.canvases.get(&id) {
                    // DOM re-append moves an existing child, reordering it.
                    let _ = self.container.append_child(canvas);
                }
            }
        }
    }
}

/// Copies RGBA pixels into the canvas backing store.
fn draw_texture(canvas: &HtmlCanvasElement, buffer: &PixelBuffer) {
    canvas.set_width(buffer.width);
    canvas.set_height(buffer.height);
    let Some(ctx) = canvas
        .get_context("2d")
        .ok()
        .flatten()
        .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
    else {
        return;
    };
    match ImageData::new_with_u8_clamped_array_and_sh(
        Clamped(&buffer.data[..]),
        buffer.width,
        buffer.height,
    ) {
        Ok(image) => {
            let _ = ctx.put_image_data(&image, 0.0, 0.0);
        }
        Err(err) => tracing::debug!(?err, "texture upload rejected"),
    }
}

/// Converts a world transform to CSS pixels, flipping y to point down.
fn world_to_css(world: Transform3d, pixel_size: f64) -> Transform3d {
    let inv = 1.0 / pixel_size;
    Transform3d::from_scale(inv, -inv, inv) * world
}

/// Formats a transform as a CSS `matrix3d()` value.
fn css_matrix3d(xf: &Transform3d) -> String {
    let c0 = xf.col(0);
    let c1 = xf.col(1);
    let c2 = xf.col(2);
    let c3 = xf.col(3);

    format!(
        "matrix3d({},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{})",
        c0[0],
        c0[1],
        c0[2],
        c0[3],
        c1[0],
        c1[1],
        c1[2],
        c1[3],
        c2[0],
        c2[1],
        c2[2],
        c2[3],
        c3[0],
        c3[1],
        c3[2],
        c3[3],
    )
}

fn apply_css_transform(el: &HtmlCanvasElement, xf: &Transform3d) {
    let _ = el.style().set_property("transform", &css_matrix3d(xf));
}
