// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rasterizer contract and pixel types.
//!
//! The DOM-to-pixels algorithm lives outside this crate. The engine drives it
//! through [`Rasterizer`], which exposes the two asynchronous steps the
//! refresh pipeline needs:
//!
//! 1. [`clone_document`](Rasterizer::clone_document): produce a detached,
//!    fully styled copy of the document. This is the "snapshot ready" hook:
//!    the engine captures the returned copy and reuses it for every layer
//!    rasterized in the same refresh pass.
//! 2. [`rasterize`](Rasterizer::rasterize): paint one element of that copy
//!    into a [`PixelBuffer`].
//!
//! Failures of individual resources (images, fonts) are expected to be
//! absorbed by the rasterizer. A returned [`RasterizeError`] means the whole
//! task failed; the engine keeps the previous texture and retries on the
//! next refresh.

use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::dom::Element;

/// Why a snapshot or rasterization task failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RasterizeError {
    /// The task did not finish in time.
    #[error("rasterization timed out")]
    Timeout,
    /// Content was blocked, typically cross-origin resources.
    #[error("content blocked: {0}")]
    Blocked(String),
    /// The content cannot be rasterized by this rasterizer.
    #[error("unsupported content: {0}")]
    Unsupported(String),
    /// Any other failure reported by the rasterizer.
    #[error("rasterization failed: {0}")]
    Failed(String),
}

/// A detached document copy returned by [`Rasterizer::clone_document`].
#[derive(Clone, Debug)]
pub struct ClonedDocument<E> {
    /// The root element of the copied document.
    pub root: E,
    /// The off-screen container that keeps the copy laid out. Detaching it
    /// tears the copy down.
    pub container: E,
}

/// Parameters for one [`Rasterizer::rasterize`] call.
#[derive(Clone, Debug)]
pub struct RasterizeOptions<E> {
    /// Output width in CSS pixels.
    pub width: f64,
    /// Output height in CSS pixels.
    pub height: f64,
    /// Layout viewport width in CSS pixels.
    pub viewport_width: f64,
    /// Layout viewport height in CSS pixels.
    pub viewport_height: f64,
    /// Device pixels per CSS pixel.
    pub scale: f64,
    /// Background fill as straight RGBA, or `None` for transparent.
    pub background_color: Option<[u8; 4]>,
    /// Whether tainting (cross-origin) content may be drawn.
    pub allow_unsafe_content: bool,
    /// Snapshot elements to leave out of the output.
    ///
    /// These are the counterparts of nested layer boundaries, which are
    /// rasterized into their own textures.
    pub hidden: Vec<E>,
}

/// An RGBA8 pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in device pixels.
    pub width: u32,
    /// Height in device pixels.
    pub height: u32,
    /// Row-major, tightly packed RGBA8 data.
    pub data: Vec<u8>,
}

impl core::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A committed rasterization of one layer state.
#[derive(Clone, Debug)]
pub struct Texture {
    /// The state name that produced this texture.
    pub state: String,
    /// The pixels. Shared with the scene content that displays them.
    pub buffer: Rc<PixelBuffer>,
    /// Generation of the snapshot the pixels were rasterized from.
    pub generation: u64,
}

/// The external DOM rasterizer.
pub trait Rasterizer<E: Element> {
    /// Clones the document containing `root` into a detached, laid-out copy.
    fn clone_document(&self, root: &E)
    -> LocalBoxFuture<'static, Result<ClonedDocument<E>, RasterizeError>>;

    /// Rasterizes `target`, an element of a cloned document.
    fn rasterize(
        &self,
        target: &E,
        options: RasterizeOptions<E>,
    ) -> LocalBoxFuture<'static, Result<PixelBuffer, RasterizeError>>;
}
