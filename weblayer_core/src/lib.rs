// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live DOM subtrees mirrored into rasterized, animated layers.
//!
//! `weblayer_core` turns a subtree of a document into a tree of flat textured
//! surfaces for a 3D scene. Elements carrying the `data-layer` attribute
//! become layer boundaries; each boundary is rasterized, state by state, from
//! a shared clone of the document, and placed in world space relative to the
//! root's box. The crate is platform-independent: the document, the
//! rasterizer and the platform observers are reached through the
//! [`Element`](dom::Element), [`Rasterizer`](raster::Rasterizer) and
//! [`Host`](host::Host) traits.
//!
//! # Architecture
//!
//! ```text
//!   Host observers (mutation, resize, input/focus)
//!       │
//!       ▼
//!   ChangeSink ──► change queue ──► coordinator (WebLayer::run)
//!                                        │ one batch at a time
//!                                        ▼
//!                         classify ──► Structural ──► rebuild tree
//!                            │                            │
//!                            │ Local                      ▼
//!                            │                 Snapshotter (one clone,
//!                            │                 newest generation wins)
//!                            ▼                            │
//!                   patch snapshot ──► rasterize layers ◄─┘
//!                                           │
//!                                           ▼
//!                         LayerStore (textures per state)
//!                                           │
//!   WebLayer::tick() ──► FrameChanges ──► Presenter::apply()
//! ```
//!
//! **[`layer`]**: Layer nodes, ids and the [`LayerStore`](layer::LayerStore)
//! tree. Nodes move `Active -> PendingRemoval -> Disposed`.
//!
//! **[`dirty`]**: Channels for `understory_dirty` tracking. Pose, opacity
//! and content movement is drained once per tick; the refresh channel
//! deduplicates local refreshes within a batch.
//!
//! **[`dom`]**: The [`Element`](dom::Element) contract, marker attribute
//! names and change event types.
//!
//! **[`tagger`]**: Identity tokens, boundary markers and per-element
//! attribute parsing.
//!
//! **[`snapshot`]**: Cloned documents indexed by identity token.
//!
//! **[`raster`]**: The [`Rasterizer`](raster::Rasterizer) contract and pixel
//! types.
//!
//! **[`host`]**: Platform services and the bounded change queue.
//!
//! **[`transition`]**: Per-tick easing and [`FrameChanges`].
//!
//! **[`backend`]**: The [`Presenter`](backend::Presenter) trait that scene
//! backends implement to apply frame changes.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! refresh pipeline instrumentation.
//!
//! **[`transform`]**: 3D affine transform type for layer placement.
//!
//! The async pieces are single-threaded: futures are `!Send` and share state
//! through `Rc<RefCell<_>>`. Spawn [`WebLayer::run`] on a local executor.

pub mod backend;
pub mod config;
pub mod dirty;
pub mod dom;
pub mod error;
pub mod host;
pub mod layer;
pub mod raster;
pub mod snapshot;
pub mod tagger;
pub mod trace;
pub mod transform;
pub mod transition;

mod bridge;
mod root;
mod scheduler;
mod tree;

#[cfg(test)]
mod test_support;

pub use backend::Presenter;
pub use config::WebLayerConfig;
pub use dom::{ChangeEvent, ChangeRecord, Element};
pub use error::LayerError;
pub use host::{ChangeSink, Host, Observation};
pub use layer::{LayerId, LayerState};
pub use raster::{RasterizeError, Rasterizer};
pub use root::WebLayer;
pub use trace::{NoopSink, TraceSink};
pub use transition::FrameChanges;
