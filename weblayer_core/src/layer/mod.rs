// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree data model.
//!
//! A *layer* mirrors one layer-boundary element of the live document. Each
//! layer has:
//!
//! - An identity ([`LayerId`]), written back into the element's boundary
//!   marker and never reused.
//! - Topology: a parent and an ordered child list matching the DOM nesting
//!   of boundary elements.
//! - **Layout** recomputed before every refresh: bounding rect, pixel ratio
//!   and the default [`Pose`] derived from them.
//! - **Content**: one [`Texture`](crate::raster::Texture) per declared state
//!   and the currently selected state.
//! - **Presentation** advanced by ticks: the interpolated pose and opacity.
//!
//! Layers leave the tree only through the two-phase removal lifecycle
//! described on [`LayerState`].

mod id;
mod node;
mod store;

pub use id::LayerId;
pub use node::{ContentNode, DEFAULT_STATE, LayerNode, LayerState, Pose};
pub use store::LayerStore;
