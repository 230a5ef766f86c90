// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors returned by the public layer API.

use crate::layer::LayerId;

/// Errors from [`WebLayer`](crate::WebLayer) operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayerError {
    /// No live layer has this id.
    #[error("no live layer with id {0:?}")]
    UnknownLayer(LayerId),
    /// The layer does not declare the requested state.
    #[error("layer {layer:?} has no state named `{state}`")]
    UnknownState {
        /// The layer.
        layer: LayerId,
        /// The requested state name.
        state: String,
    },
    /// The layer tree was disposed.
    #[error("layer tree has been disposed")]
    Disposed,
}
