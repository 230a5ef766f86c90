// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured diagnostics for the refresh pipeline.
//!
//! [`TraceSink`] has one method per event, each defaulting to a no-op, so a
//! sink only overrides the events it cares about. The engine holds one sink
//! per tree (see [`WebLayer::set_trace_sink`](crate::WebLayer::set_trace_sink))
//! and calls it from the points where refresh decisions are made.
//!
//! Human-readable logging goes through `tracing` independently of the sink.

use std::cell::RefCell;
use std::rc::Rc;

use crate::layer::LayerId;
use crate::raster::RasterizeError;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why a structural refresh was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshReason {
    /// First refresh after construction.
    Initial,
    /// Requested through [`WebLayer::refresh`](crate::WebLayer::refresh).
    Explicit,
    /// A child-list mutation.
    ChildList,
    /// An observed element changed size.
    Resize,
    /// An interactive event on a form control.
    Interaction,
    /// The change queue overflowed, so changes may have been dropped.
    Overflow,
    /// A patchable change arrived while no snapshot was current.
    MissingSnapshot,
    /// A patchable change targeted an element absent from the snapshot.
    MissingCounterpart,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted once per processed change batch.
#[derive(Clone, Copy, Debug)]
pub struct BatchEvent {
    /// Number of change events in the batch.
    pub events: usize,
    /// Structural refresh triggered by the batch, if any.
    pub structural: Option<RefreshReason>,
    /// Number of layers refreshed locally.
    pub local: usize,
}

/// Emitted when a structural refresh starts.
#[derive(Clone, Copy, Debug)]
pub struct RefreshRequestedEvent {
    /// What triggered it.
    pub reason: RefreshReason,
    /// Live layers after the tree rebuild.
    pub layers: usize,
}

/// Emitted when a document clone becomes the current snapshot.
#[derive(Clone, Copy, Debug)]
pub struct SnapshotCommittedEvent {
    /// Generation of the committed snapshot.
    pub generation: u64,
    /// Number of indexed counterpart elements.
    pub indexed: usize,
}

/// Emitted when a document clone completes after being superseded.
#[derive(Clone, Copy, Debug)]
pub struct SnapshotDiscardedEvent {
    /// Generation of the discarded snapshot.
    pub generation: u64,
    /// Generation that superseded it.
    pub latest: u64,
}

/// Emitted when a layer state has been rasterized and committed.
#[derive(Clone, Copy, Debug)]
pub struct LayerRasterizedEvent<'a> {
    /// The layer.
    pub layer: LayerId,
    /// The rasterized state.
    pub state: &'a str,
    /// Snapshot generation the pixels came from.
    pub generation: u64,
    /// Output width in device pixels.
    pub width: u32,
    /// Output height in device pixels.
    pub height: u32,
}

/// Emitted when rasterizing a layer state failed.
#[derive(Clone, Copy, Debug)]
pub struct RasterizeFailedEvent<'a> {
    /// The layer.
    pub layer: LayerId,
    /// The state being rasterized, or `None` if the layer's counterpart was
    /// missing.
    pub state: Option<&'a str>,
    /// Snapshot generation used.
    pub generation: u64,
    /// The failure, if the rasterizer reported one.
    pub error: Option<&'a RasterizeError>,
}

/// Emitted when a layer is disposed.
#[derive(Clone, Copy, Debug)]
pub struct LayerRemovedEvent {
    /// The disposed layer.
    pub layer: LayerId,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives diagnostics from the refresh pipeline.
///
/// All methods have default no-op implementations.
pub trait TraceSink {
    /// Called after a change batch has been classified.
    fn on_batch(&mut self, e: &BatchEvent) {
        _ = e;
    }

    /// Called when a structural refresh starts.
    fn on_refresh_requested(&mut self, e: &RefreshRequestedEvent) {
        _ = e;
    }

    /// Called when a snapshot is committed as current.
    fn on_snapshot_committed(&mut self, e: &SnapshotCommittedEvent) {
        _ = e;
    }

    /// Called when a superseded snapshot is torn down.
    fn on_snapshot_discarded(&mut self, e: &SnapshotDiscardedEvent) {
        _ = e;
    }

    /// Called when a layer state texture is committed.
    fn on_layer_rasterized(&mut self, e: &LayerRasterizedEvent<'_>) {
        _ = e;
    }

    /// Called when rasterizing a layer state fails.
    fn on_rasterize_failed(&mut self, e: &RasterizeFailedEvent<'_>) {
        _ = e;
    }

    /// Called when a layer is disposed.
    fn on_layer_removed(&mut self, e: &LayerRemovedEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer
// ---------------------------------------------------------------------------

/// Shared handle to the tree's sink.
///
/// Cloned into every task that reports events. Sinks must not call back into
/// the engine.
#[derive(Clone)]
pub(crate) struct Tracer {
    sink: Rc<RefCell<Box<dyn TraceSink>>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self {
            sink: Rc::new(RefCell::new(Box::new(NoopSink))),
        }
    }
}

impl Tracer {
    pub(crate) fn set_sink(&self, sink: Box<dyn TraceSink>) {
        *self.sink.borrow_mut() = sink;
    }

    pub(crate) fn batch(&self, e: &BatchEvent) {
        self.sink.borrow_mut().on_batch(e);
    }

    pub(crate) fn refresh_requested(&self, e: &RefreshRequestedEvent) {
        self.sink.borrow_mut().on_refresh_requested(e);
    }

    pub(crate) fn snapshot_committed(&self, e: &SnapshotCommittedEvent) {
        self.sink.borrow_mut().on_snapshot_committed(e);
    }

    pub(crate) fn snapshot_discarded(&self, e: &SnapshotDiscardedEvent) {
        self.sink.borrow_mut().on_snapshot_discarded(e);
    }

    pub(crate) fn layer_rasterized(&self, e: &LayerRasterizedEvent<'_>) {
        self.sink.borrow_mut().on_layer_rasterized(e);
    }

    pub(crate) fn rasterize_failed(&self, e: &RasterizeFailedEvent<'_>) {
        self.sink.borrow_mut().on_rasterize_failed(e);
    }

    pub(crate) fn layer_removed(&self, e: &LayerRemovedEvent) {
        self.sink.borrow_mut().on_layer_removed(e);
    }
}
