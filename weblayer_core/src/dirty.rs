// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The layer store keeps one [`understory_dirty`] tracker keyed by raw layer
//! id. Each channel is an independent category of change. All channels are
//! local-only: marking a layer never marks its descendants. Effective opacity
//! is recomputed for every layer on every tick, so nothing needs to
//! propagate.
//!
//! # Consumption
//!
//! [`POSE`], [`OPACITY`], [`CONTENT`] and [`TOPOLOGY`] are drained by
//! [`WebLayer::tick`](crate::WebLayer::tick) into
//! [`FrameChanges`](crate::FrameChanges).
//!
//! [`REFRESH`] is internal to the change coordinator: it collects the layers
//! that need a local refresh while a batch is classified, and is drained
//! once per batch so each layer is refreshed at most once.

use understory_dirty::Channel;

/// Interpolated position or scale moved.
pub const POSE: Channel = Channel::new(0);

/// Interpolated opacity moved.
pub const OPACITY: Channel = Channel::new(1);

/// Displayed texture changed, either by a commit or a state switch.
pub const CONTENT: Channel = Channel::new(2);

/// A layer was created, attached, or disposed.
pub const TOPOLOGY: Channel = Channel::new(3);

/// Layer needs a local refresh at the end of the current batch.
pub const REFRESH: Channel = Channel::new(4);
