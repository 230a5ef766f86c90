// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element tagging and per-element configuration.
//!
//! Every element the tree builder visits receives a stable identity token in
//! [`UID_ATTRIBUTE`]. Because the rasterizer's document clone copies
//! attributes, the token is also present on the element's counterpart in a
//! [snapshot](crate::snapshot), which indexes counterparts by token.
//!
//! Boundary elements additionally carry their layer id in
//! [`LAYER_ATTRIBUTE`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::MIN_PIXEL_RATIO;
use crate::dom::{
    Element, LAYER_ATTRIBUTE, PIXEL_RATIO_ATTRIBUTE, STATES_ATTRIBUTE, UID_ATTRIBUTE,
};
use crate::layer::{DEFAULT_STATE, LayerId};

// Tokens must be unique per document, and several trees may share one.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Returns the element's identity token, assigning one on first visit.
pub fn ensure_uid<E: Element>(element: &E) -> String {
    if let Some(uid) = element.attribute(UID_ATTRIBUTE) {
        return uid;
    }
    let uid = format!("wl-{}", NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
    element.set_attribute(UID_ATTRIBUTE, &uid);
    uid
}

/// Returns the element's identity token, if it has one.
#[must_use]
pub fn uid<E: Element>(element: &E) -> Option<String> {
    element.attribute(UID_ATTRIBUTE)
}

/// Whether the element is marked as a layer boundary.
#[must_use]
pub fn is_boundary<E: Element>(element: &E) -> bool {
    element.attribute(LAYER_ATTRIBUTE).is_some()
}

/// The layer id recorded on a boundary element.
///
/// Returns `None` for unmarked elements and for boundaries that have not
/// been assigned an id yet.
#[must_use]
pub fn layer_id<E: Element>(element: &E) -> Option<LayerId> {
    element
        .attribute(LAYER_ATTRIBUTE)?
        .trim()
        .parse::<u32>()
        .ok()
        .map(LayerId)
}

/// Marks `element` as the boundary of layer `id`.
pub fn mark_boundary<E: Element>(element: &E, id: LayerId) {
    element.set_attribute(LAYER_ATTRIBUTE, &id.0.to_string());
}

/// The per-element pixel-ratio override, if present and valid.
#[must_use]
pub fn pixel_ratio_override<E: Element>(element: &E) -> Option<f64> {
    element
        .attribute(PIXEL_RATIO_ATTRIBUTE)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
}

/// Resolves the pixel ratio for `element`.
///
/// Precedence: element override, then `configured`, then `platform`. The
/// result is never below [`MIN_PIXEL_RATIO`].
#[must_use]
pub fn resolve_pixel_ratio<E: Element>(
    element: &E,
    configured: Option<f64>,
    platform: f64,
) -> f64 {
    let ratio = pixel_ratio_override(element)
        .or(configured)
        .unwrap_or(platform);
    if ratio.is_nan() {
        return MIN_PIXEL_RATIO;
    }
    ratio.max(MIN_PIXEL_RATIO)
}

/// The ordered state list of `element`: [`DEFAULT_STATE`] followed by each
/// distinct declared name.
#[must_use]
pub fn states<E: Element>(element: &E) -> Vec<String> {
    let mut states = vec![DEFAULT_STATE.to_owned()];
    if let Some(declared) = element.attribute(STATES_ATTRIBUTE) {
        for name in declared.split_whitespace() {
            if !states.iter().any(|s| s == name) {
                states.push(name.to_owned());
            }
        }
    }
    states
}
