// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine configuration.

/// Smallest pixel ratio a layer is rasterized at.
pub const MIN_PIXEL_RATIO: f64 = 1e-6;

/// Signature of the per-tick interpolation hook: `(current, target, factor)`.
pub type Interpolate = fn(f64, f64, f64) -> f64;

/// Per-tick linear interpolation: moves `factor` of the remaining distance.
#[must_use]
pub fn lerp(current: f64, target: f64, factor: f64) -> f64 {
    current + (target - current) * factor
}

/// Configuration for a [`WebLayer`](crate::WebLayer) tree.
#[derive(Clone, Copy, Debug)]
pub struct WebLayerConfig {
    /// Engine-level pixel ratio. Overrides the platform default; per-element
    /// overrides win over this.
    pub pixel_ratio: Option<f64>,
    /// World units per CSS pixel.
    pub pixel_size: f64,
    /// Offset along z between consecutive nesting depths, in world units.
    pub layer_separation: f64,
    /// Fraction of the remaining distance covered per tick.
    pub lerp_factor: f64,
    /// Distance at which pose and opacity snap to their target.
    pub tolerance: f64,
    /// Capacity of the bounded change queue.
    pub queue_capacity: usize,
    /// Background fill passed to the rasterizer.
    pub background_color: Option<[u8; 4]>,
    /// Whether the rasterizer may draw tainting content.
    pub allow_unsafe_content: bool,
    /// Interpolation hook used by the transition controller.
    pub interpolate: Interpolate,
}

impl WebLayerConfig {
    /// Defaults for immersive scenes: 1 CSS pixel is 1 mm.
    #[must_use]
    pub const fn immersive() -> Self {
        Self {
            pixel_ratio: None,
            pixel_size: 0.001,
            layer_separation: 0.001,
            lerp_factor: 0.2,
            tolerance: 1e-4,
            queue_capacity: 256,
            background_color: None,
            allow_unsafe_content: false,
            interpolate: lerp,
        }
    }

    /// Snaps every transition on the first tick.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            lerp_factor: 1.0,
            ..Self::immersive()
        }
    }
}

impl Default for WebLayerConfig {
    fn default() -> Self {
        Self::immersive()
    }
}
