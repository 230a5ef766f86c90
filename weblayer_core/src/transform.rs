// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column-major 4×4 surface transform.
//!
//! Layer surfaces are unit quads that are scaled to the element's size and
//! then translated to its position, so only translation, scale and their
//! product are needed here.

use core::ops::Mul;

/// A column-major 4×4 affine transform.
///
/// Each inner array is one column, matching the layout WebGL and most scene
/// graphs expect for uniform upload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self::from_scale(1.0, 1.0, 1.0);

    /// Creates a pure translation.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Returns column `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= 4`.
    #[inline]
    #[must_use]
    pub const fn col(self, i: usize) -> [f64; 4] {
        self.cols[i]
    }

    /// The translation part.
    #[inline]
    #[must_use]
    pub const fn translation(self) -> [f64; 3] {
        let [x, y, z, _] = self.cols[3];
        [x, y, z]
    }

    /// Flattens to sixteen `f32`s in column order, ready for upload.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "GPU uniforms are f32")]
    pub fn to_cols_array_f32(self) -> [f32; 16] {
        let mut out = [0.0_f32; 16];
        for (slot, v) in out.iter_mut().zip(self.cols.iter().flatten()) {
            *slot = *v as f32;
        }
        out
    }

    /// Is every element [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        for (j, col) in out.iter_mut().enumerate() {
            for (i, v) in col.iter_mut().enumerate() {
                *v = a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
            }
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_multiply() {
        let t = Transform3d::from_translation(1.0, 2.0, 3.0);
        assert_eq!(Transform3d::IDENTITY * t, t);
        assert_eq!(t * Transform3d::IDENTITY, t);
    }

    #[test]
    fn scale_then_translate() {
        let combined = Transform3d::from_translation(3.0, 4.0, 0.5) * Transform3d::from_scale(2.0, 5.0, 1.0);
        assert_eq!(combined.col(0), [2.0, 0.0, 0.0, 0.0]);
        assert_eq!(combined.col(1), [0.0, 5.0, 0.0, 0.0]);
        assert_eq!(combined.translation(), [3.0, 4.0, 0.5]);
    }

    #[test]
    fn flattened_layout_is_column_major() {
        let flat = Transform3d::from_translation(7.0, 8.0, 9.0).to_cols_array_f32();
        assert_eq!(&flat[12..], &[7.0, 8.0, 9.0, 1.0]);
        assert_eq!(flat[0], 1.0);
    }

    #[test]
    fn non_finite_detected() {
        let mut t = Transform3d::IDENTITY;
        assert!(t.is_finite());
        t.cols[2][1] = f64::NAN;
        assert!(!t.is_finite());
    }
}
