// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer identity.

use core::fmt;

/// A handle to a layer in a [`LayerStore`](super::LayerStore).
///
/// Ids are allocated monotonically per tree and never reused, so a handle to
/// a disposed layer can never alias a newer one. The numeric value is what
/// the engine writes into the element's boundary marker.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub(crate) u32);

impl LayerId {
    /// Returns the raw id, as stored in the boundary marker.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
