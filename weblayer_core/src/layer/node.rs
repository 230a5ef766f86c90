// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer data.

use std::collections::HashMap;
use std::rc::Rc;

use kurbo::Rect;

use crate::config::WebLayerConfig;
use crate::host::Observation;
use crate::raster::{PixelBuffer, Texture};
use crate::transform::Transform3d;

use super::id::LayerId;

/// The implicit state every layer has.
pub const DEFAULT_STATE: &str = "default";

/// Smallest world-space extent of a layer surface.
const MIN_EXTENT: f64 = 1e-6;

/// Removal lifecycle of a layer.
///
/// `Active → PendingRemoval → Disposed`. Nodes in the store are only ever
/// `Active` or `PendingRemoval`; `Disposed` is reported for ids whose node has
/// been dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerState {
    /// Participates in refreshes and fades toward full opacity.
    Active,
    /// Its element left the document; fading out before disposal.
    PendingRemoval,
    /// Detached, observers disconnected, textures released.
    Disposed,
}

/// Position and scale of a layer surface in root space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Centre of the surface.
    pub position: [f64; 3],
    /// Surface extent along each axis.
    pub scale: [f64; 3],
}

impl Pose {
    /// The origin with unit scale.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        scale: [1.0; 3],
    };

    /// Returns the transform that scales a unit quad and then places it.
    #[must_use]
    pub fn to_transform(self) -> Transform3d {
        let [x, y, z] = self.position;
        let [sx, sy, sz] = self.scale;
        Transform3d::from_translation(x, y, z) * Transform3d::from_scale(sx, sy, sz)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// What a presenter needs to display one layer.
#[derive(Clone, Debug)]
pub struct ContentNode {
    /// Surface transform in root space.
    pub transform: Transform3d,
    /// Opacity including ancestors' fades.
    pub opacity: f64,
    /// The selected state.
    pub state: String,
    /// Pixels of the selected state, if rasterized yet.
    pub texture: Option<Rc<PixelBuffer>>,
}

/// One mirrored layer-boundary element.
pub struct LayerNode<E> {
    pub(crate) id: LayerId,
    pub(crate) element: E,
    pub(crate) parent: Option<LayerId>,
    pub(crate) children: Vec<LayerId>,
    pub(crate) depth: u32,
    pub(crate) lifecycle: LayerState,

    // -- Layout (recomputed before every refresh) --
    pub(crate) bounding_rect: Rect,
    pub(crate) pixel_ratio: f64,
    pub(crate) default_pose: Pose,
    pub(crate) laid_out: bool,

    // -- States and textures --
    pub(crate) states: Vec<String>,
    pub(crate) current_state: String,
    pub(crate) textures: HashMap<String, Texture>,

    // -- Presentation (driven by ticks) --
    pub(crate) pose: Pose,
    pub(crate) opacity: f64,
    pub(crate) effective_opacity: f64,
    pub(crate) attached: bool,

    pub(crate) observation: Option<Box<dyn Observation>>,
}

impl<E: core::fmt::Debug> core::fmt::Debug for LayerNode<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayerNode")
            .field("id", &self.id)
            .field("element", &self.element)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("lifecycle", &self.lifecycle)
            .field("bounding_rect", &self.bounding_rect)
            .field("states", &self.states)
            .field("current_state", &self.current_state)
            .field("textures", &self.textures.len())
            .field("opacity", &self.opacity)
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}

impl<E> LayerNode<E> {
    pub(crate) fn new(id: LayerId, element: E, parent: Option<LayerId>, depth: u32) -> Self {
        Self {
            id,
            element,
            parent,
            children: Vec::new(),
            depth,
            lifecycle: LayerState::Active,
            bounding_rect: Rect::ZERO,
            pixel_ratio: 1.0,
            default_pose: Pose::IDENTITY,
            laid_out: false,
            states: vec![DEFAULT_STATE.to_owned()],
            current_state: DEFAULT_STATE.to_owned(),
            textures: HashMap::new(),
            pose: Pose::IDENTITY,
            opacity: 0.0,
            effective_opacity: 0.0,
            attached: false,
            observation: None,
        }
    }

    /// The layer id.
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// The live boundary element.
    #[must_use]
    pub fn element(&self) -> &E {
        &self.element
    }

    /// The parent layer, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    /// Child layers in document order, followed by children still fading out.
    #[must_use]
    pub fn children(&self) -> &[LayerId] {
        &self.children
    }

    /// Nesting depth; the root is 0.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Removal lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> LayerState {
        self.lifecycle
    }

    /// Whether the layer has been scheduled for removal. Never clears.
    #[must_use]
    pub fn needs_removal(&self) -> bool {
        self.lifecycle != LayerState::Active
    }

    /// Border box of the element at the last refresh.
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        self.bounding_rect
    }

    /// Pixel ratio used for the last refresh.
    #[must_use]
    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Declared states, starting with [`DEFAULT_STATE`].
    #[must_use]
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// The selected state.
    #[must_use]
    pub fn current_state(&self) -> &str {
        &self.current_state
    }

    /// The texture for `state`, if rasterized.
    #[must_use]
    pub fn texture(&self, state: &str) -> Option<&Texture> {
        self.textures.get(state)
    }

    /// The texture for the selected state, if rasterized.
    #[must_use]
    pub fn current_texture(&self) -> Option<&Texture> {
        self.textures.get(&self.current_state)
    }

    /// Number of committed textures.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Target pose derived from the last layout.
    #[must_use]
    pub fn default_pose(&self) -> Pose {
        self.default_pose
    }

    /// Current interpolated pose.
    #[must_use]
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Current interpolated opacity of this layer alone.
    #[must_use]
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Whether the layer's scene content has been attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Scene content for this layer, once attached.
    #[must_use]
    pub fn content(&self) -> Option<ContentNode> {
        if !self.attached {
            return None;
        }
        Some(ContentNode {
            transform: self.pose.to_transform(),
            opacity: self.effective_opacity,
            state: self.current_state.clone(),
            texture: self.current_texture().map(|t| Rc::clone(&t.buffer)),
        })
    }

    /// Recomputes the default pose from `rect` relative to `root_rect`.
    ///
    /// The root box is centred on the origin with y pointing up; each nesting
    /// level moves one `layer_separation` toward the viewer.
    pub(crate) fn layout(&mut self, rect: Rect, root_rect: Rect, config: &WebLayerConfig) {
        self.bounding_rect = rect;
        let px = config.pixel_size;
        let width = rect.width() * px;
        let height = rect.height() * px;
        let left = (rect.x0 - root_rect.x0) * px;
        let top = (rect.y0 - root_rect.y0) * px;
        let origin_x = -root_rect.width() * px / 2.0;
        let origin_y = root_rect.height() * px / 2.0;
        self.default_pose = Pose {
            position: [
                origin_x + left + width / 2.0,
                origin_y - top - height / 2.0,
                f64::from(self.depth) * config.layer_separation,
            ],
            scale: [width.max(MIN_EXTENT), height.max(MIN_EXTENT), 1.0],
        };
        if !self.laid_out {
            // First layout places the surface directly; later ones animate.
            self.pose = self.default_pose;
            self.laid_out = true;
        }
    }

    /// Replaces the declared states, dropping textures of removed states.
    ///
    /// Returns `true` if the selected state was reset to the default.
    pub(crate) fn set_states(&mut self, states: Vec<String>) -> bool {
        self.textures.retain(|name, _| states.contains(name));
        self.states = states;
        if self.states.contains(&self.current_state) {
            false
        } else {
            self.current_state = DEFAULT_STATE.to_owned();
            true
        }
    }

    /// Stores a rasterization result unless a newer one is already present.
    ///
    /// Returns `true` if the texture was committed.
    pub(crate) fn commit_texture(&mut self, state: &str, buffer: PixelBuffer, generation: u64) -> bool {
        if !self.states.iter().any(|s| s == state) {
            return false;
        }
        if self
            .textures
            .get(state)
            .is_some_and(|existing| existing.generation > generation)
        {
            return false;
        }
        self.textures.insert(
            state.to_owned(),
            Texture {
                state: state.to_owned(),
                buffer: Rc::new(buffer),
                generation,
            },
        );
        true
    }

    /// Releases observers and textures.
    pub(crate) fn release(&mut self) {
        if let Some(mut observation) = self.observation.take() {
            observation.disconnect();
        }
        self.textures.clear();
        self.attached = false;
    }
}
