// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The DOM contract consumed by the engine.
//!
//! `weblayer_core` never talks to a browser directly. Everything it needs from
//! a document is expressed by the [`Element`] trait, which backends implement
//! for their native element handle (see `weblayer_backend_web`) and tests
//! implement with an in-memory tree.
//!
//! The same trait covers both the *live* document and the detached
//! [snapshot](crate::snapshot) copy the rasterizer works from, so patches can
//! be copied from one to the other with plain trait calls.
//!
//! # Marker attributes
//!
//! The engine reads and writes a small set of attributes on live elements:
//!
//! | Attribute                  | Meaning                                          |
//! |----------------------------|--------------------------------------------------|
//! | [`LAYER_ATTRIBUTE`]        | Layer boundary; holds the assigned layer id.     |
//! | [`UID_ATTRIBUTE`]          | Stable identity token, copied into snapshots.    |
//! | [`PIXEL_RATIO_ATTRIBUTE`]  | Optional per-element pixel-ratio override.       |
//! | [`STATES_ATTRIBUTE`]       | Whitespace-separated list of named states.       |

use core::fmt;

use kurbo::Rect;

/// Marks an element as a layer boundary. The engine overwrites the value
/// with the numeric id of the layer it assigned.
pub const LAYER_ATTRIBUTE: &str = "data-layer";

/// Opaque stable-identity token used to find an element's counterpart in a
/// snapshot.
pub const UID_ATTRIBUTE: &str = "data-layer-uid";

/// Optional positive float overriding the pixel ratio for one layer.
pub const PIXEL_RATIO_ATTRIBUTE: &str = "data-layer-pixel-ratio";

/// Whitespace-separated list of state names rasterized ahead of time.
pub const STATES_ATTRIBUTE: &str = "data-layer-states";

/// Form-control state that does not round-trip through attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FormState {
    /// Current `value` of an input, select or textarea.
    pub value: Option<String>,
    /// Current `checked` flag of a checkbox or radio input.
    pub checked: Option<bool>,
}

/// A handle to a DOM element.
///
/// Handles are cheap to clone and compare by node identity: two handles are
/// equal when they refer to the same underlying node.
///
/// Implementations must not panic; operations that the platform rejects are
/// ignored.
pub trait Element: Clone + PartialEq + fmt::Debug + 'static {
    /// Returns the value of the named attribute.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Sets the named attribute.
    fn set_attribute(&self, name: &str, value: &str);

    /// Removes the named attribute.
    fn remove_attribute(&self, name: &str);

    /// Returns all attributes as `(name, value)` pairs in document order.
    fn attributes(&self) -> Vec<(String, String)>;

    /// Returns the element children, in document order.
    fn children(&self) -> Vec<Self>;

    /// Returns the parent element, if any.
    fn parent(&self) -> Option<Self>;

    /// Whether the element is attached to a document.
    fn is_connected(&self) -> bool;

    /// The element's border box in viewport coordinates (CSS pixels).
    fn bounding_rect(&self) -> Rect;

    /// Adds a class to the element's class list.
    fn add_class(&self, name: &str);

    /// Removes a class from the element's class list.
    fn remove_class(&self, name: &str);

    /// Returns the concatenated data of the element's direct text-node
    /// children.
    fn own_text(&self) -> String;

    /// Replaces the element's direct text-node children with `text`, leaving
    /// element children in place.
    fn set_own_text(&self, text: &str);

    /// Returns form-control state, or `None` for elements that are not form
    /// controls.
    fn form_state(&self) -> Option<FormState>;

    /// Applies form-control state. Ignored for non-form elements.
    fn set_form_state(&self, state: &FormState);

    /// Appends `child` as the last child of this element.
    fn append_child(&self, child: &Self);

    /// Detaches this element from its parent.
    fn detach(&self);

    /// Whether this element is a form control (input, select, textarea, ...).
    fn is_form_control(&self) -> bool {
        self.form_state().is_some()
    }
}

/// A single platform mutation record.
#[derive(Clone, Debug)]
pub enum ChangeRecord<E> {
    /// Nodes were added or removed below `target`.
    ChildList {
        /// The element whose child list changed.
        target: E,
    },
    /// An attribute of `target` changed.
    Attributes {
        /// The element whose attribute changed.
        target: E,
        /// The attribute name.
        name: String,
        /// The value before the change.
        old_value: Option<String>,
    },
    /// A text node directly below `target` changed.
    ///
    /// Backends report the text node's parent element as the target.
    CharacterData {
        /// The parent element of the changed text node.
        target: E,
        /// The text before the change.
        old_value: Option<String>,
        /// The text after the change.
        new_value: String,
    },
}

impl<E: Element> ChangeRecord<E> {
    /// The element this record refers to.
    #[must_use]
    pub fn target(&self) -> &E {
        match self {
            Self::ChildList { target }
            | Self::Attributes { target, .. }
            | Self::CharacterData { target, .. } => target,
        }
    }

    /// Whether the record reflects an actual change in value.
    ///
    /// Platforms report attribute writes that store the same value; those
    /// records are ignored. Child-list records always count.
    #[must_use]
    pub fn is_effective(&self) -> bool {
        match self {
            Self::ChildList { .. } => true,
            Self::Attributes {
                target,
                name,
                old_value,
            } => target.attribute(name) != *old_value,
            Self::CharacterData {
                old_value,
                new_value,
                ..
            } => old_value.as_deref() != Some(new_value.as_str()),
        }
    }
}

/// Interactive DOM events that are forwarded to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    /// `input` event.
    Input,
    /// `change` event.
    Change,
    /// `focus` event.
    Focus,
    /// `blur` event.
    Blur,
}

impl InteractionKind {
    /// All forwarded kinds.
    pub const ALL: [Self; 4] = [Self::Input, Self::Change, Self::Focus, Self::Blur];

    /// The DOM event type name.
    #[must_use]
    pub const fn event_type(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Change => "change",
            Self::Focus => "focus",
            Self::Blur => "blur",
        }
    }
}

/// One entry of the engine's change stream.
#[derive(Clone, Debug)]
pub enum ChangeEvent<E> {
    /// A mutation record.
    Mutation(ChangeRecord<E>),
    /// An observed element changed size.
    Resize(E),
    /// An interactive event fired on `target`.
    Interaction {
        /// The event target.
        target: E,
        /// Which event fired.
        kind: InteractionKind,
    },
}
