// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Element`] over `web_sys::HtmlElement`.
//!
//! Every operation goes straight to the DOM. Calls the browser rejects (an
//! invalid attribute name, a hierarchy error) are logged and ignored, so the
//! engine never sees a JS exception.

use kurbo::Rect;
use wasm_bindgen::JsCast as _;
use web_sys::{HtmlElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, Node};

use weblayer_core::dom::{Element, FormState};

/// A handle to a live or cloned HTML element.
///
/// Equality is node identity. Non-HTML children (SVG, MathML) are not
/// reported by [`children`](Element::children) and cannot be boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebElement(HtmlElement);

impl WebElement {
    /// Wraps an element.
    #[must_use]
    pub fn new(element: HtmlElement) -> Self {
        Self(element)
    }

    /// The wrapped element.
    #[must_use]
    pub fn as_html(&self) -> &HtmlElement {
        &self.0
    }

    /// Wraps `node` if it is an HTML element.
    #[must_use]
    pub fn from_node(node: &Node) -> Option<Self> {
        node.dyn_ref::<HtmlElement>().cloned().map(Self)
    }

    fn text_nodes(&self) -> Vec<Node> {
        let nodes = self.0.child_nodes();
        (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter(|node| node.node_type() == Node::TEXT_NODE)
            .collect()
    }
}

impl From<HtmlElement> for WebElement {
    fn from(element: HtmlElement) -> Self {
        Self(element)
    }
}

impl Element for WebElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) {
        if let Err(err) = self.0.set_attribute(name, value) {
            tracing::debug!(name, ?err, "set_attribute rejected");
        }
    }

    fn remove_attribute(&self, name: &str) {
        if let Err(err) = self.0.remove_attribute(name) {
            tracing::debug!(name, ?err, "remove_attribute rejected");
        }
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.0
            .get_attribute_names()
            .iter()
            .filter_map(|name| name.as_string())
            .filter_map(|name| {
                let value = self.0.get_attribute(&name)?;
                Some((name, value))
            })
            .collect()
    }

    fn children(&self) -> Vec<Self> {
        let children = self.0.children();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .filter_map(|el| el.dyn_into::<HtmlElement>().ok())
            .map(Self)
            .collect()
    }

    fn parent(&self) -> Option<Self> {
        self.0
            .parent_element()?
            .dyn_into::<HtmlElement>()
            .ok()
            .map(Self)
    }

    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    fn bounding_rect(&self) -> Rect {
        let r = self.0.get_bounding_client_rect();
        Rect::new(r.x(), r.y(), r.x() + r.width(), r.y() + r.height())
    }

    fn add_class(&self, name: &str) {
        if let Err(err) = self.0.class_list().add_1(name) {
            tracing::debug!(name, ?err, "class add rejected");
        }
    }

    fn remove_class(&self, name: &str) {
        if let Err(err) = self.0.class_list().remove_1(name) {
            tracing::debug!(name, ?err, "class remove rejected");
        }
    }

    fn own_text(&self) -> String {
        self.text_nodes()
            .iter()
            .filter_map(Node::text_content)
            .collect()
    }

    fn set_own_text(&self, text: &str) {
        let mut existing = self.text_nodes().into_iter();
        match existing.next() {
            Some(first) => first.set_text_content(Some(text)),
            None => {
                let Some(document) = self.0.owner_document() else {
                    return;
                };
                let node = document.create_text_node(text);
                let before = self.0.first_child();
                if let Err(err) = self.0.insert_before(&node, before.as_ref()) {
                    tracing::debug!(?err, "text insertion rejected");
                }
            }
        }
        for rest in existing {
            let _ = self.0.remove_child(&rest);
        }
    }

    fn form_state(&self) -> Option<FormState> {
        if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
            let checkable = matches!(input.type_().as_str(), "checkbox" | "radio");
            return Some(FormState {
                value: Some(input.value()),
                checked: checkable.then(|| input.checked()),
            });
        }
        if let Some(area) = self.0.dyn_ref::<HtmlTextAreaElement>() {
            return Some(FormState {
                value: Some(area.value()),
                checked: None,
            });
        }
        self.0
            .dyn_ref::<HtmlSelectElement>()
            .map(|select| FormState {
                value: Some(select.value()),
                checked: None,
            })
    }

    fn set_form_state(&self, state: &FormState) {
        if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
            if let Some(value) = &state.value {
                input.set_value(value);
            }
            if let Some(checked) = state.checked {
                input.set_checked(checked);
            }
        } else if let Some(area) = self.0.dyn_ref::<HtmlTextAreaElement>() {
            if let Some(value) = &state.value {
                area.set_value(value);
            }
        } else if let Some(select) = self.0.dyn_ref::<HtmlSelectElement>()
            && let Some(value) = &state.value
        {
            select.set_value(value);
        }
    }

    fn append_child(&self, child: &Self) {
        if let Err(err) = self.0.append_child(&child.0) {
            tracing::debug!(?err, "append_child rejected");
        }
    }

    fn detach(&self) {
        self.0.remove();
    }
}
