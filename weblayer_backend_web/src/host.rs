// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Host`] over the browser window.
//!
//! Mutations are reported by a `MutationObserver` on the root subtree
//! (child lists, attributes and character data, with old values). Form
//! interaction is reported by capturing `input`, `change`, `focus` and `blur`
//! listeners on the root, since those never surface as mutations. Size
//! changes come from one `ResizeObserver` per boundary element.
//!
//! Changes inside foreign content (SVG, MathML) cannot be patched through
//! [`WebElement`], so they are reported as a child-list change on the
//! nearest HTML ancestor, which forces a fresh snapshot.
//!
//! Every callback only pushes into the [`ChangeSink`]; the engine's
//! coordinator does the rest.

use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use web_sys::{
    Document, Event, HtmlElement, MutationObserver, MutationObserverInit, MutationRecord, Node,
    ResizeObserver, ResizeObserverEntry, Window,
};

use kurbo::Size;
use weblayer_core::dom::{ChangeEvent, ChangeRecord, InteractionKind};
use weblayer_core::host::{ChangeSink, Host, Observation};

use crate::element::WebElement;

type MutationClosure = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;
type ResizeClosure = Closure<dyn FnMut(js_sys::Array, ResizeObserver)>;
type EventClosure = Closure<dyn FnMut(Event)>;

/// Browser platform services.
#[derive(Clone, Debug)]
pub struct WebHost {
    window: Window,
    document: Document,
}

impl WebHost {
    /// Uses the global `window`, if there is one with a document.
    #[must_use]
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        Self::from_window(window)
    }

    /// Uses `window` and its document.
    #[must_use]
    pub fn from_window(window: Window) -> Option<Self> {
        let document = window.document()?;
        Some(Self { window, document })
    }
}

impl Host<WebElement> for WebHost {
    fn device_pixel_ratio(&self) -> f64 {
        self.window.device_pixel_ratio()
    }

    fn viewport_size(&self) -> Size {
        let width = self.window.inner_width().ok().and_then(|v| v.as_f64());
        let height = self.window.inner_height().ok().and_then(|v| v.as_f64());
        Size::new(width.unwrap_or(0.0), height.unwrap_or(0.0))
    }

    fn create_offscreen_container(&self) -> Option<WebElement> {
        let body = self.document.body()?;
        let container = self
            .document
            .create_element("div")
            .ok()?
            .dyn_into::<HtmlElement>()
            .ok()?;
        let style = container.style();
        // Off-screen but laid out; hiding it would also hide the clones.
        let _ = style.set_property("position", "absolute");
        let _ = style.set_property("left", "-100000px");
        let _ = style.set_property("top", "0");
        let _ = style.set_property("pointer-events", "none");
        let _ = container.set_attribute("aria-hidden", "true");
        body.append_child(&container).ok()?;
        Some(WebElement::new(container))
    }

    fn observe_mutations(
        &self,
        root: &WebElement,
        sink: ChangeSink<WebElement>,
    ) -> Box<dyn Observation> {
        let target = root.as_html().clone();
        let mut observation = MutationObservation {
            target: target.clone(),
            observer: None,
            _callback: None,
            listeners: Vec::new(),
        };

        let mut records_sink = sink.clone();
        let observed = target.clone();
        let callback: MutationClosure = Closure::wrap(Box::new(
            move |records: js_sys::Array, _observer: MutationObserver| {
                for record in records.iter() {
                    let record: MutationRecord = record.unchecked_into();
                    if let Some(event) = translate_record(&record, &observed) {
                        records_sink.push(event);
                    }
                }
            },
        )
            as Box<dyn FnMut(js_sys::Array, MutationObserver)>);
        match MutationObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => {
                let init = MutationObserverInit::new();
                init.set_child_list(true);
                init.set_subtree(true);
                init.set_attributes(true);
                init.set_attribute_old_value(true);
                init.set_character_data(true);
                init.set_character_data_old_value(true);
                if let Err(err) = observer.observe_with_options(&target, &init) {
                    tracing::warn!(?err, "mutation observation rejected");
                }
                observation.observer = Some(observer);
                observation._callback = Some(callback);
            }
            Err(err) => tracing::warn!(?err, "MutationObserver unavailable"),
        }

        for kind in InteractionKind::ALL {
            let mut sink = sink.clone();
            let listener: EventClosure = Closure::wrap(Box::new(move |event: Event| {
                let Some(target) = event
                    .target()
                    .and_then(|t| t.dyn_into::<HtmlElement>().ok())
                else {
                    return;
                };
                sink.push(ChangeEvent::Interaction {
                    target: WebElement::new(target),
                    kind,
                });
            }) as Box<dyn FnMut(Event)>);
            // Capture: focus and blur do not bubble.
            match target.add_event_listener_with_callback_and_bool(
                kind.event_type(),
                listener.as_ref().unchecked_ref(),
                true,
            ) {
                Ok(()) => observation.listeners.push((kind, listener)),
                Err(err) => tracing::warn!(event = kind.event_type(), ?err, "listener rejected"),
            }
        }

        Box::new(observation)
    }

    fn observe_resize(
        &self,
        element: &WebElement,
        sink: ChangeSink<WebElement>,
    ) -> Box<dyn Observation> {
        let mut sink = sink;
        let callback: ResizeClosure = Closure::wrap(Box::new(
            move |entries: js_sys::Array, _observer: ResizeObserver| {
                for entry in entries.iter() {
                    let entry: ResizeObserverEntry = entry.unchecked_into();
                    if let Ok(target) = entry.target().dyn_into::<HtmlElement>() {
                        sink.push(ChangeEvent::Resize(WebElement::new(target)));
                    }
                }
            },
        )
            as Box<dyn FnMut(js_sys::Array, ResizeObserver)>);

        let observer = match ResizeObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => {
                observer.observe(element.as_html());
                Some(observer)
            }
            Err(err) => {
                tracing::warn!(?err, "ResizeObserver unavailable");
                None
            }
        };
        Box::new(ResizeObservation {
            observer,
            _callback: Some(callback),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecordKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// How a record of `record_type` is reported, given whether the element it
/// concerns is an HTML element.
fn record_kind(record_type: &str, html: bool) -> Option<RecordKind> {
    let kind = match record_type {
        "childList" => RecordKind::ChildList,
        "attributes" => RecordKind::Attributes,
        "characterData" => RecordKind::CharacterData,
        _ => return None,
    };
    Some(if html { kind } else { RecordKind::ChildList })
}

/// Converts one mutation record into a change event.
///
/// Character-data records target a text node; they concern its parent
/// element.
fn translate_record(record: &MutationRecord, root: &HtmlElement) -> Option<ChangeEvent<WebElement>> {
    let node = record.target()?;
    let record_type = record.type_();
    let owner = if record_type == "characterData" {
        node.parent_node().unwrap_or_else(|| node.clone())
    } else {
        node.clone()
    };
    let html = WebElement::from_node(&owner);
    let change = match record_kind(&record_type, html.is_some())? {
        RecordKind::ChildList => ChangeRecord::ChildList {
            target: nearest_html(&owner, root),
        },
        RecordKind::Attributes => ChangeRecord::Attributes {
            target: html?,
            name: record.attribute_name()?,
            old_value: record.old_value(),
        },
        RecordKind::CharacterData => ChangeRecord::CharacterData {
            target: html?,
            old_value: record.old_value(),
            new_value: node.text_content().unwrap_or_default(),
        },
    };
    Some(ChangeEvent::Mutation(change))
}

/// The closest HTML element at or above `node`, or the observed root.
fn nearest_html(node: &Node, root: &HtmlElement) -> WebElement {
    let mut current = Some(node.clone());
    while let Some(node) = current {
        if let Some(element) = WebElement::from_node(&node) {
            return element;
        }
        current = node.parent_node();
    }
    WebElement::new(root.clone())
}

struct MutationObservation {
    target: HtmlElement,
    observer: Option<MutationObserver>,
    _callback: Option<MutationClosure>,
    listeners: Vec<(InteractionKind, EventClosure)>,
}

impl Observation for MutationObservation {
    fn disconnect(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        for (kind, listener) in self.listeners.drain(..) {
            let _ = self.target.remove_event_listener_with_callback_and_bool(
                kind.event_type(),
                listener.as_ref().unchecked_ref(),
                true,
            );
        }
        self._callback = None;
    }
}

impl Drop for MutationObservation {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct ResizeObservation {
    observer: Option<ResizeObserver>,
    _callback: Option<ResizeClosure>,
}

impl Observation for ResizeObservation {
    fn disconnect(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        self._callback = None;
    }
}

impl Drop for ResizeObservation {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_records_keep_their_kind() {
        assert_eq!(record_kind("childList", true), Some(RecordKind::ChildList));
        assert_eq!(record_kind("attributes", true), Some(RecordKind::Attributes));
        assert_eq!(record_kind("characterData", true), Some(RecordKind::CharacterData));
        assert_eq!(record_kind("unknown", true), None);
    }

    #[test]
    fn foreign_content_changes_become_child_list() {
        for record_type in ["childList", "attributes", "characterData"] {
            assert_eq!(record_kind(record_type, false), Some(RecordKind::ChildList));
        }
    }
}
