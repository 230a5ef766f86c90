// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory DOM, host and rasterizer used by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash as _, Hasher as _};
use std::rc::{Rc, Weak};

use futures::FutureExt as _;
use futures::channel::oneshot;
use futures::future::{self, LocalBoxFuture};
use kurbo::{Rect, Size};

use crate::dom::{Element, FormState, UID_ATTRIBUTE};
use crate::host::{ChangeSink, Host, Observation};
use crate::raster::{ClonedDocument, PixelBuffer, RasterizeError, RasterizeOptions, Rasterizer};

// ---------------------------------------------------------------------------
// TestElement
// ---------------------------------------------------------------------------

/// Marks containers holding snapshot copies.
pub(crate) const SNAPSHOT_MARKER: &str = "data-mock-snapshot";

#[derive(Debug, Default)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<TestElement>,
    parent: Weak<RefCell<NodeData>>,
    text: String,
    rect: Rect,
    form: Option<FormState>,
    is_document: bool,
}

/// A reference-counted in-memory element.
#[derive(Clone)]
pub(crate) struct TestElement(Rc<RefCell<NodeData>>);

/// Creates a document node. Elements below it are connected.
pub(crate) fn document() -> TestElement {
    let el = TestElement::new("#document");
    el.0.borrow_mut().is_document = true;
    el
}

impl TestElement {
    pub(crate) fn new(tag: &str) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            tag: tag.to_owned(),
            ..NodeData::default()
        })))
    }

    pub(crate) fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub(crate) fn with_text(self, text: &str) -> Self {
        self.set_own_text(text);
        self
    }

    pub(crate) fn with_rect(self, rect: Rect) -> Self {
        self.set_rect(rect);
        self
    }

    pub(crate) fn with_form_state(self, state: FormState) -> Self {
        self.0.borrow_mut().form = Some(state);
        self
    }

    pub(crate) fn set_rect(&self, rect: Rect) {
        self.0.borrow_mut().rect = rect;
    }

    pub(crate) fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub(crate) fn has_class(&self, name: &str) -> bool {
        self.attribute("class")
            .is_some_and(|c| c.split_whitespace().any(|n| n == name))
    }

    /// Copies this element and its subtree, leaving out parked snapshot
    /// copies. The copy is unattached.
    pub(crate) fn deep_clone(&self) -> Self {
        let data = self.0.borrow();
        let copy = Self(Rc::new(RefCell::new(NodeData {
            tag: data.tag.clone(),
            attributes: data.attributes.clone(),
            children: Vec::new(),
            parent: Weak::new(),
            text: data.text.clone(),
            rect: data.rect,
            form: data.form.clone(),
            is_document: false,
        })));
        for child in &data.children {
            if child.attribute(SNAPSHOT_MARKER).is_none() {
                copy.append_child(&child.deep_clone());
            }
        }
        copy
    }

    /// The topmost ancestor, or this element.
    pub(crate) fn top(&self) -> Self {
        let mut top = self.clone();
        while let Some(parent) = top.parent() {
            top = parent;
        }
        top
    }

    fn set_classes(&self, classes: &[&str]) {
        if classes.is_empty() {
            self.remove_attribute("class");
        } else {
            self.set_attribute("class", &classes.join(" "));
        }
    }
}

impl PartialEq for TestElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl core::fmt::Debug for TestElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let data = self.0.borrow();
        let uid = data
            .attributes
            .iter()
            .find(|(n, _)| n == UID_ATTRIBUTE)
            .map(|(_, v)| v.as_str());
        write!(f, "<{}", data.tag)?;
        if let Some(uid) = uid {
            write!(f, " {uid}")?;
        }
        write!(f, ">")
    }
}

impl Element for TestElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .borrow()
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&self, name: &str, value: &str) {
        let mut data = self.0.borrow_mut();
        match data.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_owned(),
            None => data.attributes.push((name.to_owned(), value.to_owned())),
        }
    }

    fn remove_attribute(&self, name: &str) {
        self.0.borrow_mut().attributes.retain(|(n, _)| n != name);
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.0.borrow().attributes.clone()
    }

    fn children(&self) -> Vec<Self> {
        self.0.borrow().children.clone()
    }

    fn parent(&self) -> Option<Self> {
        self.0.borrow().parent.upgrade().map(Self)
    }

    fn is_connected(&self) -> bool {
        self.top().0.borrow().is_document
    }

    fn bounding_rect(&self) -> Rect {
        self.0.borrow().rect
    }

    fn add_class(&self, name: &str) {
        let current = self.attribute("class").unwrap_or_default();
        let mut classes: Vec<&str> = current.split_whitespace().collect();
        if !classes.contains(&name) {
            classes.push(name);
        }
        self.set_classes(&classes);
    }

    fn remove_class(&self, name: &str) {
        let current = self.attribute("class").unwrap_or_default();
        let classes: Vec<&str> = current.split_whitespace().filter(|c| *c != name).collect();
        self.set_classes(&classes);
    }

    fn own_text(&self) -> String {
        self.0.borrow().text.clone()
    }

    fn set_own_text(&self, text: &str) {
        self.0.borrow_mut().text = text.to_owned();
    }

    fn form_state(&self) -> Option<FormState> {
        self.0.borrow().form.clone()
    }

    fn set_form_state(&self, state: &FormState) {
        let mut data = self.0.borrow_mut();
        if data.form.is_some() {
            data.form = Some(state.clone());
        }
    }

    fn append_child(&self, child: &Self) {
        child.detach();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    fn detach(&self) {
        let parent = self.0.borrow().parent.upgrade();
        if let Some(parent) = parent {
            parent.borrow_mut().children.retain(|c| c != self);
        }
        self.0.borrow_mut().parent = Weak::new();
    }
}

// ---------------------------------------------------------------------------
// MockHost
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct MockObservation {
    disconnects: Rc<Cell<usize>>,
    connected: bool,
}

impl Observation for MockObservation {
    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.disconnects.set(self.disconnects.get() + 1);
        }
    }
}

/// A host with a fixed display, recording observer registrations.
#[derive(Debug)]
pub(crate) struct MockHost {
    document: TestElement,
    resize: Cell<usize>,
    mutation: Cell<usize>,
    disconnects: Rc<Cell<usize>>,
    containers: RefCell<Vec<TestElement>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::with_document(document())
    }
}

impl MockHost {
    pub(crate) fn with_document(document: TestElement) -> Self {
        Self {
            document,
            resize: Cell::new(0),
            mutation: Cell::new(0),
            disconnects: Rc::new(Cell::new(0)),
            containers: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn resize_observations(&self) -> usize {
        self.resize.get()
    }

    pub(crate) fn mutation_observations(&self) -> usize {
        self.mutation.get()
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.get()
    }

    pub(crate) fn containers(&self) -> Vec<TestElement> {
        self.containers.borrow().clone()
    }

    fn observation(&self) -> Box<dyn Observation> {
        Box::new(MockObservation {
            disconnects: Rc::clone(&self.disconnects),
            connected: true,
        })
    }
}

impl Host<TestElement> for MockHost {
    fn device_pixel_ratio(&self) -> f64 {
        2.0
    }

    fn viewport_size(&self) -> Size {
        Size::new(1024.0, 768.0)
    }

    fn create_offscreen_container(&self) -> Option<TestElement> {
        let container = TestElement::new("div").with_attribute("aria-hidden", "true");
        self.document.append_child(&container);
        self.containers.borrow_mut().push(container.clone());
        Some(container)
    }

    fn observe_mutations(
        &self,
        _root: &TestElement,
        _sink: ChangeSink<TestElement>,
    ) -> Box<dyn Observation> {
        self.mutation.set(self.mutation.get() + 1);
        self.observation()
    }

    fn observe_resize(
        &self,
        _element: &TestElement,
        _sink: ChangeSink<TestElement>,
    ) -> Box<dyn Observation> {
        self.resize.set(self.resize.get() + 1);
        self.observation()
    }
}

// ---------------------------------------------------------------------------
// MockRasterizer
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MockState {
    hold_clones: bool,
    held: Vec<Option<oneshot::Sender<()>>>,
    clones: usize,
    fail_next_clone: Option<RasterizeError>,
    hold_rasters: bool,
    held_rasters: Vec<oneshot::Sender<()>>,
    detached_paints: usize,
    rasterized: Vec<RasterizeCall>,
    fail_next: Option<RasterizeError>,
}

/// One recorded [`Rasterizer::rasterize`] call.
#[derive(Clone, Debug)]
pub(crate) struct RasterizeCall {
    pub(crate) uid: Option<String>,
    pub(crate) classes: Option<String>,
    pub(crate) hidden: usize,
    pub(crate) scale: f64,
    pub(crate) target: TestElement,
}

/// A deterministic rasterizer.
///
/// Document clones are deep copies taken when requested, parked in a
/// container appended to the live document. Clones and rasterizations can
/// be held open until released. "Pixels" are a digest of the target's
/// subtree when painted: text, classes, form state and output size,
/// skipping hidden elements.
#[derive(Debug, Default)]
pub(crate) struct MockRasterizer {
    state: Rc<RefCell<MockState>>,
}

impl MockRasterizer {
    /// Holds every later clone until [`release_clone`](Self::release_clone).
    pub(crate) fn hold_clones(&self) {
        self.state.borrow_mut().hold_clones = true;
    }

    /// Releases the `n`th held clone (0-based, in request order).
    pub(crate) fn release_clone(&self, n: usize) {
        let sender = self.state.borrow_mut().held.get_mut(n).and_then(Option::take);
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    /// Holds every later rasterization until
    /// [`release_rasters`](Self::release_rasters).
    pub(crate) fn hold_rasters(&self) {
        self.state.borrow_mut().hold_rasters = true;
    }

    /// Stops holding and lets every held rasterization paint.
    pub(crate) fn release_rasters(&self) {
        let held = {
            let mut state = self.state.borrow_mut();
            state.hold_rasters = false;
            core::mem::take(&mut state.held_rasters)
        };
        for sender in held {
            let _ = sender.send(());
        }
    }

    /// Number of rasterizations waiting to paint.
    pub(crate) fn held_rasters(&self) -> usize {
        self.state.borrow().held_rasters.len()
    }

    /// Number of paints whose target was no longer in a document.
    pub(crate) fn detached_paints(&self) -> usize {
        self.state.borrow().detached_paints
    }

    pub(crate) fn fail_next_clone(&self, err: RasterizeError) {
        self.state.borrow_mut().fail_next_clone = Some(err);
    }

    pub(crate) fn fail_next(&self, err: RasterizeError) {
        self.state.borrow_mut().fail_next = Some(err);
    }

    pub(crate) fn clone_count(&self) -> usize {
        self.state.borrow().clones
    }

    pub(crate) fn rasterize_count(&self) -> usize {
        self.state.borrow().rasterized.len()
    }

    pub(crate) fn calls(&self) -> Vec<RasterizeCall> {
        self.state.borrow().rasterized.clone()
    }

    fn digest(el: &TestElement, hidden: &[TestElement], hasher: &mut DefaultHasher) {
        if hidden.contains(el) {
            return;
        }
        el.tag().hash(hasher);
        el.own_text().hash(hasher);
        el.attribute("class").hash(hasher);
        el.attribute("title").hash(hasher);
        el.form_state().hash(hasher);
        for child in el.children() {
            Self::digest(&child, hidden, hasher);
        }
    }
}

impl Rasterizer<TestElement> for MockRasterizer {
    fn clone_document(
        &self,
        root: &TestElement,
    ) -> LocalBoxFuture<'static, Result<ClonedDocument<TestElement>, RasterizeError>> {
        let mut state = self.state.borrow_mut();
        state.clones += 1;
        if let Some(err) = state.fail_next_clone.take() {
            return future::ready(Err(err)).boxed_local();
        }

        let live = root.top();
        let copy = live.deep_clone();
        let container = TestElement::new("div").with_attribute(SNAPSHOT_MARKER, "");
        container.append_child(&copy);
        if live.is_connected() {
            live.append_child(&container);
        }
        let document = ClonedDocument {
            root: copy,
            container,
        };

        if state.hold_clones {
            let (tx, rx) = oneshot::channel();
            state.held.push(Some(tx));
            async move {
                let _ = rx.await;
                Ok(document)
            }
            .boxed_local()
        } else {
            future::ready(Ok(document)).boxed_local()
        }
    }

    fn rasterize(
        &self,
        target: &TestElement,
        options: RasterizeOptions<TestElement>,
    ) -> LocalBoxFuture<'static, Result<PixelBuffer, RasterizeError>> {
        let gate = {
            let mut state = self.state.borrow_mut();
            state.rasterized.push(RasterizeCall {
                uid: target.attribute(UID_ATTRIBUTE),
                classes: target.attribute("class"),
                hidden: options.hidden.len(),
                scale: options.scale,
                target: target.clone(),
            });
            if let Some(err) = state.fail_next.take() {
                return future::ready(Err(err)).boxed_local();
            }
            state.hold_rasters.then(|| {
                let (tx, rx) = oneshot::channel();
                state.held_rasters.push(tx);
                rx
            })
        };

        let state = Rc::clone(&self.state);
        let target = target.clone();
        let paint = move || -> Result<PixelBuffer, RasterizeError> {
            if !target.is_connected() {
                state.borrow_mut().detached_paints += 1;
            }
            #[expect(clippy::cast_possible_truncation, reason = "test sizes are small")]
            let (width, height) = (
                (options.width * options.scale).ceil().max(1.0) as u32,
                (options.height * options.scale).ceil().max(1.0) as u32,
            );
            let mut hasher = DefaultHasher::new();
            Self::digest(&target, &options.hidden, &mut hasher);
            (width, height).hash(&mut hasher);
            let data = hasher.finish().to_le_bytes().to_vec();
            Ok(PixelBuffer {
                width,
                height,
                data,
            })
        };
        match gate {
            Some(rx) => async move {
                let _ = rx.await;
                paint()
            }
            .boxed_local(),
            None => future::ready(paint()).boxed_local(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_follows_document() {
        let doc = document();
        let el = TestElement::new("div");
        assert!(!el.is_connected());
        doc.append_child(&el);
        assert!(el.is_connected());
        el.detach();
        assert!(!el.is_connected());
        assert!(doc.children().is_empty());
    }

    #[test]
    fn classes_live_in_the_class_attribute() {
        let el = TestElement::new("div");
        el.add_class("hover");
        el.add_class("hover");
        el.add_class("active");
        assert_eq!(el.attribute("class").as_deref(), Some("hover active"));
        el.remove_class("hover");
        el.remove_class("active");
        assert_eq!(el.attribute("class"), None);
    }

    #[test]
    fn clone_is_a_detached_copy() {
        let doc = document();
        let root = TestElement::new("main").with_text("x");
        doc.append_child(&root);
        let rasterizer = MockRasterizer::default();
        let cloned = futures::executor::block_on(rasterizer.clone_document(&root))
            .expect("clone succeeds");
        assert_ne!(cloned.root, doc);
        assert_eq!(cloned.root.children()[0].own_text(), "x");
        root.set_own_text("y");
        assert_eq!(cloned.root.children()[0].own_text(), "x");
        cloned.container.detach();
        assert_eq!(doc.children().len(), 1);
    }

    #[test]
    fn held_rasterization_paints_on_release() {
        let doc = document();
        let el = TestElement::new("p").with_text("before");
        doc.append_child(&el);
        let rasterizer = MockRasterizer::default();
        rasterizer.hold_rasters();
        let options = RasterizeOptions {
            width: 10.0,
            height: 10.0,
            viewport_width: 100.0,
            viewport_height: 100.0,
            scale: 1.0,
            background_color: None,
            allow_unsafe_content: false,
            hidden: Vec::new(),
        };
        let pending = rasterizer.rasterize(&el, options);
        assert_eq!(rasterizer.held_rasters(), 1);

        el.detach();
        rasterizer.release_rasters();
        assert!(futures::executor::block_on(pending).is_ok());
        assert_eq!(rasterizer.held_rasters(), 0);
        assert_eq!(rasterizer.detached_paints(), 1);
    }
}
