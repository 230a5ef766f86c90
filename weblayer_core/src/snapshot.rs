// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared document snapshots.
//!
//! A [`ClonedSnapshot`] is one detached copy of the whole document, made by
//! the [`Rasterizer`] for one structural refresh and shared by every layer
//! rasterized from it. Each snapshot indexes its elements by identity token
//! once, at creation, so a live element's counterpart is found in constant
//! time.
//!
//! The [`Snapshotter`] memoizes the current snapshot and the clone in
//! flight, and numbers clones with a monotonic generation. Only the clone
//! with the latest generation is committed; earlier ones are torn down as
//! soon as they arrive. A committed snapshot that is later replaced stays
//! attached until the last rasterization holding it finishes.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt as _;
use futures::future::{self, LocalBoxFuture, Shared};

use crate::dom::{Element, UID_ATTRIBUTE};
use crate::raster::{ClonedDocument, RasterizeError, Rasterizer};
use crate::trace::{SnapshotCommittedEvent, SnapshotDiscardedEvent, Tracer};

/// Outcome of a snapshot request.
pub type SnapshotResult<E> = Result<Rc<ClonedSnapshot<E>>, RasterizeError>;

type SharedSnapshot<E> = Shared<LocalBoxFuture<'static, SnapshotResult<E>>>;

/// A detached, render-ready copy of the document.
///
/// The copy's off-screen container is detached when the snapshot is torn
/// down: on arrival if already superseded, when the tree is disposed, or
/// when the last handle drops.
#[derive(Debug)]
pub struct ClonedSnapshot<E: Element> {
    generation: u64,
    root: E,
    container: E,
    index: HashMap<String, E>,
    torn_down: Cell<bool>,
}

impl<E: Element> ClonedSnapshot<E> {
    /// Wraps a cloned document and builds its token index.
    #[must_use]
    pub fn new(generation: u64, document: ClonedDocument<E>) -> Self {
        let mut index = HashMap::new();
        let mut stack = vec![document.root.clone()];
        while let Some(el) = stack.pop() {
            if let Some(uid) = el.attribute(UID_ATTRIBUTE) {
                index.entry(uid).or_insert_with(|| el.clone());
            }
            stack.extend(el.children().into_iter().rev());
        }
        Self {
            generation,
            root: document.root,
            container: document.container,
            index,
            torn_down: Cell::new(false),
        }
    }

    /// The generation this snapshot was requested under.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The root of the copied document.
    #[must_use]
    pub fn root(&self) -> &E {
        &self.root
    }

    /// The copy of the live element carrying identity token `uid`.
    #[must_use]
    pub fn counterpart(&self, uid: &str) -> Option<&E> {
        self.index.get(uid)
    }

    /// The copy of `live`, located through its identity token.
    #[must_use]
    pub fn counterpart_of(&self, live: &E) -> Option<&E> {
        self.counterpart(&live.attribute(UID_ATTRIBUTE)?)
    }

    /// Number of indexed elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no element carried an identity token.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Detaches the copy's container. Safe to call more than once.
    pub fn teardown(&self) {
        if !self.torn_down.replace(true) {
            self.container.detach();
        }
    }

    /// Whether the copy has been torn down.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }
}

impl<E: Element> Drop for ClonedSnapshot<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

struct SnapshotState<E: Element> {
    latest: u64,
    current: Option<Rc<ClonedSnapshot<E>>>,
    in_flight: Option<(u64, SharedSnapshot<E>)>,
}

/// Produces and memoizes document snapshots for one tree.
pub(crate) struct Snapshotter<E: Element> {
    state: Rc<RefCell<SnapshotState<E>>>,
    rasterizer: Rc<dyn Rasterizer<E>>,
    tracer: Tracer,
}

impl<E: Element> Clone for Snapshotter<E> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            rasterizer: Rc::clone(&self.rasterizer),
            tracer: self.tracer.clone(),
        }
    }
}

impl<E: Element> core::fmt::Debug for Snapshotter<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Snapshotter")
            .field("latest", &state.latest)
            .field("current", &state.current.as_ref().map(|s| s.generation))
            .field("in_flight", &state.in_flight.as_ref().map(|(g, _)| *g))
            .finish_non_exhaustive()
    }
}

impl<E: Element> Snapshotter<E> {
    pub(crate) fn new(rasterizer: Rc<dyn Rasterizer<E>>, tracer: Tracer) -> Self {
        Self {
            state: Rc::new(RefCell::new(SnapshotState {
                latest: 0,
                current: None,
                in_flight: None,
            })),
            rasterizer,
            tracer,
        }
    }

    /// The committed snapshot, if any.
    pub(crate) fn current(&self) -> Option<Rc<ClonedSnapshot<E>>> {
        self.state.borrow().current.clone()
    }

    /// The most recently requested generation.
    pub(crate) fn latest_generation(&self) -> u64 {
        self.state.borrow().latest
    }

    /// Forgets the current snapshot and the in-flight memo.
    ///
    /// The forgotten snapshot is torn down when its last holder drops it. A
    /// clone still in flight runs to completion and is discarded on arrival
    /// if a newer one was requested.
    pub(crate) fn invalidate(&self) {
        let mut state = self.state.borrow_mut();
        state.in_flight = None;
        state.current = None;
    }

    /// Tears down the current snapshot immediately and supersedes the clone
    /// in flight so its result is never committed.
    pub(crate) fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.in_flight = None;
        state.latest += 1;
        if let Some(old) = state.current.take() {
            old.teardown();
        }
    }

    /// Returns the current snapshot, joins the clone in flight, or starts a
    /// new clone of the document containing `root`.
    pub(crate) fn get_or_create(&self, root: &E) -> LocalBoxFuture<'static, SnapshotResult<E>> {
        let mut state = self.state.borrow_mut();
        if let Some(current) = &state.current {
            return future::ready(Ok(Rc::clone(current))).boxed_local();
        }
        if let Some((_, in_flight)) = &state.in_flight {
            return in_flight.clone().boxed_local();
        }

        state.latest += 1;
        let generation = state.latest;
        tracing::debug!(generation, "cloning document");
        let clone = self.rasterizer.clone_document(root);
        let weak = Rc::downgrade(&self.state);
        let tracer = self.tracer.clone();
        let shared = async move {
            let document = clone.await;
            let snapshot = match document {
                Ok(document) => Rc::new(ClonedSnapshot::new(generation, document)),
                Err(err) => {
                    tracing::warn!(generation, %err, "document clone failed");
                    if let Some(state) = weak.upgrade() {
                        let mut state = state.borrow_mut();
                        if state.in_flight.as_ref().is_some_and(|(g, _)| *g == generation) {
                            state.in_flight = None;
                        }
                    }
                    return Err(err);
                }
            };
            let Some(state) = weak.upgrade() else {
                // The tree is gone; dropping the last handle tears it down.
                return Ok(snapshot);
            };
            let mut state = state.borrow_mut();
            if state.in_flight.as_ref().is_some_and(|(g, _)| *g == generation) {
                state.in_flight = None;
            }
            if generation == state.latest {
                state.current = Some(Rc::clone(&snapshot));
                tracing::debug!(generation, indexed = snapshot.len(), "snapshot committed");
                tracer.snapshot_committed(&SnapshotCommittedEvent {
                    generation,
                    indexed: snapshot.len(),
                });
            } else {
                snapshot.teardown();
                tracing::debug!(generation, latest = state.latest, "snapshot superseded");
                tracer.snapshot_discarded(&SnapshotDiscardedEvent {
                    generation,
                    latest: state.latest,
                });
            }
            Ok(snapshot)
        }
        .boxed_local()
        .shared();
        state.in_flight = Some((generation, shared.clone()));
        shared.boxed_local()
    }
}
