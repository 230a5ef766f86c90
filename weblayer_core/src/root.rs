// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The public entry point: one mirrored tree per root element.

use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use futures::FutureExt as _;
use futures::future::{self, LocalBoxFuture};

use crate::backend::Presenter;
use crate::config::WebLayerConfig;
use crate::dirty;
use crate::dom::{ChangeEvent, Element};
use crate::error::LayerError;
use crate::host::{ChangeReceiver, ChangeSink, Host, change_queue};
use crate::layer::{ContentNode, LayerId, LayerState, LayerStore};
use crate::raster::{Rasterizer, Texture};
use crate::scheduler::{Engine, TreeState};
use crate::snapshot::Snapshotter;
use crate::trace::{LayerRemovedEvent, RefreshReason, TraceSink, Tracer};
use crate::transition::{self, FrameChanges};
use crate::tree::{TreeContext, build_or_update_tree};

/// A live DOM subtree mirrored into rasterized layers.
///
/// Construction tags the root, builds the layer tree and starts observing
/// changes. Nothing is rasterized until [`refresh`](Self::refresh) runs or
/// the coordinator returned by [`run`](Self::run) is spawned; the
/// coordinator starts with a full refresh.
///
/// Every tick ([`tick`](Self::tick)) eases poses and opacities and reports
/// what moved. Dropping the layer disposes it.
pub struct WebLayer<E: Element> {
    engine: Engine<E>,
    receiver: RefCell<Option<ChangeReceiver<E>>>,
}

impl<E: Element> core::fmt::Debug for WebLayer<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.engine.state.borrow();
        f.debug_struct("WebLayer")
            .field("root", &state.store.root())
            .field("layers", &state.store.len())
            .field("snapshots", &self.engine.snapshots)
            .field("disposed", &state.disposed)
            .finish_non_exhaustive()
    }
}

impl<E: Element> WebLayer<E> {
    /// Mirrors the subtree rooted at `root`.
    ///
    /// A root that is not attached to a document is first moved into an
    /// invisible off-screen container created by `host`, which
    /// [`dispose`](Self::dispose) removes again.
    pub fn new(
        root: E,
        host: Rc<dyn Host<E>>,
        rasterizer: Rc<dyn Rasterizer<E>>,
        config: WebLayerConfig,
    ) -> Self {
        let container = if root.is_connected() {
            None
        } else if let Some(container) = host.create_offscreen_container() {
            container.append_child(&root);
            tracing::debug!("root not attached; parked in off-screen container");
            Some(container)
        } else {
            tracing::warn!("root not attached and no off-screen container available");
            None
        };

        let (sink, receiver) = change_queue(config.queue_capacity);
        let tracer = Tracer::default();
        let snapshots = Snapshotter::new(Rc::clone(&rasterizer), tracer.clone());

        let mut store = LayerStore::new();
        let cx = TreeContext {
            host: &*host,
            sink: &sink,
        };
        build_or_update_tree(&mut store, &root, &cx);
        let root_observation = host.observe_mutations(&root, sink.clone());

        let state = TreeState {
            store,
            root_element: root,
            container,
            config,
            root_observation: Some(root_observation),
            rasterizing: HashSet::new(),
            rerun: HashMap::new(),
            disposed: false,
        };
        Self {
            engine: Engine {
                state: Rc::new(RefCell::new(state)),
                host,
                rasterizer,
                snapshots,
                tracer,
                sink,
            },
            receiver: RefCell::new(Some(receiver)),
        }
    }

    // -- Collaborators --

    /// A producer handle for the change queue.
    ///
    /// Hosts push observer notifications here; [`run`](Self::run) consumes
    /// them.
    #[must_use]
    pub fn sink(&self) -> ChangeSink<E> {
        self.engine.sink.clone()
    }

    /// Replaces the diagnostics sink.
    pub fn set_trace_sink(&self, sink: impl TraceSink + 'static) {
        self.engine.tracer.set_sink(Box::new(sink));
    }

    /// The configuration the tree was created with.
    #[must_use]
    pub fn config(&self) -> WebLayerConfig {
        self.engine.state.borrow().config
    }

    // -- Refresh --

    /// The change coordinator.
    ///
    /// Performs an initial full refresh, then drains the change queue in
    /// batches until the tree is disposed. Returns `None` if the
    /// coordinator was already taken.
    #[must_use]
    pub fn run(&self) -> Option<LocalBoxFuture<'static, ()>> {
        let receiver = self.receiver.borrow_mut().take()?;
        Some(self.engine.clone().run(receiver).boxed_local())
    }

    /// Requests a structural refresh: rebuild the tree from the live
    /// document, take a new snapshot and rasterize every active layer.
    #[must_use]
    pub fn refresh(&self) -> LocalBoxFuture<'static, ()> {
        self.engine
            .clone()
            .refresh_full_tree(RefreshReason::Explicit)
            .boxed_local()
    }

    /// Rasterizes one layer again from the current snapshot, taking one
    /// first if needed.
    #[must_use]
    pub fn refresh_layer(&self, id: LayerId) -> LocalBoxFuture<'static, Result<(), LayerError>> {
        self.engine.clone().refresh_single(id).boxed_local()
    }

    /// Processes one batch of change events, as the coordinator does.
    #[must_use]
    pub fn on_change(&self, batch: Vec<ChangeEvent<E>>) -> LocalBoxFuture<'static, ()> {
        if batch.is_empty() {
            return future::ready(()).boxed_local();
        }
        self.engine.clone().process_batch(batch, false).boxed_local()
    }

    // -- Per-tick --

    /// Advances pose and opacity transitions by one step and disposes
    /// layers that finished fading out.
    pub fn tick(&self) -> FrameChanges {
        let mut state = self.engine.state.borrow_mut();
        if state.disposed {
            return FrameChanges::default();
        }
        let config = state.config;
        let (changes, disposed) = transition::tick(&mut state.store, &config);
        for layer in disposed {
            self.engine
                .tracer
                .layer_removed(&LayerRemovedEvent { layer });
        }
        changes
    }

    /// Ticks and hands the changes to `presenter`.
    pub fn tick_and_present(&self, presenter: &mut dyn Presenter<E>) -> FrameChanges {
        let changes = self.tick();
        presenter.apply(&self.engine.state.borrow().store, &changes);
        changes
    }

    // -- Queries --

    /// Read access to the layer store.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a [`TraceSink`] or another callback that
    /// runs while the tree is being modified.
    #[must_use]
    pub fn store(&self) -> Ref<'_, LayerStore<E>> {
        Ref::map(self.engine.state.borrow(), |s| &s.store)
    }

    /// The root layer, unless disposed.
    #[must_use]
    pub fn root(&self) -> Option<LayerId> {
        self.engine.state.borrow().store.root()
    }

    /// The layer whose boundary element is `element`.
    #[must_use]
    pub fn layer_for_element(&self, element: &E) -> Option<LayerId> {
        self.engine.state.borrow().store.find_by_element(element)
    }

    /// Live layer ids in depth-first pre-order.
    #[must_use]
    pub fn traverse(&self) -> Vec<LayerId> {
        self.engine.state.borrow().store.traverse()
    }

    /// The lifecycle state of `id`.
    #[must_use]
    pub fn lifecycle(&self, id: LayerId) -> Option<LayerState> {
        self.engine.state.borrow().store.lifecycle(id)
    }

    /// Scene content of `id`, once attached.
    #[must_use]
    pub fn content(&self, id: LayerId) -> Option<ContentNode> {
        self.engine.state.borrow().store.get(id)?.content()
    }

    /// The committed texture of `id` for `state`.
    #[must_use]
    pub fn texture(&self, id: LayerId, state: &str) -> Option<Texture> {
        self.engine
            .state
            .borrow()
            .store
            .get(id)?
            .texture(state)
            .cloned()
    }

    /// Selects the displayed state of a layer.
    ///
    /// Switching swaps textures; it never rasterizes.
    pub fn set_state(&self, id: LayerId, state: &str) -> Result<(), LayerError> {
        let mut guard = self.engine.state.borrow_mut();
        let tree = &mut *guard;
        if tree.disposed {
            return Err(LayerError::Disposed);
        }
        let node = tree
            .store
            .get_mut(id)
            .ok_or(LayerError::UnknownLayer(id))?;
        if !node.states().iter().any(|s| s == state) {
            return Err(LayerError::UnknownState {
                layer: id,
                state: state.to_owned(),
            });
        }
        if node.current_state() != state {
            node.current_state = state.to_owned();
            tree.store.mark(id, dirty::CONTENT);
        }
        Ok(())
    }

    // -- Teardown --

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.engine.state.borrow().disposed
    }

    /// Disposes every layer, disconnects observers, tears down the current
    /// snapshot, removes the managed off-screen container and closes the
    /// change queue. Safe to call more than once.
    pub fn dispose(&self) {
        let mut guard = self.engine.state.borrow_mut();
        let state = &mut *guard;
        if state.disposed {
            return;
        }
        state.disposed = true;

        if let Some(root) = state.store.root() {
            for layer in state.store.dispose(root) {
                self.engine
                    .tracer
                    .layer_removed(&LayerRemovedEvent { layer });
            }
        }
        if let Some(mut observation) = state.root_observation.take() {
            observation.disconnect();
        }
        state.rerun.clear();
        self.engine.snapshots.clear();
        if let Some(container) = state.container.take() {
            container.detach();
        }
        self.engine.sink.clone().close();
        tracing::debug!("layer tree disposed");
    }
}

impl<E: Element> Drop for WebLayer<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}
