// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Refresh scheduling and rasterization.
//!
//! Two kinds of refresh exist:
//!
//! - **Structural**: invalidate the snapshot, rebuild the tree, wait for a
//!   new snapshot, then rasterize every active layer concurrently. A
//!   structural refresh whose snapshot has been superseded by the time it
//!   arrives stops there; the newer refresh does the work.
//! - **Local**: rasterize some layers again from the current snapshot.
//!
//! Per layer, the declared states are rasterized one after another. A
//! non-default state is applied as a class on the snapshot counterpart for
//! the duration of its rasterization. Results are committed unless the slot
//! already holds a texture from a newer snapshot. A failed state keeps its
//! previous texture and is retried by the next refresh.
//!
//! At most one task rasterizes a given layer. A refresh requested while one
//! runs is folded into a single rerun, from the newest snapshot requested.
//!
//! The coordinator ([`Engine::run`]) drains the change queue in batches and
//! processes each batch as its own task, so a slow structural refresh never
//! delays classification of later changes.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use futures::future::{self, Either, join_all};
use futures::stream::FuturesUnordered;
use futures::{FutureExt as _, StreamExt as _};

use crate::bridge::{self, BatchDecision};
use crate::config::WebLayerConfig;
use crate::dirty;
use crate::dom::{ChangeEvent, Element};
use crate::error::LayerError;
use crate::host::{ChangeReceiver, ChangeSink, Host, Observation};
use crate::layer::{DEFAULT_STATE, LayerId, LayerState, LayerStore};
use crate::raster::{RasterizeOptions, Rasterizer};
use crate::snapshot::{ClonedSnapshot, Snapshotter};
use crate::tagger;
use crate::trace::{
    BatchEvent, LayerRasterizedEvent, RasterizeFailedEvent, RefreshReason, RefreshRequestedEvent,
    Tracer,
};
use crate::tree::{TreeContext, build_or_update_tree};

/// Mutable state of one tree.
pub(crate) struct TreeState<E: Element> {
    pub(crate) store: LayerStore<E>,
    pub(crate) root_element: E,
    /// Off-screen container created for an unattached root.
    pub(crate) container: Option<E>,
    pub(crate) config: WebLayerConfig,
    pub(crate) root_observation: Option<Box<dyn Observation>>,
    /// Layers with a rasterization task running.
    pub(crate) rasterizing: HashSet<LayerId>,
    /// Snapshot to rasterize again from once the running task finishes.
    pub(crate) rerun: HashMap<LayerId, Rc<ClonedSnapshot<E>>>,
    pub(crate) disposed: bool,
}

/// Shared handles to one tree and its collaborators.
///
/// Cheap to clone; every refresh task owns a clone. No borrow of the state
/// is held across an `.await`.
pub(crate) struct Engine<E: Element> {
    pub(crate) state: Rc<RefCell<TreeState<E>>>,
    pub(crate) host: Rc<dyn Host<E>>,
    pub(crate) rasterizer: Rc<dyn Rasterizer<E>>,
    pub(crate) snapshots: Snapshotter<E>,
    pub(crate) tracer: Tracer,
    pub(crate) sink: ChangeSink<E>,
}

impl<E: Element> Clone for Engine<E> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            host: Rc::clone(&self.host),
            rasterizer: Rc::clone(&self.rasterizer),
            snapshots: self.snapshots.clone(),
            tracer: self.tracer.clone(),
            sink: self.sink.clone(),
        }
    }
}

/// Everything needed to rasterize one layer, captured under one borrow.
struct RasterJob<E> {
    target: E,
    states: Vec<String>,
    options: RasterizeOptions<E>,
}

impl<E: Element> Engine<E> {
    /// Rebuilds the tree and rasterizes every active layer from a fresh
    /// snapshot.
    pub(crate) async fn refresh_full_tree(self, reason: RefreshReason) {
        let root = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            if state.disposed {
                return;
            }
            self.snapshots.invalidate();
            let cx = TreeContext {
                host: &*self.host,
                sink: &self.sink,
            };
            build_or_update_tree(&mut state.store, &state.root_element, &cx);
            tracing::debug!(?reason, layers = state.store.len(), "structural refresh");
            self.tracer.refresh_requested(&RefreshRequestedEvent {
                reason,
                layers: state.store.len(),
            });
            state.root_element.clone()
        };

        let snapshot = match self.snapshots.get_or_create(&root).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(%err, "document clone failed; refresh abandoned");
                return;
            }
        };
        if snapshot.generation() != self.snapshots.latest_generation() {
            tracing::debug!(generation = snapshot.generation(), "refresh superseded");
            return;
        }

        let layers: Vec<LayerId> = {
            let state = self.state.borrow();
            if state.disposed {
                return;
            }
            state
                .store
                .traverse()
                .into_iter()
                .filter(|&id| state.store.lifecycle(id) == Some(LayerState::Active))
                .collect()
        };
        self.rasterize_all(layers, snapshot).await;
    }

    /// Rasterizes one layer again, joining or starting a snapshot as needed.
    pub(crate) async fn refresh_single(self, id: LayerId) -> Result<(), LayerError> {
        let root = {
            let state = self.state.borrow();
            if state.disposed {
                return Err(LayerError::Disposed);
            }
            if state.store.lifecycle(id) != Some(LayerState::Active) {
                return Err(LayerError::UnknownLayer(id));
            }
            state.root_element.clone()
        };
        match self.snapshots.get_or_create(&root).await {
            Ok(snapshot) if snapshot.generation() != self.snapshots.latest_generation() => {
                tracing::debug!(layer = %id, generation = snapshot.generation(), "refresh superseded");
            }
            Ok(snapshot) => {
                self.rasterize_layer(id, snapshot).await;
            }
            Err(err) => {
                tracing::warn!(layer = %id, %err, "document clone failed; refresh abandoned");
            }
        }
        Ok(())
    }

    /// Classifies a batch and runs the refresh it calls for.
    pub(crate) async fn process_batch(self, batch: Vec<ChangeEvent<E>>, overflowed: bool) {
        let snapshot = self.snapshots.current();
        let decision = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            bridge::classify(&batch, &mut state.store, snapshot.as_deref(), overflowed)
        };

        let (structural, local) = match &decision {
            BatchDecision::Idle => (None, 0),
            BatchDecision::Structural(reason) => (Some(*reason), 0),
            BatchDecision::Local(layers) => (None, layers.len()),
        };
        tracing::trace!(events = batch.len(), ?structural, local, "batch classified");
        self.tracer.batch(&BatchEvent {
            events: batch.len(),
            structural,
            local,
        });

        match decision {
            BatchDecision::Idle => {}
            BatchDecision::Structural(reason) => {
                drop(snapshot);
                self.refresh_full_tree(reason).await;
            }
            BatchDecision::Local(layers) => {
                if let Some(snapshot) = snapshot {
                    self.rasterize_all(layers, snapshot).await;
                }
            }
        }
    }

    /// Drains the change queue until it closes, starting with an initial
    /// structural refresh.
    pub(crate) async fn run(self, mut receiver: ChangeReceiver<E>) {
        let mut in_flight = FuturesUnordered::new();
        in_flight.push(self.clone().refresh_full_tree(RefreshReason::Initial).boxed_local());
        loop {
            let event = if in_flight.is_empty() {
                receiver.rx.next().await
            } else {
                match future::select(receiver.rx.next(), in_flight.next()).await {
                    Either::Left((event, _)) => event,
                    Either::Right(_) => continue,
                }
            };
            let Some(event) = event else {
                break;
            };
            let mut batch = vec![event];
            receiver.drain_ready(&mut batch);
            let overflowed = receiver.take_overflow();
            in_flight.push(self.clone().process_batch(batch, overflowed).boxed_local());
        }
        while in_flight.next().await.is_some() {}
        tracing::debug!("change queue closed");
    }

    async fn rasterize_all(&self, layers: Vec<LayerId>, snapshot: Rc<ClonedSnapshot<E>>) {
        join_all(
            layers
                .into_iter()
                .map(|id| self.clone().rasterize_layer(id, Rc::clone(&snapshot))),
        )
        .await;
    }

    /// Rasterizes one layer, or queues a rerun if a task already does.
    async fn rasterize_layer(self, id: LayerId, snapshot: Rc<ClonedSnapshot<E>>) {
        {
            let mut state = self.state.borrow_mut();
            if !state.rasterizing.insert(id) {
                let newer = state
                    .rerun
                    .get(&id)
                    .is_none_or(|queued| queued.generation() <= snapshot.generation());
                if newer {
                    state.rerun.insert(id, snapshot);
                }
                tracing::trace!(layer = %id, "rasterization queued behind running task");
                return;
            }
        }

        let mut next = Some(snapshot);
        while let Some(snapshot) = next {
            self.rasterize_states(id, snapshot).await;
            let mut state = self.state.borrow_mut();
            next = state.rerun.remove(&id);
            if next.is_none() {
                state.rasterizing.remove(&id);
            }
        }
    }

    /// Rasterizes every declared state of one layer and attaches its
    /// content.
    async fn rasterize_states(&self, id: LayerId, snapshot: Rc<ClonedSnapshot<E>>) {
        let generation = snapshot.generation();
        let Some(RasterJob {
            target,
            states,
            options,
        }) = self.prepare(id, &snapshot)
        else {
            return;
        };

        for state_name in &states {
            let marked = state_name != DEFAULT_STATE;
            if marked {
                target.add_class(state_name);
            }
            let result = self.rasterizer.rasterize(&target, options.clone()).await;
            if marked {
                target.remove_class(state_name);
            }

            match result {
                Ok(buffer) => {
                    let (width, height) = (buffer.width, buffer.height);
                    let committed = self
                        .state
                        .borrow_mut()
                        .store
                        .get_mut(id)
                        .is_some_and(|node| node.commit_texture(state_name, buffer, generation));
                    if committed {
                        tracing::trace!(layer = %id, state = %state_name, generation, "texture committed");
                        self.tracer.layer_rasterized(&LayerRasterizedEvent {
                            layer: id,
                            state: state_name,
                            generation,
                            width,
                            height,
                        });
                    } else {
                        tracing::trace!(layer = %id, state = %state_name, generation, "stale texture dropped");
                    }
                }
                Err(err) => {
                    tracing::warn!(layer = %id, state = %state_name, %err, "rasterization failed; keeping previous texture");
                    self.tracer.rasterize_failed(&RasterizeFailedEvent {
                        layer: id,
                        state: Some(state_name.as_str()),
                        generation,
                        error: Some(&err),
                    });
                }
            }
        }

        let mut state = self.state.borrow_mut();
        if state.store.lifecycle(id) == Some(LayerState::Active) {
            state.store.attach(id);
        }
    }

    /// Updates the layer's layout and states, and resolves its snapshot
    /// counterpart and the nested boundaries to hide.
    fn prepare(&self, id: LayerId, snapshot: &ClonedSnapshot<E>) -> Option<RasterJob<E>> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.disposed {
            return None;
        }
        let config = state.config;
        let root_rect = state.root_element.bounding_rect();
        let platform_ratio = self.host.device_pixel_ratio();
        let viewport = self.host.viewport_size();

        let node = state.store.get_mut(id)?;
        if node.lifecycle() != LayerState::Active {
            return None;
        }
        let element = node.element().clone();
        let rect = element.bounding_rect();
        node.pixel_ratio = tagger::resolve_pixel_ratio(&element, config.pixel_ratio, platform_ratio);
        node.layout(rect, root_rect, &config);
        let reset = node.set_states(tagger::states(&element));
        let states = node.states().to_vec();
        let pixel_ratio = node.pixel_ratio();
        let children = node.children().to_vec();
        if reset {
            state.store.mark(id, dirty::CONTENT);
        }

        let Some(target) = snapshot.counterpart_of(&element).cloned() else {
            tracing::warn!(layer = %id, "layer element missing from snapshot");
            self.tracer.rasterize_failed(&RasterizeFailedEvent {
                layer: id,
                state: None,
                generation: snapshot.generation(),
                error: None,
            });
            return None;
        };
        let hidden = children
            .iter()
            .filter_map(|&child| state.store.get(child))
            .filter_map(|child| snapshot.counterpart_of(child.element()).cloned())
            .collect();

        Some(RasterJob {
            target,
            states,
            options: RasterizeOptions {
                width: rect.width(),
                height: rect.height(),
                viewport_width: viewport.width,
                viewport_height: viewport.height,
                scale: pixel_ratio,
                background_color: config.background_color,
                allow_unsafe_content: config.allow_unsafe_content,
                hidden,
            },
        })
    }
}
