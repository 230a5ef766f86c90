// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Platform contract and the change queue.
//!
//! A [`Host`] supplies the few platform services the engine needs beyond the
//! [`Element`] trait: display metrics, a place to park detached roots, and
//! change observation. Observers never call into the engine directly;
//! they push [`ChangeEvent`]s into a bounded [`ChangeSink`], and a single
//! coordinator ([`WebLayer::run`](crate::WebLayer::run)) drains the queue in
//! batches.

use std::cell::Cell;
use std::rc::Rc;

use futures::channel::mpsc;
use kurbo::Size;

use crate::dom::{ChangeEvent, Element};

/// A disconnectable observer registration.
pub trait Observation {
    /// Stops delivering notifications. Must be safe to call more than once.
    fn disconnect(&mut self);
}

/// Platform services consumed by the engine.
pub trait Host<E: Element> {
    /// The platform default device pixel ratio.
    fn device_pixel_ratio(&self) -> f64;

    /// The layout viewport size in CSS pixels.
    fn viewport_size(&self) -> Size;

    /// Creates an invisible, off-screen container attached to the document.
    ///
    /// Used to host root elements that are not yet attached, so that
    /// observation and layout are always legal. Returns `None` if the
    /// platform refused to create one.
    fn create_offscreen_container(&self) -> Option<E>;

    /// Observes the subtree of `root` for mutations and the forwarded
    /// interactive events.
    fn observe_mutations(&self, root: &E, sink: ChangeSink<E>) -> Box<dyn Observation>;

    /// Observes size changes of `element`.
    fn observe_resize(&self, element: &E, sink: ChangeSink<E>) -> Box<dyn Observation>;
}

/// Creates a bounded change queue.
///
/// `capacity` is clamped to at least one slot.
#[must_use]
pub fn change_queue<E>(capacity: usize) -> (ChangeSink<E>, ChangeReceiver<E>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let overflowed = Rc::new(Cell::new(false));
    (
        ChangeSink {
            tx,
            overflowed: Rc::clone(&overflowed),
        },
        ChangeReceiver { rx, overflowed },
    )
}

/// The producer side of the change queue.
///
/// A push into a full queue is not lost: it latches an overflow flag that
/// turns the next processed batch into a structural refresh.
#[derive(Debug)]
pub struct ChangeSink<E> {
    tx: mpsc::Sender<ChangeEvent<E>>,
    overflowed: Rc<Cell<bool>>,
}

impl<E> Clone for ChangeSink<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            overflowed: Rc::clone(&self.overflowed),
        }
    }
}

impl<E> ChangeSink<E> {
    /// Enqueues a change event.
    pub fn push(&mut self, event: ChangeEvent<E>) {
        if let Err(err) = self.tx.try_send(event) {
            if err.is_full() {
                tracing::debug!("change queue full; escalating next batch");
                self.overflowed.set(true);
            }
            // A disconnected receiver means the layer was dropped; nothing to do.
        }
    }

    /// Whether the queue has overflowed since the last batch.
    #[must_use]
    pub fn has_overflowed(&self) -> bool {
        self.overflowed.get()
    }

    /// Closes the queue for every sink. The receiver drains what is already
    /// queued and then ends.
    pub fn close(&mut self) {
        self.tx.close_channel();
    }
}

/// The consumer side of the change queue.
#[derive(Debug)]
pub struct ChangeReceiver<E> {
    pub(crate) rx: mpsc::Receiver<ChangeEvent<E>>,
    overflowed: Rc<Cell<bool>>,
}

impl<E> ChangeReceiver<E> {
    /// Takes every event that is ready without waiting.
    pub fn drain_ready(&mut self, batch: &mut Vec<ChangeEvent<E>>) {
        while let Ok(Some(event)) = self.rx.try_next() {
            batch.push(event);
        }
    }

    /// Returns and clears the overflow latch.
    pub fn take_overflow(&self) -> bool {
        self.overflowed.replace(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestElement;

    #[test]
    fn full_queue_latches_overflow() {
        let (mut sink, mut receiver) = change_queue::<TestElement>(1);
        let el = TestElement::new("div");
        // One slot of capacity plus one guaranteed slot per sender.
        for _ in 0..4 {
            sink.push(ChangeEvent::Resize(el.clone()));
        }
        assert!(sink.has_overflowed(), "pushing past capacity must latch");

        let mut batch = Vec::new();
        receiver.drain_ready(&mut batch);
        assert!(!batch.is_empty(), "queued events are still delivered");
        assert!(receiver.take_overflow(), "latch is visible to the receiver");
        assert!(!receiver.take_overflow(), "latch clears once taken");
    }

    #[test]
    fn close_ends_the_stream_after_queued_events() {
        use futures::StreamExt as _;

        let (mut sink, mut receiver) = change_queue::<TestElement>(4);
        let other = sink.clone();
        sink.push(ChangeEvent::Resize(TestElement::new("div")));
        sink.close();
        drop(other);
        let events: Vec<_> = futures::executor::block_on(receiver.rx.by_ref().collect());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn push_after_receiver_dropped_is_ignored() {
        let (mut sink, receiver) = change_queue::<TestElement>(4);
        drop(receiver);
        sink.push(ChangeEvent::Resize(TestElement::new("div")));
        assert!(!sink.has_overflowed(), "disconnect is not an overflow");
    }
}
