// Copyright 2026 the Weblayer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Classifying change batches.
//!
//! Every batch drained from the change queue is classified as either
//! *structural* (the shared snapshot can no longer be trusted and a new one
//! is needed) or *patchable* (the change is copied into the current snapshot
//! and only the owning layer is rasterized again).
//!
//! Rules, in order:
//!
//! 1. A latched queue overflow is structural.
//! 2. A child-list record is structural and ends classification.
//! 3. A resize of an element whose box differs from its layer's last layout
//!    is structural.
//! 4. `input`, `change`, `focus` and `blur` on form controls are structural.
//! 5. An attribute or text record whose value actually changed is patched
//!    into the snapshot, and the nearest layer at or above its target is
//!    queued for a local refresh. A patch that cannot be applied, because no
//!    snapshot is current or the target has no counterpart, is structural.
//!
//! Local refreshes are queued on the [`REFRESH`](crate::dirty::REFRESH)
//! channel so that a layer touched by several records is refreshed once.
//! A structural result discards the queue.

use crate::dirty;
use crate::dom::{ChangeEvent, ChangeRecord, Element, LAYER_ATTRIBUTE, UID_ATTRIBUTE};
use crate::layer::{LayerId, LayerState, LayerStore};
use crate::snapshot::ClonedSnapshot;
use crate::trace::RefreshReason;

/// The outcome of classifying one batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BatchDecision {
    /// Nothing relevant changed.
    Idle,
    /// Rebuild the tree from a new snapshot.
    Structural(RefreshReason),
    /// Rasterize these layers again from the current snapshot.
    Local(Vec<LayerId>),
}

/// Classifies `batch`, patching the current snapshot as it goes.
pub(crate) fn classify<E: Element>(
    batch: &[ChangeEvent<E>],
    store: &mut LayerStore<E>,
    snapshot: Option<&ClonedSnapshot<E>>,
    overflowed: bool,
) -> BatchDecision {
    let structural = if overflowed {
        Some(RefreshReason::Overflow)
    } else {
        batch
            .iter()
            .find_map(|event| classify_event(event, store, snapshot))
    };

    let queued = store.drain(dirty::REFRESH);
    match structural {
        Some(reason) => {
            if !queued.is_empty() {
                tracing::trace!(discarded = queued.len(), "local refreshes superseded");
            }
            BatchDecision::Structural(reason)
        }
        None if queued.is_empty() => BatchDecision::Idle,
        None => BatchDecision::Local(queued),
    }
}

/// Returns `Some` if the event requires a structural refresh.
fn classify_event<E: Element>(
    event: &ChangeEvent<E>,
    store: &mut LayerStore<E>,
    snapshot: Option<&ClonedSnapshot<E>>,
) -> Option<RefreshReason> {
    match event {
        ChangeEvent::Mutation(ChangeRecord::ChildList { .. }) => Some(RefreshReason::ChildList),
        ChangeEvent::Resize(element) => {
            let node = store.get(store.find_by_element(element)?)?;
            // Never laid out: the refresh that discovered it is still pending.
            if !node.laid_out {
                return None;
            }
            (element.bounding_rect() != node.bounding_rect()).then_some(RefreshReason::Resize)
        }
        ChangeEvent::Interaction { target, kind } => {
            if target.is_form_control() {
                tracing::trace!(event = kind.event_type(), "form interaction");
                Some(RefreshReason::Interaction)
            } else {
                None
            }
        }
        ChangeEvent::Mutation(record) => {
            if let ChangeRecord::Attributes { name, .. } = record
                && (name == LAYER_ATTRIBUTE || name == UID_ATTRIBUTE)
            {
                // Written by the engine itself.
                return None;
            }
            if !record.is_effective() {
                return None;
            }
            let target = record.target();
            let layer = store
                .owning_layer(target)
                .filter(|&id| store.lifecycle(id) == Some(LayerState::Active))?;
            let Some(snapshot) = snapshot else {
                return Some(RefreshReason::MissingSnapshot);
            };
            let Some(counterpart) = snapshot.counterpart_of(target) else {
                return Some(RefreshReason::MissingCounterpart);
            };
            apply_patch(record, counterpart);
            store.mark(layer, dirty::REFRESH);
            None
        }
    }
}

/// Copies the live state of the record's target onto its snapshot
/// counterpart.
pub(crate) fn apply_patch<E: Element>(record: &ChangeRecord<E>, counterpart: &E) {
    let live = record.target();
    for (name, value) in live.attributes() {
        counterpart.set_attribute(&name, &value);
    }
    if let ChangeRecord::Attributes { name, .. } = record
        && live.attribute(name).is_none()
    {
        counterpart.remove_attribute(name);
    }
    if let Some(state) = live.form_state() {
        counterpart.set_form_state(&state);
    }
    if let ChangeRecord::CharacterData { .. } = record {
        counterpart.set_own_text(&live.own_text());
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use futures::executor::block_on;

    use super::*;
    use crate::dom::{FormState, InteractionKind};
    use crate::host::change_queue;
    use crate::raster::Rasterizer;
    use crate::snapshot::Snapshotter;
    use crate::test_support::{MockHost, MockRasterizer, TestElement, document};
    use crate::trace::Tracer;
    use crate::tree::{TreeContext, build_or_update_tree};

    struct Fixture {
        store: LayerStore<TestElement>,
        snapshot: Rc<ClonedSnapshot<TestElement>>,
        root: TestElement,
        a: TestElement,
        b: TestElement,
    }

    impl Fixture {
        fn new() -> Self {
            let doc = document();
            let root = TestElement::new("main");
            let a = TestElement::new("section")
                .with_attribute(LAYER_ATTRIBUTE, "")
                .with_attribute("title", "a");
            let b = TestElement::new("section").with_attribute(LAYER_ATTRIBUTE, "");
            doc.append_child(&root);
            root.append_child(&a);
            root.append_child(&b);
            a.append_child(&TestElement::new("p").with_text("one"));

            let host = MockHost::default();
            let (sink, _) = change_queue(8);
            let mut store = LayerStore::new();
            build_or_update_tree(&mut store, &root, &TreeContext { host: &host, sink: &sink });

            let rasterizer: Rc<dyn Rasterizer<TestElement>> = Rc::new(MockRasterizer::default());
            let snapshots = Snapshotter::new(rasterizer, Tracer::default());
            let snapshot = block_on(snapshots.get_or_create(&root)).expect("clone succeeds");
            Self {
                store,
                snapshot,
                root,
                a,
                b,
            }
        }

        fn classify(&mut self, batch: &[ChangeEvent<TestElement>]) -> BatchDecision {
            classify(batch, &mut self.store, Some(&self.snapshot), false)
        }

        fn layer(&self, el: &TestElement) -> LayerId {
            self.store.find_by_element(el).expect("element has a layer")
        }
    }

    fn set_attr(el: &TestElement, name: &str, value: &str) -> ChangeEvent<TestElement> {
        let old_value = el.attribute(name);
        el.set_attribute(name, value);
        ChangeEvent::Mutation(ChangeRecord::Attributes {
            target: el.clone(),
            name: name.to_owned(),
            old_value,
        })
    }

    #[test]
    fn child_list_is_structural() {
        let mut fx = Fixture::new();
        let touch = set_attr(&fx.a, "title", "changed");
        let batch = [
            touch,
            ChangeEvent::Mutation(ChangeRecord::ChildList {
                target: fx.root.clone(),
            }),
        ];
        assert_eq!(
            fx.classify(&batch),
            BatchDecision::Structural(RefreshReason::ChildList)
        );
        // The queued local refresh was discarded with the batch.
        let a = fx.layer(&fx.a);
        assert_eq!(fx.classify(&[]), BatchDecision::Idle);
        assert!(fx.store.is_alive(a));
    }

    #[test]
    fn attribute_change_patches_and_refreshes_owner_once() {
        let mut fx = Fixture::new();
        let leaf = fx.a.children()[0].clone();
        let batch = [
            set_attr(&fx.a, "title", "changed"),
            set_attr(&leaf, "class", "highlight"),
        ];
        let a = fx.layer(&fx.a);
        assert_eq!(fx.classify(&batch), BatchDecision::Local(vec![a]));

        let copy = fx.snapshot.counterpart_of(&fx.a).expect("indexed");
        assert_eq!(copy.attribute("title").as_deref(), Some("changed"));
        let leaf_copy = fx.snapshot.counterpart_of(&leaf).expect("indexed");
        assert_eq!(leaf_copy.attribute("class").as_deref(), Some("highlight"));
    }

    #[test]
    fn unchanged_attribute_is_ignored() {
        let mut fx = Fixture::new();
        let batch = [set_attr(&fx.a, "title", "a")];
        assert_eq!(fx.classify(&batch), BatchDecision::Idle);
    }

    #[test]
    fn engine_markers_are_ignored() {
        let mut fx = Fixture::new();
        let batch = [set_attr(&fx.b, UID_ATTRIBUTE, "wl-other")];
        assert_eq!(fx.classify(&batch), BatchDecision::Idle);
    }

    #[test]
    fn removed_attribute_is_removed_from_counterpart() {
        let mut fx = Fixture::new();
        let old_value = fx.a.attribute("title");
        fx.a.remove_attribute("title");
        let batch = [ChangeEvent::Mutation(ChangeRecord::Attributes {
            target: fx.a.clone(),
            name: "title".into(),
            old_value,
        })];
        assert!(matches!(fx.classify(&batch), BatchDecision::Local(_)));
        let copy = fx.snapshot.counterpart_of(&fx.a).expect("indexed");
        assert_eq!(copy.attribute("title"), None);
    }

    #[test]
    fn text_change_overwrites_counterpart_text() {
        let mut fx = Fixture::new();
        let para = fx.a.children()[0].clone();
        para.set_own_text("two");
        let batch = [ChangeEvent::Mutation(ChangeRecord::CharacterData {
            target: para.clone(),
            old_value: Some("one".into()),
            new_value: "two".into(),
        })];
        let a = fx.layer(&fx.a);
        assert_eq!(fx.classify(&batch), BatchDecision::Local(vec![a]));
        let copy = fx.snapshot.counterpart_of(&para).expect("indexed");
        assert_eq!(copy.own_text(), "two");
    }

    #[test]
    fn form_interaction_is_structural() {
        let mut fx = Fixture::new();
        let input = TestElement::new("input").with_form_state(FormState {
            value: Some(String::new()),
            checked: None,
        });
        let batch = [ChangeEvent::Interaction {
            target: input,
            kind: InteractionKind::Input,
        }];
        assert_eq!(
            fx.classify(&batch),
            BatchDecision::Structural(RefreshReason::Interaction)
        );

        let batch = [ChangeEvent::Interaction {
            target: fx.a.clone(),
            kind: InteractionKind::Focus,
        }];
        assert_eq!(fx.classify(&batch), BatchDecision::Idle);
    }

    #[test]
    fn resize_is_structural_only_when_box_changed() {
        let mut fx = Fixture::new();
        let a = fx.layer(&fx.a);
        let rect = fx.a.bounding_rect();
        if let Some(node) = fx.store.get_mut(a) {
            node.bounding_rect = rect;
            node.laid_out = true;
        }
        assert_eq!(fx.classify(&[ChangeEvent::Resize(fx.a.clone())]), BatchDecision::Idle);

        fx.a.set_rect(kurbo::Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(
            fx.classify(&[ChangeEvent::Resize(fx.a.clone())]),
            BatchDecision::Structural(RefreshReason::Resize)
        );
    }

    #[test]
    fn resize_before_first_layout_is_ignored() {
        let mut fx = Fixture::new();
        fx.a.set_rect(kurbo::Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(fx.classify(&[ChangeEvent::Resize(fx.a.clone())]), BatchDecision::Idle);
    }

    #[test]
    fn patch_without_snapshot_escalates() {
        let mut fx = Fixture::new();
        let batch = [set_attr(&fx.a, "title", "changed")];
        assert_eq!(
            classify(&batch, &mut fx.store, None, false),
            BatchDecision::Structural(RefreshReason::MissingSnapshot)
        );
    }

    #[test]
    fn target_missing_from_snapshot_escalates() {
        let mut fx = Fixture::new();
        // Tagged after the snapshot was taken.
        let late = TestElement::new("span");
        fx.b.append_child(&late);
        crate::tagger::ensure_uid(&late);
        let batch = [set_attr(&late, "title", "x")];
        assert_eq!(
            fx.classify(&batch),
            BatchDecision::Structural(RefreshReason::MissingCounterpart)
        );
    }

    #[test]
    fn overflow_is_structural() {
        let mut fx = Fixture::new();
        assert_eq!(
            classify(&[], &mut fx.store, Some(&fx.snapshot), true),
            BatchDecision::Structural(RefreshReason::Overflow)
        );
    }

    #[test]
    fn target_outside_layers_is_ignored() {
        let mut fx = Fixture::new();
        let stray = TestElement::new("div");
        let batch = [set_attr(&stray, "title", "x")];
        assert_eq!(fx.classify(&batch), BatchDecision::Idle);
    }
}
