//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects containers, boxes,
//! computed values and effects. It owns the dependency graph and dispatches
//! notifications when a tracked source changes.
//!
//! # How It Works
//!
//! 1. When a subscriber reads a source inside its run, the runtime records
//!    a link between the (source, key) pair and the subscriber.
//!
//! 2. Before the subscriber runs again, all of its links are removed, so
//!    its dependency set always matches its latest run.
//!
//! 3. When a source changes, the runtime:
//!    a. Collects the subscribers linked to the changed key, plus the
//!       iteration markers the operation affects
//!    b. Settles computed values first; they only mark themselves dirty
//!    c. Re-runs effects inline, or hands them to their scheduler
//!
//! # Thread Safety
//!
//! The graph lives in thread-local storage. Every handle type is `Rc`-based,
//! so a reactive graph never leaves the thread that built it.

use std::cell::RefCell;

use tracing::trace;

use crate::graph::{DependencyGraph, Observable, TargetId, TrackKey, TrackOp, TriggerOp};
use crate::value::Value;

use super::context::{is_tracking, ReactiveContext};
use super::subscriber::{DebuggerEvent, DebuggerOp, Subscriber, SubscriberId};

thread_local! {
    static GRAPH: RefCell<DependencyGraph> = RefCell::new(DependencyGraph::default());
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Record that the tracking subscriber, if any, depends on
    /// (`source`, `key`).
    pub fn track<O: Observable + ?Sized>(source: &O, op: TrackOp, key: TrackKey) {
        let Some(subscriber) = ReactiveContext::tracking_subscriber() else {
            return;
        };
        let target = source.target_id();

        let linked = GRAPH.with(|graph| graph.borrow_mut().link(target, &key, &subscriber));
        if !linked {
            return;
        }

        trace!(%target, %key, %op, subscriber = %subscriber.id(), "track");
        subscriber.on_track(|| DebuggerEvent {
            subscriber: subscriber.id(),
            target,
            op: DebuggerOp::Track(op),
            key: Some(key.clone()),
            new_value: None,
            old_value: None,
        });
        subscriber.push_dep((target, key));
    }

    /// Notify the subscribers that depend on (`source`, `key`).
    ///
    /// `key` is `None` only for `Clear`, which reaches every subscriber
    /// tracked against the source.
    pub fn trigger<O: Observable + ?Sized>(
        source: &O,
        op: TriggerOp,
        key: Option<TrackKey>,
        new_value: Option<&Value>,
        old_value: Option<&Value>,
    ) {
        let target = source.target_id();
        let active = ReactiveContext::current_subscriber();
        let notified = GRAPH.with(|graph| {
            graph
                .borrow()
                .collect(target, op, key.as_ref(), source.is_map_like(), active)
        });
        if notified.is_empty() {
            return;
        }

        trace!(%target, ?key, %op, subscribers = notified.len(), "trigger");
        let notify = |subscriber: &Subscriber| {
            subscriber.on_trigger(|| DebuggerEvent {
                subscriber: subscriber.id(),
                target,
                op: DebuggerOp::Trigger(op),
                key: key.clone(),
                new_value: new_value.cloned(),
                old_value: old_value.cloned(),
            });
            subscriber.schedule();
        };

        for subscriber in &notified.computed {
            if subscriber.is_active() {
                notify(subscriber);
            }
        }
        for (subscriber, runs) in &notified.effects {
            // An inline effect that already re-ran during this trigger,
            // through a computed it reads, is not run again.
            let reran = !subscriber.has_scheduler() && subscriber.run_count() != *runs;
            if subscriber.is_active() && !reran {
                notify(subscriber);
            }
        }
    }

    /// Remove every link the subscriber recorded.
    pub(crate) fn cleanup(subscriber: &Subscriber) {
        let deps = subscriber.take_deps();
        if deps.is_empty() {
            return;
        }
        let removed: Vec<Subscriber> = GRAPH
            .try_with(|graph| {
                let mut graph = graph.borrow_mut();
                deps.iter()
                    .filter_map(|(target, key)| graph.unlink(*target, key, subscriber.id()))
                    .collect()
            })
            .unwrap_or_default();
        drop(removed);
    }

    /// Drop every graph entry recorded against a source that is going away.
    pub(crate) fn forget(target: TargetId) {
        let removed = GRAPH
            .try_with(|graph| {
                graph
                    .try_borrow_mut()
                    .ok()
                    .and_then(|mut graph| graph.forget(target))
            })
            .ok()
            .flatten();
        drop(removed);
    }

    /// Subscribers linked to (`source`, `key`).
    pub fn subscriber_count<O: Observable + ?Sized>(source: &O, key: &TrackKey) -> usize {
        GRAPH.with(|graph| graph.borrow().subscriber_count(source.target_id(), key))
    }

    pub fn is_tracked<O: Observable + ?Sized>(source: &O, key: &TrackKey) -> bool {
        Self::subscriber_count(source, key) > 0
    }

    /// Whether any entry is recorded against the source.
    pub fn has_dependents<O: Observable + ?Sized>(source: &O) -> bool {
        GRAPH.with(|graph| graph.borrow().contains_target(source.target_id()))
    }

    /// Sources with at least one linked subscriber.
    pub fn tracked_target_count() -> usize {
        GRAPH.with(|graph| graph.borrow().target_count())
    }

    /// Get the current subscriber, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if reads are currently being recorded.
    pub fn is_tracking() -> bool {
        is_tracking()
    }
}

/// Record a dependency for a custom [`Observable`] source.
pub fn track<O: Observable + ?Sized>(source: &O, op: TrackOp, key: TrackKey) {
    Runtime::track(source, op, key);
}

/// Announce a change to a custom [`Observable`] source.
pub fn trigger<O: Observable + ?Sized>(
    source: &O,
    op: TriggerOp,
    key: Option<TrackKey>,
    new_value: Option<&Value>,
    old_value: Option<&Value>,
) {
    Runtime::trigger(source, op, key, new_value, old_value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::reactive::{create_subscriber, effect, SubscriberOptions};

    struct Probe(TargetId);

    impl Observable for Probe {
        fn target_id(&self) -> TargetId {
            self.0
        }
    }

    #[test]
    fn track_outside_any_subscriber_is_a_no_op() {
        let probe = Probe(TargetId::new());
        track(&probe, TrackOp::Get, TrackKey::Slot);
        assert!(!Runtime::has_dependents(&probe));
    }

    #[test]
    fn custom_sources_track_and_trigger() {
        let probe = Rc::new(Probe(TargetId::new()));
        let runs = Rc::new(Cell::new(0));

        let (source, observed) = (probe.clone(), runs.clone());
        let effect = effect(move || {
            track(&*source, TrackOp::Get, TrackKey::Slot);
            observed.set(observed.get() + 1);
        });
        assert_eq!(Runtime::subscriber_count(&*probe, &TrackKey::Slot), 1);
        assert_eq!(effect.dependency_count(), 1);

        trigger(&*probe, TriggerOp::Set, Some(TrackKey::Slot), None, None);
        assert_eq!(runs.get(), 2);

        effect.stop();
        assert!(!Runtime::has_dependents(&*probe));
        trigger(&*probe, TriggerOp::Set, Some(TrackKey::Slot), None, None);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn repeated_reads_link_once() {
        let probe = Rc::new(Probe(TargetId::new()));
        let source = probe.clone();
        let effect = effect(move || {
            for _ in 0..3 {
                track(&*source, TrackOp::Get, TrackKey::Slot);
            }
        });
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn forget_drops_entries() {
        let probe = Rc::new(Probe(TargetId::new()));
        let source = probe.clone();
        let _effect = effect(move || track(&*source, TrackOp::Get, TrackKey::Slot));
        assert!(Runtime::has_dependents(&*probe));

        Runtime::forget(probe.0);
        assert!(!Runtime::has_dependents(&*probe));
    }

    #[test]
    fn hooks_observe_track_and_trigger() {
        let probe = Rc::new(Probe(TargetId::new()));
        let tracked = Rc::new(Cell::new(0));
        let triggered = Rc::new(Cell::new(0));

        let (on_track, on_trigger) = (tracked.clone(), triggered.clone());
        let source = probe.clone();
        let _effect = create_subscriber(
            move || track(&*source, TrackOp::Has, TrackKey::from("k")),
            SubscriberOptions::default()
                .on_track(move |event| {
                    assert_eq!(event.op, DebuggerOp::Track(TrackOp::Has));
                    on_track.set(on_track.get() + 1);
                })
                .on_trigger(move |event| {
                    assert_eq!(event.new_value, Some(Value::from(1)));
                    on_trigger.set(on_trigger.get() + 1);
                }),
        );

        trigger(
            &*probe,
            TriggerOp::Add,
            Some(TrackKey::from("k")),
            Some(&Value::from(1)),
            None,
        );
        assert_eq!((tracked.get(), triggered.get()), (2, 1));
    }
}
