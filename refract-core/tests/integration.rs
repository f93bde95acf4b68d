//! Integration Tests for Reactive System
//!
//! These tests verify that handles, boxes, computed values and effects work
//! together correctly through the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use refract_core::reactive::{ReactiveContext, Runtime};
use refract_core::{
    computed, create_subscriber, effect, is_reactive, is_readonly, reactive, readonly,
    set_warn_handler, stop, to_raw, unwrap, value_ref, wrap, EffectScope, JobQueue, Mode,
    ReactiveError, SubscriberOptions, Target, TrackKey, Value,
};

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

/// An effect that depends on a changed key re-runs exactly once, before
/// any unrelated subscriber could run.
#[test]
fn dependent_effect_reruns_exactly_once() {
    let state = reactive(&Target::record_from([("a", 1), ("b", 1)]));
    let order = Rc::new(RefCell::new(Vec::new()));

    let (source, log) = (state.clone(), order.clone());
    let _on_a = effect(move || {
        source.get("a");
        log.borrow_mut().push("a");
    });
    let (source, log) = (state.clone(), order.clone());
    let _on_b = effect(move || {
        source.get("b");
        log.borrow_mut().push("b");
    });
    order.borrow_mut().clear();

    state.set("a", 2);
    assert_eq!(*order.borrow(), vec!["a"]);
}

/// Test that a computed value tracks box dependencies.
#[test]
fn computed_tracks_box_dependency() {
    let count = value_ref(10);

    let source = count.clone();
    let doubled = computed(move || source.get().as_int().unwrap_or(0) * 2);
    assert_eq!(doubled.get(), 20);

    count.set(5);
    assert_eq!(doubled.get(), 10);
}

/// Test that computed values can depend on other computed values.
#[test]
fn computed_depends_on_computed() {
    let base = value_ref(5);

    let source = base.clone();
    let doubled = computed(move || source.get().as_int().unwrap_or(0) * 2);
    let inner = doubled.clone();
    let plus_ten = computed(move || inner.get() + 10);

    assert_eq!(doubled.get(), 10);
    assert_eq!(plus_ten.get(), 20);

    base.set(10);
    assert_eq!(doubled.get(), 20);
    assert_eq!(plus_ten.get(), 30);
}

/// Test that computed values cache an expensive computation.
#[test]
fn computed_caches_expensive_computation() {
    let compute_count = counter();
    let a = value_ref(1);
    let b = value_ref(2);

    let (x, y, calls) = (a.clone(), b.clone(), compute_count.clone());
    let sum = computed(move || {
        calls.set(calls.get() + 1);
        x.get().as_int().unwrap_or(0) + y.get().as_int().unwrap_or(0)
    });

    assert_eq!(sum.get(), 3);
    assert_eq!(sum.get(), 3);
    assert_eq!(compute_count.get(), 1);

    a.set(4);
    assert_eq!(sum.get(), 6);
    assert_eq!(compute_count.get(), 2);
}

/// Test stopping an effect ends execution.
#[test]
fn stopped_effect_does_not_run() {
    let state = reactive(&Target::map());
    let run_count = counter();

    let (source, observed) = (state.clone(), run_count.clone());
    let effect = effect(move || {
        source.get("k");
        source.len();
        observed.set(observed.get() + 1);
    });
    assert_eq!(run_count.get(), 1);

    stop(&effect);
    state.set("k", 1);
    state.set("k", 2);
    state.clear();
    assert_eq!(run_count.get(), 1);
}

#[test]
fn n_box_increments_trigger_n_reruns() {
    let count = value_ref(0);
    let run_count = counter();

    let (source, observed) = (count.clone(), run_count.clone());
    let _effect = effect(move || {
        source.get();
        observed.set(observed.get() + 1);
    });

    for _ in 0..25 {
        count.update(|v| Value::from(v.as_int().unwrap_or(0) + 1));
    }
    assert_eq!(run_count.get(), 26);
}

/// Same-value writes do not trigger, whichever numeric form carries them.
#[test]
fn same_value_writes_never_trigger() {
    let state = reactive(&Target::record_from([
        ("n", Value::Int(1)),
        ("x", Value::Float(f64::NAN)),
    ]));
    let run_count = counter();

    let (source, observed) = (state.clone(), run_count.clone());
    let _effect = effect(move || {
        source.get("n");
        source.get("x");
        observed.set(observed.get() + 1);
    });

    state.set("n", 1.0);
    state.set("x", f64::NAN);
    assert_eq!(run_count.get(), 1);

    state.set("n", 1.5);
    assert_eq!(run_count.get(), 2);
}

#[test]
fn handles_are_canonical_and_unwrap_to_their_target() {
    let raw = Target::record();
    for mode in [
        Mode::Reactive,
        Mode::ShallowReactive,
        Mode::Readonly,
        Mode::ShallowReadonly,
    ] {
        assert!(wrap(&raw, mode).ptr_eq(&wrap(&raw, mode)));
        assert!(unwrap(&wrap(&raw, mode)).ptr_eq(&raw));
    }
}

#[test]
fn nested_readonly_is_enforced_deeply() {
    let child = Target::record_from([("x", 1)]);
    let raw = Target::record_from([("child", &child)]);
    let view = readonly(&raw);

    let nested = view.get("child").unwrap();
    assert!(is_readonly(&nested));
    nested.as_handle().unwrap().set("x", 2);
    assert_eq!(child.get(&Value::from("x")), Some(Value::from(1)));
}

/// A computed value stored in a record reads as its value.
#[test]
fn computed_box_fields_unwrap() {
    let count = value_ref(2);
    let source = count.clone();
    let squared = computed(move || {
        let n = source.get().as_int().unwrap_or(0);
        Value::from(n * n)
    });

    let state = reactive(&Target::record_from([("squared", Value::from(squared))]));
    assert_eq!(state.get("squared"), Some(Value::from(4)));
    count.set(3);
    assert_eq!(state.get("squared"), Some(Value::from(9)));
}

/// A panicking effect leaves the context stack empty and the engine usable.
#[test]
fn panicking_effect_restores_the_context() {
    let count = value_ref(0);
    let run_count = counter();

    let (source, observed) = (count.clone(), run_count.clone());
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        effect(move || {
            let n = source.get().as_int().unwrap_or(0);
            observed.set(observed.get() + 1);
            if n == 0 {
                panic!("first run fails");
            }
        })
    }));
    assert!(result.is_err());
    assert!(!ReactiveContext::is_active());

    // The link recorded before the panic still drives re-runs.
    count.set(1);
    assert_eq!(run_count.get(), 2);
    assert!(!ReactiveContext::is_active());
}

/// Introspection never creates a dependency.
#[test]
fn introspection_is_untracked() {
    let raw = Target::record();
    let state = Value::from(reactive(&raw));

    let probe = state.clone();
    let effect = effect(move || {
        is_reactive(&probe);
        is_readonly(&probe);
        to_raw(&probe);
    });
    assert_eq!(effect.dependency_count(), 0);
    assert!(!Runtime::has_dependents(&raw));
}

/// Dropping a target removes its graph entries while the subscriber lives on.
#[test]
fn dropping_a_target_forgets_its_entries() {
    let before = Runtime::tracked_target_count();
    let raw = Target::record_from([("a", 1)]);
    let id = raw.id();

    let slot = Rc::new(RefCell::new(Some(reactive(&raw))));
    let held = slot.clone();
    let effect = effect(move || {
        if let Some(state) = held.borrow().as_ref() {
            state.get("a");
        }
    });
    assert!(Runtime::has_dependents(&id));

    slot.borrow_mut().take();
    drop(raw);
    assert!(effect.is_active());
    assert!(!Runtime::has_dependents(&id));
    assert_eq!(Runtime::tracked_target_count(), before);
}

#[test]
fn scope_stops_everything_created_inside() {
    let count = value_ref(0);
    let run_count = counter();
    let scope = EffectScope::new();

    scope.run(|| {
        let (source, observed) = (count.clone(), run_count.clone());
        effect(move || {
            source.get();
            observed.set(observed.get() + 1);
        });
    });

    count.set(1);
    assert_eq!(run_count.get(), 2);

    scope.stop();
    count.set(2);
    assert_eq!(run_count.get(), 2);
}

#[test]
fn job_queue_dedupes_and_orders() {
    let queue = JobQueue::new();
    let state = reactive(&Target::record_from([("a", 0), ("b", 0)]));
    let order = Rc::new(RefCell::new(Vec::new()));

    let mut effects = Vec::new();
    for key in ["a", "b"] {
        let (source, log) = (state.clone(), order.clone());
        effects.push(create_subscriber(
            move || {
                source.get("a");
                source.get("b");
                log.borrow_mut().push(key);
            },
            SubscriberOptions::default().with_scheduler(queue.scheduler()),
        ));
    }
    order.borrow_mut().clear();

    state.set("a", 1);
    state.set("b", 1);
    state.set("a", 2);
    assert!(order.borrow().is_empty());
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.flush(), 2);
    assert_eq!(*order.borrow(), vec!["a", "b"]);
}

#[test]
fn diagnostics_reach_the_handler() {
    let warnings = Rc::new(RefCell::new(Vec::new()));
    let sink = warnings.clone();
    set_warn_handler(move |err| sink.borrow_mut().push(err.clone()));

    let raw = Target::record_from([("a", 1)]);
    readonly(&raw).set("a", 2);

    if cfg!(feature = "diagnostics") {
        assert!(matches!(
            warnings.borrow().as_slice(),
            [ReactiveError::ReadonlyTarget { .. }]
        ));
    } else {
        assert!(warnings.borrow().is_empty());
    }
    assert!(!Runtime::is_tracked(&raw, &TrackKey::from("a")));
}
