//! Computed Implementation
//!
//! A Computed value is a cached derived value that re-evaluates only when
//! one of its dependencies changes.
//!
//! # How Computed Values Work
//!
//! 1. On first access, the getter runs as the computed value's own
//!    subscriber and the result is cached.
//!
//! 2. When accessed again, if no dependency has changed, the cached value
//!    is returned.
//!
//! 3. When a dependency changes, the computed value is marked dirty and its
//!    own dependents are notified. It does not recompute yet.
//!
//! 4. On next access, the getter runs again.
//!
//! # Why This Matters
//!
//! - A box changes
//! - 10 computed values depend on it
//! - Only the ones actually read will recompute
//! - Computed values that are never read stay dirty (no wasted work)

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use crate::error::{warn, ReactiveError};
use crate::graph::{Observable, TargetId, TrackKey, TrackOp, TriggerOp};
use crate::value::Value;

use super::context::untracked;
use super::refs::{BoxSource, ValueBox};
use super::runtime::{track, trigger, Runtime};
use super::scope::record_subscriber;
use super::subscriber::{Subscriber, SubscriberKind, SubscriberOptions};

/// Dirty state for a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed, or the getter never ran.
    Dirty,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// Cloning a `Computed` clones the reference. Dropping the last clone stops
/// the internal subscriber.
///
/// # Example
///
/// ```rust
/// use refract_core::{computed, value_ref};
///
/// let count = value_ref(2);
/// let source = count.clone();
/// let doubled = computed(move || source.get().as_int().unwrap_or(0) * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: Clone + 'static> {
    inner: Rc<ComputedInner<T>>,
}

pub(crate) struct ComputedInner<T> {
    id: TargetId,
    getter: Box<dyn Fn() -> T>,
    setter: Option<Box<dyn Fn(T)>>,
    /// The cached value (None if never computed).
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    subscriber: Subscriber,
}

impl<T: Clone + 'static> Computed<T> {
    fn build(getter: Box<dyn Fn() -> T>, setter: Option<Box<dyn Fn(T)>>) -> Self {
        let inner = Rc::new_cyclic(|weak: &std::rc::Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let options = SubscriberOptions::default().lazy().scheduler(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            });
            ComputedInner {
                id: TargetId::new(),
                getter,
                setter,
                value: RefCell::new(None),
                dirty: Cell::new(true),
                subscriber: Subscriber::new(SubscriberKind::Computed, Box::new(|| {}), &options),
            }
        });
        record_subscriber(&inner.subscriber);
        Self { inner }
    }

    /// Get the computed value's unique ID.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> T {
        self.inner.value()
    }

    /// Get the value without registering a dependency. Still recomputes
    /// if dirty.
    pub fn peek(&self) -> T {
        untracked(|| self.inner.value())
    }

    /// Pass a value to the setter. Without one this reports
    /// [`ReactiveError::ReadonlyComputed`] and does nothing.
    pub fn set(&self, value: T) {
        self.inner.write(value);
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// Get the current dirty state.
    pub fn state(&self) -> ComputedState {
        if self.inner.dirty.get() {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    /// Check if the computed value has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// The internal runner. It never runs a function of its own; it only
    /// provides the tracking context for the getter.
    pub fn subscriber(&self) -> &Subscriber {
        &self.inner.subscriber
    }

    /// Stop tracking. The last value stays cached.
    pub fn stop(&self) {
        self.inner.subscriber.stop();
    }
}

impl<T: Clone> ComputedInner<T> {
    fn value(&self) -> T {
        track(self, TrackOp::Get, TrackKey::Slot);

        let cached = if self.dirty.get() {
            None
        } else {
            self.value.borrow().clone()
        };
        match cached {
            Some(value) => value,
            None => {
                let value = self.subscriber.run_with(|| (self.getter)());
                *self.value.borrow_mut() = Some(value.clone());
                self.dirty.set(false);
                value
            }
        }
    }

    fn write(&self, value: T) {
        match &self.setter {
            Some(setter) => setter(value),
            None => warn(ReactiveError::ReadonlyComputed),
        }
    }

    /// A dependency changed: go dirty and tell our own dependents.
    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            trigger(self, TriggerOp::Set, Some(TrackKey::Slot), None, None);
        }
    }
}

impl<T> Observable for ComputedInner<T> {
    fn target_id(&self) -> TargetId {
        self.id
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.subscriber.stop();
        Runtime::forget(self.id);
    }
}

impl<T: Clone + 'static> Observable for Computed<T> {
    fn target_id(&self) -> TargetId {
        self.inner.id
    }
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

impl BoxSource for ComputedInner<Value> {
    fn get(&self) -> Value {
        self.value()
    }

    fn set(&self, value: Value) {
        self.write(value);
    }

    fn peek(&self) -> Value {
        untracked(|| self.value())
    }

    fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }

    fn label(&self) -> &'static str {
        "computed"
    }
}

impl From<Computed<Value>> for ValueBox {
    fn from(computed: Computed<Value>) -> Self {
        ValueBox::from_rc(computed.inner.clone())
    }
}

impl From<Computed<Value>> for Value {
    fn from(computed: Computed<Value>) -> Self {
        Value::Ref(ValueBox::from(computed))
    }
}

/// A readonly computed value.
pub fn computed<T: Clone + 'static>(getter: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::build(Box::new(getter), None)
}

/// A writable computed value. Writes go to `setter`, which typically
/// updates the sources the getter reads.
pub fn computed_with<T: Clone + 'static>(
    getter: impl Fn() -> T + 'static,
    setter: impl Fn(T) + 'static,
) -> Computed<T> {
    Computed::build(Box::new(getter), Some(Box::new(setter)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, value_ref};

    #[test]
    fn computed_is_lazy_and_cached() {
        let call_count = Rc::new(Cell::new(0));
        let call_count_clone = call_count.clone();

        let computed = computed(move || {
            call_count_clone.set(call_count_clone.get() + 1);
            42
        });

        // Not computed yet
        assert!(!computed.has_value());
        assert_eq!(computed.state(), ComputedState::Dirty);
        assert_eq!(call_count.get(), 0);

        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(call_count.get(), 1);
        assert_eq!(computed.state(), ComputedState::Clean);
    }

    #[test]
    fn sum_recomputes_once_after_a_change() {
        let a = value_ref(1);
        let b = value_ref(2);
        let call_count = Rc::new(Cell::new(0));

        let (x, y, calls) = (a.clone(), b.clone(), call_count.clone());
        let sum = computed(move || {
            calls.set(calls.get() + 1);
            x.get().as_int().unwrap_or(0) + y.get().as_int().unwrap_or(0)
        });

        assert_eq!(sum.get(), 3);
        assert_eq!(sum.get(), 3);
        assert_eq!(call_count.get(), 1);

        a.set(10);
        // Invalidation does not recompute.
        assert_eq!(call_count.get(), 1);
        assert_eq!(sum.state(), ComputedState::Dirty);

        assert_eq!(sum.get(), 12);
        assert_eq!(sum.get(), 12);
        assert_eq!(call_count.get(), 2);
    }

    #[test]
    fn effects_reading_a_computed_rerun() {
        let count = value_ref(1);
        let source = count.clone();
        let doubled = computed(move || source.get().as_int().unwrap_or(0) * 2);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (reader, log) = (doubled.clone(), seen.clone());
        let _effect = effect(move || log.borrow_mut().push(reader.get()));

        count.set(2);
        count.set(3);
        assert_eq!(*seen.borrow(), vec![2, 4, 6]);
    }

    #[test]
    fn effect_reading_source_and_computed_runs_once_per_change() {
        let count = value_ref(1);
        let source = count.clone();
        let doubled = computed(move || source.get().as_int().unwrap_or(0) * 2);

        let runs = Rc::new(Cell::new(0));
        let (direct, derived, observed) = (count.clone(), doubled.clone(), runs.clone());
        let _effect = effect(move || {
            direct.get();
            derived.get();
            observed.set(observed.get() + 1);
        });

        count.set(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn chained_computed_values() {
        let base = value_ref(1);
        let source = base.clone();
        let plus_one = computed(move || source.get().as_int().unwrap_or(0) + 1);
        let inner = plus_one.clone();
        let times_ten = computed(move || inner.get() * 10);

        assert_eq!(times_ten.get(), 20);
        base.set(4);
        assert_eq!(times_ten.get(), 50);
    }

    #[test]
    fn writable_computed_delegates_to_setter() {
        let count = value_ref(1);
        let (reader, writer) = (count.clone(), count.clone());
        let plus_one = computed_with(
            move || reader.get().as_int().unwrap_or(0) + 1,
            move |value: i64| writer.set(value - 1),
        );

        plus_one.set(10);
        assert_eq!(count.peek(), Value::from(9));
        assert_eq!(plus_one.get(), 10);
        assert!(!plus_one.is_readonly());
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn readonly_computed_rejects_writes() {
        use crate::error::set_warn_handler;

        let warned = Rc::new(Cell::new(false));
        let flag = warned.clone();
        set_warn_handler(move |err| flag.set(err == &ReactiveError::ReadonlyComputed));

        let constant = computed(|| 1);
        constant.set(2);
        assert!(warned.get());
        assert_eq!(constant.get(), 1);
    }

    #[test]
    fn computed_converts_into_a_box() {
        let count = value_ref(1);
        let source = count.clone();
        let offset = computed(move || Value::from(source.get().as_int().unwrap_or(0) + 100));
        let boxed = ValueBox::from(offset);

        assert_eq!(boxed.get(), Value::from(101));
        assert!(boxed.is_readonly());
        count.set(2);
        assert_eq!(boxed.get(), Value::from(102));
    }

    #[test]
    fn dropping_the_last_handle_stops_tracking() {
        let count = value_ref(1);
        let source = count.clone();
        let doubled = computed(move || source.get().as_int().unwrap_or(0) * 2);
        doubled.get();
        assert!(Runtime::is_tracked(&count, &TrackKey::Slot));

        drop(doubled);
        assert!(!Runtime::is_tracked(&count, &TrackKey::Slot));
    }

    #[test]
    fn stopped_computed_keeps_its_last_value() {
        let count = value_ref(1);
        let source = count.clone();
        let doubled = computed(move || source.get().as_int().unwrap_or(0) * 2);
        assert_eq!(doubled.get(), 2);

        doubled.stop();
        count.set(5);
        assert_eq!(doubled.get(), 2);
    }
}
