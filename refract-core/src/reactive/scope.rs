//! Effect scopes.
//!
//! An [`EffectScope`] records every subscriber and computed value created
//! while it is current, so an owner such as a component can stop all of
//! them at once.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::error::{warn, ReactiveError};

use super::subscriber::Subscriber;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<EffectScope>> = const { RefCell::new(Vec::new()) };
}

#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    subscribers: RefCell<Vec<Subscriber>>,
    children: RefCell<Vec<EffectScope>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    active: Cell<bool>,
}

impl EffectScope {
    /// A scope owned by the current scope, if any: stopping the parent
    /// stops it too.
    pub fn new() -> Self {
        let scope = Self::detached();
        if let Some(parent) = current_scope() {
            parent.inner.children.borrow_mut().push(scope.clone());
        }
        scope
    }

    /// A scope with no parent.
    pub fn detached() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                subscribers: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                cleanups: RefCell::new(Vec::new()),
                active: Cell::new(true),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Run `f` with this scope current. An inactive scope does not run `f`.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            warn(ReactiveError::InactiveScope);
            return None;
        }
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = ScopeGuard;
        Some(f())
    }

    /// Record a subscriber created outside [`run`](Self::run). Subscribers
    /// stopped since they were recorded are dropped from the scope.
    pub fn record(&self, subscriber: &Subscriber) {
        if self.is_active() {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.retain(Subscriber::is_active);
            subscribers.push(subscriber.clone());
        }
    }

    /// Register a callback for when the scope stops.
    pub fn on_dispose(&self, f: impl FnOnce() + 'static) {
        self.inner.cleanups.borrow_mut().push(Box::new(f));
    }

    /// Stop every recorded subscriber and child scope, then run the dispose
    /// callbacks. Idempotent.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        let subscribers = self.inner.subscribers.take();
        let children = self.inner.children.take();
        let cleanups = self.inner.cleanups.take();
        trace!(
            subscribers = subscribers.len(),
            children = children.len(),
            "stopping effect scope"
        );

        for subscriber in &subscribers {
            subscriber.stop();
        }
        for child in &children {
            child.stop();
        }
        for cleanup in cleanups {
            cleanup();
        }
    }

    /// Subscribers recorded so far.
    pub fn len(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.is_active())
            .field("subscribers", &self.len())
            .finish()
    }
}

struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let popped = SCOPE_STACK.with(|stack| stack.borrow_mut().pop());
        drop(popped);
    }
}

/// The innermost scope being run.
pub fn current_scope() -> Option<EffectScope> {
    SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Register a callback on the current scope. Returns `false` when no scope
/// is being run.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) -> bool {
    match current_scope() {
        Some(scope) => {
            scope.on_dispose(f);
            true
        }
        None => false,
    }
}

pub(crate) fn record_subscriber(subscriber: &Subscriber) {
    if let Some(scope) = current_scope() {
        scope.record(subscriber);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{computed, effect, value_ref};

    #[test]
    fn stop_stops_everything_created_inside() {
        let count = value_ref(0);
        let runs = Rc::new(Cell::new(0));
        let scope = EffectScope::new();

        let doubled = scope
            .run(|| {
                let (source, observed) = (count.clone(), runs.clone());
                effect(move || {
                    source.get();
                    observed.set(observed.get() + 1);
                });
                let source = count.clone();
                computed(move || source.get().as_int().unwrap_or(0) * 2)
            })
            .unwrap();
        assert_eq!(scope.len(), 2);

        scope.stop();
        count.set(1);
        assert_eq!(runs.get(), 1);
        assert!(!doubled.subscriber().is_active());
    }

    #[test]
    fn child_scopes_stop_with_their_parent() {
        let parent = EffectScope::new();
        let child = parent.run(EffectScope::new).unwrap();
        let detached = parent.run(EffectScope::detached).unwrap();

        parent.stop();
        assert!(!child.is_active());
        assert!(detached.is_active());
    }

    #[test]
    fn dispose_callbacks_run_once() {
        let disposed = Rc::new(Cell::new(0));
        let scope = EffectScope::new();
        let observed = disposed.clone();
        scope.run(|| on_scope_dispose(move || observed.set(observed.get() + 1)));

        scope.stop();
        scope.stop();
        assert_eq!(disposed.get(), 1);
        assert!(!on_scope_dispose(|| {}));
    }

    #[test]
    fn recreated_effects_do_not_accumulate() {
        let count = value_ref(0);
        let scope = EffectScope::new();

        scope.run(|| {
            let mut previous: Option<Subscriber> = None;
            for _ in 0..5 {
                if let Some(old) = previous.take() {
                    old.stop();
                }
                let source = count.clone();
                previous = Some(effect(move || {
                    source.get();
                }));
            }
        });
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn inactive_scope_does_not_run() {
        let scope = EffectScope::new();
        scope.stop();
        assert_eq!(scope.run(|| 1), None);
        assert!(current_scope().is_none());
    }
}
