//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! This includes effects, the internal runner of a computed value, and the
//! render functions of an external renderer.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::trace;

use crate::graph::{DepKey, TargetId, TrackKey, TrackOp, TriggerOp};
use crate::value::Value;

use super::context::{untracked, ReactiveContext};
use super::runtime::Runtime;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. IDs grow monotonically,
/// so ordering by ID is ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberKind {
    /// A plain effect.
    Effect,
    /// The runner of a computed value. Settled before effects.
    Computed,
}

/// Decides what happens when a subscriber is triggered, in place of an
/// inline re-run.
pub type Scheduler = Rc<dyn Fn(&Subscriber)>;

/// Receives [`DebuggerEvent`]s.
pub type DebuggerHook = Rc<dyn Fn(&DebuggerEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerOp {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// A dependency being recorded, or a change being announced.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub subscriber: SubscriberId,
    pub target: TargetId,
    pub op: DebuggerOp,
    pub key: Option<TrackKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

/// Options accepted by
/// [`create_subscriber`](crate::reactive::create_subscriber).
#[derive(Clone, Default)]
pub struct SubscriberOptions {
    /// Do not run at creation.
    pub lazy: bool,
    pub scheduler: Option<Scheduler>,
    /// Let the subscriber be re-notified by writes it makes during its own
    /// run.
    pub allow_recurse: bool,
    pub on_track: Option<DebuggerHook>,
    pub on_trigger: Option<DebuggerHook>,
    pub on_stop: Option<Rc<dyn Fn()>>,
}

impl SubscriberOptions {
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn scheduler(self, scheduler: impl Fn(&Subscriber) + 'static) -> Self {
        self.with_scheduler(Rc::new(scheduler))
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }

    pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for SubscriberOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("allow_recurse", &self.allow_recurse)
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// A re-runnable computation whose dependencies are rediscovered on every
/// run.
///
/// Cloning a `Subscriber` clones the reference. The dependency graph holds
/// clones of every linked subscriber until it is cleaned up or stopped.
#[derive(Clone)]
pub struct Subscriber {
    inner: Rc<SubscriberInner>,
}

struct SubscriberInner {
    id: SubscriberId,
    kind: SubscriberKind,
    func: RefCell<Box<dyn FnMut()>>,
    /// Links recorded by the most recent run.
    deps: RefCell<SmallVec<[DepKey; 4]>>,
    active: Cell<bool>,
    run_count: Cell<usize>,
    scheduler: Option<Scheduler>,
    allow_recurse: bool,
    on_track: Option<DebuggerHook>,
    on_trigger: Option<DebuggerHook>,
    on_stop: Option<Rc<dyn Fn()>>,
}

impl Subscriber {
    pub(crate) fn new(
        kind: SubscriberKind,
        func: Box<dyn FnMut()>,
        options: &SubscriberOptions,
    ) -> Self {
        Self {
            inner: Rc::new(SubscriberInner {
                id: SubscriberId::new(),
                kind,
                func: RefCell::new(func),
                deps: RefCell::new(SmallVec::new()),
                active: Cell::new(true),
                run_count: Cell::new(0),
                scheduler: options.scheduler.clone(),
                allow_recurse: options.allow_recurse,
                on_track: options.on_track.clone(),
                on_trigger: options.on_trigger.clone(),
                on_stop: options.on_stop.clone(),
            }),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn kind(&self) -> SubscriberKind {
        self.inner.kind
    }

    pub fn is_computed(&self) -> bool {
        self.inner.kind == SubscriberKind::Computed
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Completed or in-progress tracked runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Links recorded by the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    pub fn has_scheduler(&self) -> bool {
        self.inner.scheduler.is_some()
    }

    pub fn allows_recurse(&self) -> bool {
        self.inner.allow_recurse
    }

    pub fn ptr_eq(&self, other: &Subscriber) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run the function now, rebuilding the dependency set.
    ///
    /// A subscriber that is already running is not re-entered. A stopped
    /// subscriber without a scheduler runs its function untracked; with a
    /// scheduler it does nothing.
    pub fn run(&self) {
        if !self.is_active() {
            if self.inner.scheduler.is_none() {
                untracked(|| self.call());
            }
            return;
        }
        if ReactiveContext::contains(self.id()) {
            return;
        }
        self.run_with(|| self.call());
    }

    /// Run `f` as this subscriber: previous links are dropped and the reads
    /// `f` performs become the new ones.
    ///
    /// A stopped subscriber, or one already on the context stack, just
    /// calls `f`.
    pub fn run_with<R>(&self, f: impl FnOnce() -> R) -> R {
        if !self.is_active() || ReactiveContext::contains(self.id()) {
            return f();
        }

        Runtime::cleanup(self);
        let _context = ReactiveContext::enter(self);
        self.inner.run_count.set(self.inner.run_count.get() + 1);
        trace!(subscriber = %self.id(), runs = self.run_count(), "running subscriber");
        f()
    }

    fn call(&self) {
        // Already borrowed means the function is on the stack in an
        // untracked run.
        if let Ok(mut func) = self.inner.func.try_borrow_mut() {
            (func)();
        }
    }

    /// Remove every link and mark the subscriber inactive. Idempotent.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        Runtime::cleanup(self);
        if let Some(on_stop) = &self.inner.on_stop {
            on_stop();
        }
        trace!(subscriber = %self.id(), "stopped subscriber");
    }

    /// Hand a notification to the scheduler, or re-run inline.
    pub(crate) fn schedule(&self) {
        match &self.inner.scheduler {
            Some(scheduler) => scheduler(self),
            None => self.run(),
        }
    }

    pub(crate) fn push_dep(&self, dep: DepKey) {
        self.inner.deps.borrow_mut().push(dep);
    }

    pub(crate) fn take_deps(&self) -> SmallVec<[DepKey; 4]> {
        self.inner.deps.take()
    }

    pub(crate) fn on_track(&self, event: impl FnOnce() -> DebuggerEvent) {
        if let Some(hook) = &self.inner.on_track {
            hook(&event());
        }
    }

    pub(crate) fn on_trigger(&self, event: impl FnOnce() -> DebuggerEvent) {
        if let Some(hook) = &self.inner.on_trigger {
            hook(&event());
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}
