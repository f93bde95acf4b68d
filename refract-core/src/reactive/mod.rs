//! Reactive Primitives
//!
//! This module implements the subscriber side of the engine: effects,
//! computed values and value boxes, plus the runtime that links them to
//! the dependency graph.
//!
//! # Concepts
//!
//! ## Value boxes
//!
//! A [`ValueBox`] is a single reactive slot. When it is read within a
//! tracking context (a computed value or an effect), the box registers that
//! context as a dependent. When its value changes, all dependents are
//! notified.
//!
//! ## Computed values
//!
//! A [`Computed`] is a derived value that caches its result. It re-evaluates
//! only when read after one of its dependencies changed.
//!
//! ## Effects
//!
//! An effect is a [`Subscriber`] that runs whenever its dependencies change.
//! Effects synchronize reactive state with the outside world, such as a
//! renderer or a log.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to detect
//! dependencies automatically. When a source is read, we check whether a
//! subscriber is running and, if so, record the dependency.

mod computed;
mod context;
mod effect;
mod refs;
mod runtime;
mod scope;
mod subscriber;

pub use computed::{computed, computed_with, Computed, ComputedState};
pub use context::{
    enable_tracking, is_tracking, pause_tracking, reset_tracking, untracked, ReactiveContext,
};
pub use effect::{create_subscriber, effect, stop};
pub use refs::{
    custom_ref, is_ref, proxy_refs, shallow_ref, to_ref, to_refs, trigger_ref, unref, value_ref,
    CustomRefControl, RefsProxy, ValueBox,
};
pub use runtime::{track, trigger, Runtime};
pub use scope::{current_scope, on_scope_dispose, EffectScope};
pub use subscriber::{
    DebuggerEvent, DebuggerHook, DebuggerOp, Scheduler, Subscriber, SubscriberId, SubscriberKind,
    SubscriberOptions,
};
