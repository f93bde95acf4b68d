//! Refract Core
//!
//! This crate provides a fine-grained reactive dependency-tracking engine.
//! It implements:
//!
//! - Observable wrappers over records, maps, sets and weak-keyed collections
//! - Automatic dependency tracking with precise, branch-sensitive cleanup
//! - Effects, lazily recomputed computed values and value boxes
//!
//! Given mutable state, the engine discovers which (container, field) pairs
//! a computation read, and re-runs exactly the computations that depend on a
//! pair when it changes.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: The dynamic [`Value`] stored in containers
//! - `target`: Raw containers ([`Target`]) and their untracked accessors
//! - `proxy`: The interception layer ([`Handle`] and the wrap functions)
//! - `graph`: The dependency graph, its node types and the [`JobQueue`]
//! - `reactive`: Subscribers, effects, computed values, boxes and scopes
//! - `error`: Diagnostics
//!
//! All engine state is thread-local and every handle is `Rc`-based, so a
//! reactive graph stays on the thread that created it.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use refract_core::{computed, effect, reactive, Target};
//!
//! // Wrap a raw record
//! let state = reactive(&Target::record_from([("count", 1)]));
//!
//! // Create a derived value
//! let source = state.clone();
//! let doubled = computed(move || {
//!     source.get("count").and_then(|v| v.as_int()).unwrap_or(0) * 2
//! });
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = log.clone();
//! let _effect = effect(move || sink.borrow_mut().push(doubled.get()));
//!
//! // Update the record: the effect re-runs
//! state.set("count", 5);
//! assert_eq!(*log.borrow(), vec![2, 10]);
//! ```

pub mod error;
pub mod graph;
pub mod proxy;
pub mod reactive;
pub mod target;
pub mod value;

pub use error::{set_warn_handler, take_warn_handler, warn, ReactiveError};
pub use graph::{JobQueue, Observable, TargetId, TrackKey, TrackOp, TriggerOp};
pub use proxy::{
    is_reactive, is_readonly, is_wrapped, mark_raw, reactive, readonly, shallow_reactive,
    shallow_readonly, to_raw, try_wrap, unwrap, wrap, Handle, Mode, Wrappable,
};
pub use reactive::{
    computed, computed_with, create_subscriber, current_scope, custom_ref, effect,
    enable_tracking, is_ref, is_tracking, on_scope_dispose, pause_tracking, proxy_refs,
    reset_tracking, shallow_ref, stop, to_ref, to_refs, track, trigger, trigger_ref, unref,
    untracked, value_ref, Computed, ComputedState, CustomRefControl, DebuggerEvent, DebuggerOp,
    EffectScope, RefsProxy, Scheduler, Subscriber, SubscriberId, SubscriberKind,
    SubscriberOptions, ValueBox,
};
pub use target::{Target, TargetKind};
pub use value::{has_changed, Value};
