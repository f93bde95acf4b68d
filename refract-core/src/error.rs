//! Diagnostics.
//!
//! Usage errors never abort: each operation tolerates them with a fallback
//! value and reports a [`ReactiveError`] through [`warn`]. Diagnostics are
//! logged with `tracing` and forwarded to an optional per-thread handler.
//! Building without the `diagnostics` feature turns reporting into a no-op.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::graph::TriggerOp;
use crate::target::{Target, TargetKind};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("{op} operation {key}failed: target is readonly. {target}")]
    ReadonlyTarget {
        op: TriggerOp,
        key: String,
        target: String,
    },

    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    #[error("{helper}() expects a reactive object but received a plain one")]
    NotReactive { helper: &'static str },

    #[error("value cannot be made reactive: {value}")]
    NotAContainer { value: String },

    #[error("value is marked raw and cannot be made reactive")]
    MarkedRaw,

    #[error(
        "reactive {kind} contains both the raw and reactive versions of the same object, \
         which can lead to inconsistencies"
    )]
    DuplicateIdentityKey { kind: TargetKind },

    #[error("invalid value used as {kind} key: {value}")]
    InvalidWeakKey { kind: TargetKind, value: String },

    #[error("{op} is not supported on a {kind}")]
    Unsupported { op: &'static str, kind: TargetKind },

    #[error(
        "maximum recursive updates exceeded ({limit}); a job may be mutating state it depends on"
    )]
    RecursionLimit { limit: usize },

    #[error("cannot run an inactive effect scope")]
    InactiveScope,
}

impl ReactiveError {
    /// A rejected write on a readonly handle, with a snapshot of the target.
    pub fn readonly(op: TriggerOp, key: Option<&Value>, target: &Target) -> Self {
        ReactiveError::ReadonlyTarget {
            op,
            key: key.map_or_else(String::new, |k| format!("on key \"{k}\" ")),
            target: target.to_json().to_string(),
        }
    }
}

type WarnHandler = Rc<dyn Fn(&ReactiveError)>;

thread_local! {
    static WARN_HANDLER: RefCell<Option<WarnHandler>> = const { RefCell::new(None) };
}

/// Install a handler for diagnostics reported on this thread, replacing any
/// previous one.
pub fn set_warn_handler(handler: impl Fn(&ReactiveError) + 'static) {
    WARN_HANDLER.with(|slot| *slot.borrow_mut() = Some(Rc::new(handler)));
}

/// Remove and return the current handler.
pub fn take_warn_handler() -> Option<Rc<dyn Fn(&ReactiveError)>> {
    WARN_HANDLER.with(|slot| slot.borrow_mut().take())
}

/// Report a diagnostic.
pub fn warn(err: ReactiveError) {
    #[cfg(feature = "diagnostics")]
    {
        tracing::warn!(error = %err, "reactivity diagnostic");
        // Cloned out so the handler may replace itself.
        let handler = WARN_HANDLER.with(|slot| slot.borrow().clone());
        if let Some(handler) = handler {
            handler(&err);
        }
    }
    #[cfg(not(feature = "diagnostics"))]
    let _ = err;
}

/// Report a diagnostic built lazily; `make` is not called when diagnostics
/// are compiled out.
pub fn warn_with(make: impl FnOnce() -> ReactiveError) {
    #[cfg(feature = "diagnostics")]
    warn(make());
    #[cfg(not(feature = "diagnostics"))]
    let _ = make;
}
