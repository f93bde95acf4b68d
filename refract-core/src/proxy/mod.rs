//! Interception Layer
//!
//! A [`Handle`] is an observable façade over one [`Target`] in one [`Mode`].
//! Reads through a handle record dependencies, writes notify dependents,
//! and readonly handles refuse writes with a diagnostic.
//!
//! # Dispatch
//!
//! Records go through the handler tables in `base`. Maps, sets and the
//! weak-keyed kinds expose a fixed method surface implemented in
//! `collection`. Each module keeps one static table per mode, so the
//! mode decides both the write policy and how nested values are wrapped.
//!
//! # Canonicalization
//!
//! Wrapping the same target in the same mode twice yields the same handle:
//! the target keeps a weak slot per mode. A handle keeps its target alive,
//! never the other way around.
//!
//! # Nested values
//!
//! Containers read out of a deep handle are wrapped on the way out, in the
//! nested mode of the parent. Nothing is traversed up front.

mod base;
mod collection;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde_json::Value as Json;

use crate::error::{warn_with, ReactiveError};
use crate::graph::{Observable, TargetId};
use crate::target::{Target, TargetKind};
use crate::value::Value;

/// The four ways to wrap a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl Mode {
    pub fn is_readonly(self) -> bool {
        matches!(self, Mode::Readonly | Mode::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Mode::ShallowReactive | Mode::ShallowReadonly)
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Mode::Reactive => 0,
            Mode::ShallowReactive => 1,
            Mode::Readonly => 2,
            Mode::ShallowReadonly => 3,
        }
    }

    /// Mode applied to containers read out of a handle in this mode;
    /// `None` for shallow modes, which pass nested values through.
    pub fn nested(self) -> Option<Mode> {
        match self {
            Mode::Reactive | Mode::Readonly => Some(self),
            Mode::ShallowReactive | Mode::ShallowReadonly => None,
        }
    }
}

/// A wrapped container.
///
/// Equality and hashing follow (raw target, mode), which is exactly the
/// canonical identity of a handle.
#[derive(Clone)]
pub struct Handle {
    inner: Rc<HandleInner>,
}

pub(crate) struct HandleInner {
    target: Target,
    mode: Mode,
}

impl Handle {
    pub(crate) fn from_inner(inner: Rc<HandleInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn target(&self) -> &Target {
        &self.inner.target
    }

    /// The raw target behind this handle.
    pub fn raw(&self) -> Target {
        self.inner.target.clone()
    }

    pub fn raw_id(&self) -> TargetId {
        self.inner.target.id()
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn kind(&self) -> TargetKind {
        self.inner.target.kind()
    }

    pub fn is_readonly(&self) -> bool {
        self.mode().is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.mode().is_shallow()
    }

    pub fn is_reactive(&self) -> bool {
        !self.is_readonly()
    }

    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a field (records) or an entry (maps). Tracks the key even when
    /// it is absent.
    pub fn get(&self, key: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        match self.kind() {
            TargetKind::Record => base::handlers(self.mode()).get(self, &key),
            TargetKind::Map | TargetKind::WeakMap => {
                collection::instrumentations(self.mode()).get(self, &key)
            }
            kind => unsupported("get", kind, None),
        }
    }

    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        match self.kind() {
            TargetKind::Record => base::handlers(self.mode()).has(self, &key),
            _ => collection::instrumentations(self.mode()).has(self, &key),
        }
    }

    /// Write a field or a map entry. Returns the receiver.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> &Self {
        let (key, value) = (key.into(), value.into());
        match self.kind() {
            TargetKind::Record => base::handlers(self.mode()).set(self, key, value),
            TargetKind::Map | TargetKind::WeakMap => {
                collection::instrumentations(self.mode()).set(self, key, value)
            }
            kind => unsupported("set", kind, ()),
        }
        self
    }

    /// Remove a field, entry or member. Returns whether it existed.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        match self.kind() {
            TargetKind::Record => base::handlers(self.mode()).delete(self, &key),
            _ => collection::instrumentations(self.mode()).delete(self, &key),
        }
    }

    /// Add a member to a set. Returns the receiver.
    pub fn add(&self, value: impl Into<Value>) -> &Self {
        let value = value.into();
        match self.kind() {
            TargetKind::Set | TargetKind::WeakSet => {
                collection::instrumentations(self.mode()).add(self, value)
            }
            kind => unsupported("add", kind, ()),
        }
        self
    }

    pub fn clear(&self) -> &Self {
        match self.kind() {
            TargetKind::Record => unsupported("clear", TargetKind::Record, ()),
            _ => collection::instrumentations(self.mode()).clear(self),
        }
        self
    }

    /// Number of fields, entries or members. Tracks iteration.
    pub fn len(&self) -> usize {
        match self.kind() {
            TargetKind::Record => base::handlers(self.mode()).len(self),
            _ => collection::instrumentations(self.mode()).size(self),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Iter {
        match self.kind() {
            TargetKind::Record => Iter::new(base::handlers(self.mode()).own_keys(self), None),
            _ => Iter::new(
                collection::instrumentations(self.mode()).keys(self),
                self.mode().nested(),
            ),
        }
    }

    pub fn values(&self) -> Iter {
        match self.kind() {
            TargetKind::Record => Iter::new(base::handlers(self.mode()).values(self), None),
            _ => Iter::new(
                collection::instrumentations(self.mode()).values(self),
                self.mode().nested(),
            ),
        }
    }

    pub fn entries(&self) -> Entries {
        match self.kind() {
            TargetKind::Record => {
                Entries::new(base::handlers(self.mode()).entries(self), None)
            }
            _ => Entries::new(
                collection::instrumentations(self.mode()).entries(self),
                self.mode().nested(),
            ),
        }
    }

    /// Visit every (value, key) pair of a collection over a snapshot taken
    /// at call time. The callback receives wrapped values and this handle.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value, &Handle)) {
        match self.kind() {
            TargetKind::Record => unsupported("for_each", TargetKind::Record, ()),
            _ => collection::instrumentations(self.mode()).for_each(self, &mut f),
        }
    }

    /// Untracked snapshot of the raw target.
    pub fn to_json(&self) -> Json {
        self.target().to_json()
    }
}

fn unsupported<T>(op: &'static str, kind: TargetKind, fallback: T) -> T {
    warn_with(|| ReactiveError::Unsupported { op, kind });
    fallback
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.raw_id() == other.raw_id() && self.mode() == other.mode()
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw_id().hash(state);
        self.mode().hash(state);
    }
}

impl Observable for Handle {
    fn target_id(&self) -> TargetId {
        self.raw_id()
    }

    fn is_map_like(&self) -> bool {
        self.target().is_map_like()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("target", &self.raw_id())
            .field("kind", &self.kind())
            .field("mode", &self.mode())
            .finish()
    }
}

/// Items of a handle iteration. Nested containers are wrapped as each item
/// is yielded.
pub struct Iter {
    items: std::vec::IntoIter<Value>,
    nested: Option<Mode>,
}

impl Iter {
    fn new(items: Vec<Value>, nested: Option<Mode>) -> Self {
        Self {
            items: items.into_iter(),
            nested,
        }
    }
}

impl Iterator for Iter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let nested = self.nested;
        self.items.next().map(|value| wrap_value(value, nested))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for Iter {}

/// Key/value pairs of a handle iteration.
pub struct Entries {
    items: std::vec::IntoIter<(Value, Value)>,
    nested: Option<Mode>,
}

impl Entries {
    fn new(items: Vec<(Value, Value)>, nested: Option<Mode>) -> Self {
        Self {
            items: items.into_iter(),
            nested,
        }
    }
}

impl Iterator for Entries {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<(Value, Value)> {
        let nested = self.nested;
        self.items
            .next()
            .map(|(key, value)| (wrap_value(key, nested), wrap_value(value, nested)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for Entries {}

/// Anything [`wrap`] accepts: a raw target or an existing handle.
pub trait Wrappable {
    fn wrap_as(&self, mode: Mode) -> Handle;
}

impl Wrappable for Target {
    fn wrap_as(&self, mode: Mode) -> Handle {
        canonical(self, mode)
    }
}

impl Wrappable for Handle {
    /// A mutable wrap of a handle returns it unchanged; a readonly wrap goes
    /// back to the raw target.
    fn wrap_as(&self, mode: Mode) -> Handle {
        if mode.is_readonly() {
            canonical(self.target(), mode)
        } else {
            self.clone()
        }
    }
}

fn canonical(target: &Target, mode: Mode) -> Handle {
    if let Some(handle) = target.cached_handle(mode) {
        return handle;
    }
    let inner = Rc::new(HandleInner {
        target: target.clone(),
        mode,
    });
    target.cache_handle(mode, &inner);
    Handle { inner }
}

/// Wrap a target, or re-wrap a handle, in `mode`.
///
/// Explicit wrapping ignores [`mark_raw`]; marked targets are only exempt
/// from the automatic wrapping of nested values.
pub fn wrap(source: &impl Wrappable, mode: Mode) -> Handle {
    source.wrap_as(mode)
}

/// Checked form of [`wrap`] for dynamic values.
pub fn try_wrap(value: &Value, mode: Mode) -> Result<Handle, ReactiveError> {
    match value {
        Value::Object(target) if target.is_marked_raw() => Err(ReactiveError::MarkedRaw),
        Value::Object(target) => Ok(wrap(target, mode)),
        Value::Reactive(handle) => Ok(wrap(handle, mode)),
        other => Err(ReactiveError::NotAContainer {
            value: other.to_string(),
        }),
    }
}

/// Wrap a nested value read out of a handle. `nested` is `None` in shallow
/// modes.
pub(crate) fn wrap_value(value: Value, nested: Option<Mode>) -> Value {
    let Some(mode) = nested else {
        return value;
    };
    match value {
        Value::Object(target) if !target.is_marked_raw() => Value::Reactive(wrap(&target, mode)),
        Value::Reactive(handle) => Value::Reactive(wrap(&handle, mode)),
        other => other,
    }
}

pub fn reactive(source: &impl Wrappable) -> Handle {
    wrap(source, Mode::Reactive)
}

pub fn shallow_reactive(source: &impl Wrappable) -> Handle {
    wrap(source, Mode::ShallowReactive)
}

pub fn readonly(source: &impl Wrappable) -> Handle {
    wrap(source, Mode::Readonly)
}

pub fn shallow_readonly(source: &impl Wrappable) -> Handle {
    wrap(source, Mode::ShallowReadonly)
}

pub fn unwrap(handle: &Handle) -> Target {
    handle.raw()
}

/// Replace a wrapped container with its raw target; other values are
/// returned as they are.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Reactive(handle) => Value::Object(handle.raw()),
        other => other.clone(),
    }
}

pub fn is_wrapped(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(handle) if handle.is_reactive())
}

/// True for readonly handles and for boxes that refuse writes, such as a
/// computed value without a setter.
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Reactive(handle) => handle.is_readonly(),
        Value::Ref(boxed) => boxed.is_readonly(),
        _ => false,
    }
}

/// Exclude a target from automatic wrapping when read out of a deep handle.
pub fn mark_raw(target: &Target) -> Target {
    target.set_marked_raw();
    target.clone()
}
