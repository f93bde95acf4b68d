//! Value Box Implementation
//!
//! A [`ValueBox`] holds a single reactive value. It is the single-slot
//! counterpart of a wrapped container.
//!
//! # How Boxes Work
//!
//! 1. Reading the box within a reactive context registers that context as
//!    a dependent of the box's one slot.
//!
//! 2. Writing a value that differs from the stored one (same-value-zero)
//!    notifies every dependent. Writing the same value does nothing.
//!
//! 3. A deep box stores containers raw and hands out their reactive
//!    handle; a shallow box stores and returns exactly what it was given.
//!
//! # Kinds
//!
//! - A plain box from [`value_ref`] or [`shallow_ref`].
//! - A field box from [`to_ref`], reading and writing one field of a
//!   container.
//! - A custom box from [`custom_ref`], whose reads and writes are user code.
//! - A computed value converted with `ValueBox::from`.
//!
//! All kinds share one handle type, so boxes can be stored as container
//! fields and unwrapped uniformly.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{warn, ReactiveError};
use crate::graph::{Observable, TargetId, TrackKey, TrackOp, TriggerOp};
use crate::proxy::{to_raw, wrap_value, Handle, Mode};
use crate::target::Target;
use crate::value::{has_changed, Value};

use super::context::untracked;
use super::runtime::{track, trigger, Runtime};

/// What a box does underneath.
pub(crate) trait BoxSource: Observable {
    fn get(&self) -> Value;
    fn set(&self, value: Value);
    /// Current value without tracking.
    fn peek(&self) -> Value;

    fn is_shallow(&self) -> bool {
        false
    }

    fn is_readonly(&self) -> bool {
        false
    }

    fn label(&self) -> &'static str;
}

/// A single reactive value.
///
/// Cloning a `ValueBox` clones the reference; equality of boxes stored as
/// values is identity.
///
/// # Example
///
/// ```rust
/// use refract_core::{value_ref, Value};
///
/// let count = value_ref(0);
///
/// // Read the value
/// assert_eq!(count.get(), Value::from(0));
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
#[derive(Clone)]
pub struct ValueBox {
    source: Rc<dyn BoxSource>,
}

impl ValueBox {
    /// A deep box.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::from_source(RefImpl::new(value.into(), false))
    }

    /// A box that stores values exactly as given.
    pub fn shallow(value: impl Into<Value>) -> Self {
        Self::from_source(RefImpl::new(value.into(), true))
    }

    pub(crate) fn from_source(source: impl BoxSource + 'static) -> Self {
        Self {
            source: Rc::new(source),
        }
    }

    pub(crate) fn from_rc(source: Rc<dyn BoxSource>) -> Self {
        Self { source }
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> Value {
        self.source.get()
    }

    /// Set a new value, notifying dependents if it changed.
    pub fn set(&self, value: impl Into<Value>) {
        self.source.set(value.into());
    }

    /// Update the value using a function of the current one.
    ///
    /// The current value is read without tracking.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) {
        let next = f(&self.peek());
        self.set(next);
    }

    /// Get the current value without tracking dependencies.
    pub fn peek(&self) -> Value {
        self.source.peek()
    }

    pub fn id(&self) -> TargetId {
        self.source.target_id()
    }

    pub fn is_shallow(&self) -> bool {
        self.source.is_shallow()
    }

    /// A computed value without a setter.
    pub fn is_readonly(&self) -> bool {
        self.source.is_readonly()
    }

    pub fn ptr_eq(&self, other: &ValueBox) -> bool {
        Rc::ptr_eq(&self.source, &other.source)
    }
}

impl Observable for ValueBox {
    fn target_id(&self) -> TargetId {
        self.id()
    }
}

impl fmt::Debug for ValueBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBox")
            .field("id", &self.id())
            .field("kind", &self.source.label())
            .field("value", &self.peek())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Plain boxes
// ----------------------------------------------------------------------------

struct RefImpl {
    id: TargetId,
    /// What was stored, normalized to raw in deep boxes.
    raw: RefCell<Value>,
    /// What reads return.
    value: RefCell<Value>,
    shallow: bool,
}

impl RefImpl {
    fn new(value: Value, shallow: bool) -> Self {
        let (raw, observed) = if shallow {
            (value.clone(), value)
        } else {
            let raw = to_raw(&value);
            (raw.clone(), wrap_value(raw, Some(Mode::Reactive)))
        };
        Self {
            id: TargetId::new(),
            raw: RefCell::new(raw),
            value: RefCell::new(observed),
            shallow,
        }
    }
}

impl Observable for RefImpl {
    fn target_id(&self) -> TargetId {
        self.id
    }
}

impl BoxSource for RefImpl {
    fn get(&self) -> Value {
        track(self, TrackOp::Get, TrackKey::Slot);
        self.value.borrow().clone()
    }

    fn set(&self, value: Value) {
        let raw = if self.shallow {
            value.clone()
        } else {
            to_raw(&value)
        };
        if !has_changed(&raw, &self.raw.borrow()) {
            return;
        }

        let old = self.raw.replace(raw.clone());
        let observed = if self.shallow {
            value
        } else {
            wrap_value(raw, Some(Mode::Reactive))
        };
        let previous = self.value.replace(observed.clone());
        trigger(self, TriggerOp::Set, Some(TrackKey::Slot), Some(&observed), Some(&old));
        drop(previous);
    }

    fn peek(&self) -> Value {
        self.value.borrow().clone()
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }

    fn label(&self) -> &'static str {
        if self.shallow {
            "shallow ref"
        } else {
            "ref"
        }
    }
}

impl Drop for RefImpl {
    fn drop(&mut self) {
        Runtime::forget(self.id);
    }
}

// ----------------------------------------------------------------------------
// Field boxes
// ----------------------------------------------------------------------------

#[derive(Clone)]
enum FieldSource {
    Handle(Handle),
    Raw(Target),
}

impl FieldSource {
    fn of(value: &Value, helper: &'static str) -> Option<Self> {
        match value {
            Value::Reactive(handle) => Some(FieldSource::Handle(handle.clone())),
            Value::Object(target) => {
                warn(ReactiveError::NotReactive { helper });
                Some(FieldSource::Raw(target.clone()))
            }
            other => {
                warn(ReactiveError::NotAContainer {
                    value: other.to_string(),
                });
                None
            }
        }
    }

    fn raw(&self) -> &Target {
        match self {
            FieldSource::Handle(handle) => handle.target(),
            FieldSource::Raw(target) => target,
        }
    }

    fn get(&self, key: &Value) -> Option<Value> {
        match self {
            FieldSource::Handle(handle) => handle.get(key),
            FieldSource::Raw(target) => target.get(key),
        }
    }

    fn set(&self, key: &Value, value: Value) {
        match self {
            FieldSource::Handle(handle) => {
                handle.set(key, value);
            }
            FieldSource::Raw(target) => {
                target.insert(key, value);
            }
        }
    }

    fn has(&self, key: &Value) -> bool {
        match self {
            FieldSource::Handle(handle) => handle.has(key),
            FieldSource::Raw(target) => target.contains(key),
        }
    }

    fn keys(&self) -> Vec<Value> {
        match self {
            FieldSource::Handle(handle) => handle.keys().map(|key| to_raw(&key)).collect(),
            FieldSource::Raw(target) => target.keys(),
        }
    }
}

/// One field of a container, as a box. Owns no state and records no
/// dependency of its own: reads and writes go through the container.
struct ObjectRef {
    id: TargetId,
    source: FieldSource,
    key: Value,
}

impl Observable for ObjectRef {
    fn target_id(&self) -> TargetId {
        self.id
    }
}

impl BoxSource for ObjectRef {
    fn get(&self) -> Value {
        self.source.get(&self.key).unwrap_or_default()
    }

    fn set(&self, value: Value) {
        self.source.set(&self.key, value);
    }

    fn peek(&self) -> Value {
        untracked(|| self.get())
    }

    fn label(&self) -> &'static str {
        "field ref"
    }
}

// ----------------------------------------------------------------------------
// Custom boxes
// ----------------------------------------------------------------------------

/// Track and trigger controls handed to a [`custom_ref`] factory.
#[derive(Debug, Clone, Copy)]
pub struct CustomRefControl {
    id: TargetId,
}

impl CustomRefControl {
    /// Record a read of the box.
    pub fn track(&self) {
        track(&self.id, TrackOp::Get, TrackKey::Slot);
    }

    /// Notify the box's dependents.
    pub fn trigger(&self) {
        trigger(&self.id, TriggerOp::Set, Some(TrackKey::Slot), None, None);
    }
}

struct CustomRef {
    id: TargetId,
    getter: Box<dyn Fn() -> Value>,
    setter: Box<dyn Fn(Value)>,
}

impl Observable for CustomRef {
    fn target_id(&self) -> TargetId {
        self.id
    }
}

impl BoxSource for CustomRef {
    fn get(&self) -> Value {
        (self.getter)()
    }

    fn set(&self, value: Value) {
        (self.setter)(value);
    }

    fn peek(&self) -> Value {
        untracked(|| (self.getter)())
    }

    fn label(&self) -> &'static str {
        "custom ref"
    }
}

impl Drop for CustomRef {
    fn drop(&mut self) {
        Runtime::forget(self.id);
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// A deep box. Given a box, returns that same box.
pub fn value_ref(value: impl Into<Value>) -> ValueBox {
    match value.into() {
        Value::Ref(boxed) => boxed,
        other => ValueBox::new(other),
    }
}

/// A shallow box. Given a box, returns that same box.
pub fn shallow_ref(value: impl Into<Value>) -> ValueBox {
    match value.into() {
        Value::Ref(boxed) => boxed,
        other => ValueBox::shallow(other),
    }
}

pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The box's value for a box, the value itself otherwise.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(boxed) => boxed.get(),
        other => other.clone(),
    }
}

/// Notify a box's dependents without writing, e.g. after mutating the
/// contents of a shallow box in place.
pub fn trigger_ref(boxed: &ValueBox) {
    let value = boxed.peek();
    trigger(boxed, TriggerOp::Set, Some(TrackKey::Slot), Some(&value), None);
}

/// A box whose reads and writes are user code.
///
/// The factory receives the box's track and trigger controls and returns
/// the getter and setter.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use refract_core::{custom_ref, Value};
///
/// let stored = Rc::new(RefCell::new(Value::from(0)));
/// let (read, write) = (stored.clone(), stored.clone());
/// let boxed = custom_ref(move |control| {
///     (
///         move || {
///             control.track();
///             read.borrow().clone()
///         },
///         move |value: Value| {
///             *write.borrow_mut() = value;
///             control.trigger();
///         },
///     )
/// });
/// boxed.set(3);
/// assert_eq!(boxed.get(), Value::from(3));
/// ```
pub fn custom_ref<F, G, S>(factory: F) -> ValueBox
where
    F: FnOnce(CustomRefControl) -> (G, S),
    G: Fn() -> Value + 'static,
    S: Fn(Value) + 'static,
{
    let control = CustomRefControl { id: TargetId::new() };
    let (getter, setter) = factory(control);
    ValueBox::from_source(CustomRef {
        id: control.id,
        getter: Box::new(getter),
        setter: Box::new(setter),
    })
}

/// A box over one field of a container.
///
/// A field that already holds a box yields that box. On a raw container
/// this reports [`ReactiveError::NotReactive`] and returns a box that reads
/// and writes the raw field. Returns `None` for non-containers.
pub fn to_ref(source: &Value, key: impl Into<Value>) -> Option<ValueBox> {
    let source = FieldSource::of(source, "to_ref")?;
    Some(field_ref(source, key.into()))
}

fn field_ref(source: FieldSource, key: Value) -> ValueBox {
    if let Some(Value::Ref(boxed)) = source.raw().get(&key) {
        return boxed;
    }
    ValueBox::from_source(ObjectRef {
        id: TargetId::new(),
        source,
        key,
    })
}

/// A field box for every key of a container, in key order. Keys are read
/// without tracking.
pub fn to_refs(source: &Value) -> IndexMap<Value, ValueBox> {
    let Some(source) = FieldSource::of(source, "to_refs") else {
        return IndexMap::new();
    };
    source
        .raw()
        .keys()
        .into_iter()
        .map(|key| (key.clone(), field_ref(source.clone(), key)))
        .collect()
}

/// A façade over a container that reads boxed fields as their value and
/// writes plain values into existing boxes.
#[derive(Clone)]
pub struct RefsProxy {
    source: FieldSource,
}

impl RefsProxy {
    pub fn get(&self, key: impl Into<Value>) -> Option<Value> {
        self.source.get(&key.into()).map(|value| unref(&value))
    }

    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        match self.source.raw().get(&key) {
            Some(Value::Ref(boxed)) if !is_ref(&value) => boxed.set(value),
            _ => self.source.set(&key, value),
        }
    }

    pub fn has(&self, key: impl Into<Value>) -> bool {
        self.source.has(&key.into())
    }

    pub fn keys(&self) -> Vec<Value> {
        self.source.keys()
    }
}

impl fmt::Debug for RefsProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefsProxy")
            .field("target", &self.source.raw().id())
            .finish()
    }
}

/// Auto-unwrapping view of a container. `None` for non-containers.
///
/// A raw container is accepted without diagnostics: the view itself does
/// not need reactivity.
pub fn proxy_refs(source: &Value) -> Option<RefsProxy> {
    let source = match source {
        Value::Reactive(handle) => FieldSource::Handle(handle.clone()),
        Value::Object(target) => FieldSource::Raw(target.clone()),
        _ => return None,
    };
    Some(RefsProxy { source })
}
