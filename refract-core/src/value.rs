//! Dynamic values stored in reactive containers.
//!
//! Equality is same-value-zero: `NaN` equals `NaN`, `0.0` equals `-0.0`,
//! an integral float equals the int of the same value, strings compare by
//! content and every container, handle or box compares
//! by identity. `Hash` agrees with that equality, so any `Value` can key a
//! map or a set.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde::{Serialize, Serializer};
use serde_json::{Number, Value as Json};

use crate::graph::TargetId;
use crate::proxy::Handle;
use crate::reactive::{untracked, ValueBox};
use crate::target::Target;

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A raw container.
    Object(Target),
    /// A wrapped container.
    Reactive(Handle),
    /// A value box stored as a field.
    Ref(ValueBox),
}

/// Reports whether writing `new` over `old` is an observable change.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    new != old
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Raw or wrapped container.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Reactive(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_box(&self) -> Option<&ValueBox> {
        match self {
            Value::Ref(boxed) => Some(boxed),
            _ => None,
        }
    }

    /// The raw container behind a raw or wrapped container value.
    pub fn raw_target(&self) -> Option<Target> {
        match self {
            Value::Object(target) => Some(target.clone()),
            Value::Reactive(handle) => Some(handle.raw()),
            _ => None,
        }
    }

    /// Identity of a container or box, `None` for primitives. Raw and
    /// wrapped forms of a container share the raw identity.
    pub fn identity(&self) -> Option<TargetId> {
        match self {
            Value::Object(target) => Some(target.id()),
            Value::Reactive(handle) => Some(handle.raw_id()),
            Value::Ref(boxed) => Some(boxed.id()),
            _ => None,
        }
    }

    /// Snapshot of the raw state as JSON. Reads are untracked; boxes are
    /// read through, handles serialize their raw target, and a container
    /// reached again while serializing itself renders as `"[Circular]"`.
    pub fn to_json(&self) -> Json {
        untracked(|| self.snapshot(&mut Vec::new()))
    }

    pub(crate) fn snapshot(&self, seen: &mut Vec<TargetId>) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::Str(s) => Json::String(s.to_string()),
            Value::Object(target) => target.snapshot(seen),
            Value::Reactive(handle) => handle.raw().snapshot(seen),
            Value::Ref(boxed) => boxed.peek().snapshot(seen),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
                integral(*f) == Some(*i)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Ints and integral floats share the int hash.
        if let Value::Float(f) = self {
            if let Some(i) = integral(*f) {
                return Value::Int(i).hash(state);
            }
        }
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => {
                let bits = if f.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    f.to_bits()
                };
                bits.hash(state);
            }
            Value::Str(s) => s.hash(state),
            Value::Object(target) => target.id().hash(state),
            Value::Reactive(handle) => handle.hash(state),
            Value::Ref(boxed) => boxed.id().hash(state),
        }
    }
}

/// The exact `i64` a float holds, if it holds one. Both zeros map to `0`.
fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 is 2^63, itself out of range.
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then(|| f as i64)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Object(target) => write!(f, "{}({})", target.kind(), target.id()),
            Value::Reactive(handle) => {
                write!(f, "{:?}<{}({})>", handle.mode(), handle.kind(), handle.raw_id())
            }
            Value::Ref(boxed) => write!(f, "Ref({})", boxed.id()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<&Target> for Value {
    fn from(target: &Target) -> Self {
        Value::Object(target.clone())
    }
}

impl From<Handle> for Value {
    fn from(handle: Handle) -> Self {
        Value::Reactive(handle)
    }
}

impl From<&Handle> for Value {
    fn from(handle: &Handle) -> Self {
        Value::Reactive(handle.clone())
    }
}

impl From<ValueBox> for Value {
    fn from(boxed: ValueBox) -> Self {
        Value::Ref(boxed)
    }
}

impl From<&ValueBox> for Value {
    fn from(boxed: &ValueBox) -> Self {
        Value::Ref(boxed.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}
