//! Record handlers.

use crate::error::{warn_with, ReactiveError};
use crate::graph::{TrackKey, TrackOp, TriggerOp};
use crate::reactive::{track, trigger};
use crate::value::{has_changed, Value};

use super::{to_raw, wrap_value, Handle, Mode};

pub(crate) struct BaseHandlers {
    readonly: bool,
    shallow: bool,
}

static MUTABLE: BaseHandlers = BaseHandlers {
    readonly: false,
    shallow: false,
};
static SHALLOW: BaseHandlers = BaseHandlers {
    readonly: false,
    shallow: true,
};
static READONLY: BaseHandlers = BaseHandlers {
    readonly: true,
    shallow: false,
};
static SHALLOW_READONLY: BaseHandlers = BaseHandlers {
    readonly: true,
    shallow: true,
};

pub(crate) fn handlers(mode: Mode) -> &'static BaseHandlers {
    match mode {
        Mode::Reactive => &MUTABLE,
        Mode::ShallowReactive => &SHALLOW,
        Mode::Readonly => &READONLY,
        Mode::ShallowReadonly => &SHALLOW_READONLY,
    }
}

impl BaseHandlers {
    pub fn get(&self, handle: &Handle, key: &Value) -> Option<Value> {
        let target = handle.target();
        let key = to_raw(key);
        track(target, TrackOp::Get, TrackKey::of(&key));

        let value = target.get(&key)?;
        if self.shallow {
            return Some(value);
        }
        if let Value::Ref(boxed) = &value {
            return Some(boxed.get());
        }
        Some(wrap_value(value, handle.mode().nested()))
    }

    pub fn set(&self, handle: &Handle, key: Value, value: Value) {
        let target = handle.target();
        let key = to_raw(&key);
        if self.readonly {
            warn_with(|| ReactiveError::readonly(TriggerOp::Set, Some(&key), target));
            return;
        }

        let old = target.get(&key);
        let value = if self.shallow {
            value
        } else {
            let value = to_raw(&value);
            // A plain value written over a box goes into the box.
            if let (Some(Value::Ref(boxed)), false) = (&old, matches!(value, Value::Ref(_))) {
                boxed.set(value);
                return;
            }
            value
        };

        target.insert(key.clone(), value.clone());
        match old {
            None => trigger(target, TriggerOp::Add, Some(TrackKey::of(&key)), Some(&value), None),
            Some(old) if has_changed(&value, &old) => trigger(
                target,
                TriggerOp::Set,
                Some(TrackKey::of(&key)),
                Some(&value),
                Some(&old),
            ),
            Some(_) => {}
        }
    }

    pub fn delete(&self, handle: &Handle, key: &Value) -> bool {
        let target = handle.target();
        let key = to_raw(key);
        if self.readonly {
            warn_with(|| ReactiveError::readonly(TriggerOp::Delete, Some(&key), target));
            return false;
        }

        let Some(old) = target.remove(&key) else {
            return false;
        };
        trigger(target, TriggerOp::Delete, Some(TrackKey::of(&key)), None, Some(&old));
        true
    }

    pub fn has(&self, handle: &Handle, key: &Value) -> bool {
        let target = handle.target();
        let key = to_raw(key);
        track(target, TrackOp::Has, TrackKey::of(&key));
        target.contains(&key)
    }

    pub fn own_keys(&self, handle: &Handle) -> Vec<Value> {
        let target = handle.target();
        track(target, TrackOp::Iterate, TrackKey::Iterate);
        target.keys()
    }

    pub fn len(&self, handle: &Handle) -> usize {
        let target = handle.target();
        track(target, TrackOp::Iterate, TrackKey::Iterate);
        target.len()
    }

    /// Enumerates keys, then reads each one through [`get`](Self::get).
    pub fn values(&self, handle: &Handle) -> Vec<Value> {
        self.entries(handle).into_iter().map(|(_, v)| v).collect()
    }

    pub fn entries(&self, handle: &Handle) -> Vec<(Value, Value)> {
        self.own_keys(handle)
            .into_iter()
            .filter_map(|key| self.get(handle, &key).map(|value| (key, value)))
            .collect()
    }
}
