//! Raw containers.
//!
//! A [`Target`] is the raw, externally owned state that handles wrap. Its
//! accessors here are untracked: they neither record dependencies nor
//! notify subscribers. Go through a [`Handle`] for reactive access.
//!
//! Each target carries one weak slot per wrap mode. The slots canonicalize
//! handles without keeping them alive, and dropping the target forgets its
//! dependency-graph entries.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as Json};

use crate::error::{warn_with, ReactiveError};
use crate::graph::{Observable, TargetId};
use crate::proxy::{Handle, HandleInner, Mode};
use crate::reactive::Runtime;
use crate::value::Value;

/// Shape of a raw container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TargetKind {
    Record,
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl TargetKind {
    /// Everything but records exposes the fixed collection method surface.
    pub fn is_collection(self) -> bool {
        !matches!(self, TargetKind::Record)
    }

    pub fn is_weak(self) -> bool {
        matches!(self, TargetKind::WeakMap | TargetKind::WeakSet)
    }

    /// Kinds that store a value per key.
    pub fn is_keyed(self) -> bool {
        matches!(self, TargetKind::Record | TargetKind::Map | TargetKind::WeakMap)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::Record => "record",
            TargetKind::Map => "map",
            TargetKind::Set => "set",
            TargetKind::WeakMap => "weak map",
            TargetKind::WeakSet => "weak set",
        };
        f.write_str(name)
    }
}

struct WeakEntry {
    key: Weak<TargetInner>,
    value: Value,
}

enum Container {
    Keyed(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
    Weak(IndexMap<TargetId, WeakEntry>),
}

/// A raw container: record, map, set, or weak-keyed map or set.
///
/// Cloning a `Target` clones the reference, not the contents.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

pub(crate) struct TargetInner {
    id: TargetId,
    kind: TargetKind,
    data: RefCell<Container>,
    skip: Cell<bool>,
    handles: RefCell<[Weak<HandleInner>; 4]>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        Runtime::forget(self.id);
    }
}

impl Target {
    fn with_container(kind: TargetKind, data: Container) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: TargetId::new(),
                kind,
                data: RefCell::new(data),
                skip: Cell::new(false),
                handles: RefCell::new(Default::default()),
            }),
        }
    }

    pub fn record() -> Self {
        Self::with_container(TargetKind::Record, Container::Keyed(IndexMap::new()))
    }

    pub fn map() -> Self {
        Self::with_container(TargetKind::Map, Container::Keyed(IndexMap::new()))
    }

    pub fn set() -> Self {
        Self::with_container(TargetKind::Set, Container::Set(IndexSet::new()))
    }

    pub fn weak_map() -> Self {
        Self::with_container(TargetKind::WeakMap, Container::Weak(IndexMap::new()))
    }

    pub fn weak_set() -> Self {
        Self::with_container(TargetKind::WeakSet, Container::Weak(IndexMap::new()))
    }

    pub fn record_from<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_container(TargetKind::Record, Container::Keyed(data))
    }

    pub fn map_from<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_container(TargetKind::Map, Container::Keyed(data))
    }

    pub fn set_from<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let data = values.into_iter().map(Into::into).collect();
        Self::with_container(TargetKind::Set, Container::Set(data))
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn kind(&self) -> TargetKind {
        self.inner.kind
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether [`mark_raw`](crate::mark_raw) excluded this target from
    /// automatic wrapping.
    pub fn is_marked_raw(&self) -> bool {
        self.inner.skip.get()
    }

    pub(crate) fn set_marked_raw(&self) {
        self.inner.skip.set(true);
    }

    pub(crate) fn cached_handle(&self, mode: Mode) -> Option<Handle> {
        self.inner.handles.borrow()[mode.slot()]
            .upgrade()
            .map(Handle::from_inner)
    }

    pub(crate) fn cache_handle(&self, mode: Mode, handle: &Rc<HandleInner>) {
        self.inner.handles.borrow_mut()[mode.slot()] = Rc::downgrade(handle);
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        match &*self.inner.data.borrow() {
            Container::Keyed(map) => map.get(key).cloned(),
            Container::Set(set) => set.get(key).cloned(),
            Container::Weak(map) => {
                let id = key.identity()?;
                map.get(&id)
                    .filter(|entry| entry.key.strong_count() > 0)
                    .map(|entry| entry.value.clone())
            }
        }
    }

    pub fn contains(&self, key: &Value) -> bool {
        match &*self.inner.data.borrow() {
            Container::Keyed(map) => map.contains_key(key),
            Container::Set(set) => set.contains(key),
            Container::Weak(map) => key
                .identity()
                .and_then(|id| map.get(&id))
                .is_some_and(|entry| entry.key.strong_count() > 0),
        }
    }

    /// Insert into a record, map or weak map. Returns the previous value.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let kind = self.kind();

        match &mut *self.inner.data.borrow_mut() {
            Container::Keyed(map) => map.insert(key, value),
            Container::Set(_) => {
                warn_with(|| ReactiveError::Unsupported { op: "insert", kind });
                None
            }
            Container::Weak(map) => {
                let Some(weak_key) = key.raw_target() else {
                    warn_with(|| ReactiveError::InvalidWeakKey {
                        kind,
                        value: key.to_string(),
                    });
                    return None;
                };
                map.retain(|_, entry| entry.key.strong_count() > 0);
                map.insert(
                    weak_key.id(),
                    WeakEntry {
                        key: Rc::downgrade(&weak_key.inner),
                        value,
                    },
                )
                .map(|entry| entry.value)
            }
        }
    }

    /// Add to a set or weak set. Returns `false` if already present.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        let kind = self.kind();

        match &mut *self.inner.data.borrow_mut() {
            Container::Set(set) => set.insert(value),
            Container::Keyed(_) => {
                warn_with(|| ReactiveError::Unsupported { op: "add", kind });
                false
            }
            Container::Weak(map) => {
                let Some(weak_key) = value.raw_target() else {
                    warn_with(|| ReactiveError::InvalidWeakKey {
                        kind,
                        value: value.to_string(),
                    });
                    return false;
                };
                map.retain(|_, entry| entry.key.strong_count() > 0);
                map.insert(
                    weak_key.id(),
                    WeakEntry {
                        key: Rc::downgrade(&weak_key.inner),
                        value: Value::Null,
                    },
                )
                .is_none()
            }
        }
    }

    /// Remove a key or member. For sets the removed member is returned.
    pub fn remove(&self, key: &Value) -> Option<Value> {
        match &mut *self.inner.data.borrow_mut() {
            Container::Keyed(map) => map.shift_remove(key),
            Container::Set(set) => set.shift_take(key),
            Container::Weak(map) => {
                let id = key.identity()?;
                map.shift_remove(&id).map(|entry| entry.value)
            }
        }
    }

    pub fn clear(&self) {
        match &mut *self.inner.data.borrow_mut() {
            Container::Keyed(map) => map.clear(),
            Container::Set(set) => set.clear(),
            Container::Weak(map) => map.clear(),
        }
    }

    /// Live entries. Weak containers count only entries whose key is alive.
    pub fn len(&self) -> usize {
        match &*self.inner.data.borrow() {
            Container::Keyed(map) => map.len(),
            Container::Set(set) => set.len(),
            Container::Weak(map) => map
                .values()
                .filter(|entry| entry.key.strong_count() > 0)
                .count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in insertion order; for sets, the members. Empty for weak
    /// containers, which cannot be enumerated.
    pub fn keys(&self) -> Vec<Value> {
        match &*self.inner.data.borrow() {
            Container::Keyed(map) => map.keys().cloned().collect(),
            Container::Set(set) => set.iter().cloned().collect(),
            Container::Weak(_) => Vec::new(),
        }
    }

    pub fn values(&self) -> Vec<Value> {
        match &*self.inner.data.borrow() {
            Container::Keyed(map) => map.values().cloned().collect(),
            Container::Set(set) => set.iter().cloned().collect(),
            Container::Weak(_) => Vec::new(),
        }
    }

    /// Key/value pairs; sets pair each member with itself.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &*self.inner.data.borrow() {
            Container::Keyed(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Container::Set(set) => set.iter().map(|v| (v.clone(), v.clone())).collect(),
            Container::Weak(_) => Vec::new(),
        }
    }

    pub fn to_json(&self) -> Json {
        Value::from(self).to_json()
    }

    pub(crate) fn snapshot(&self, seen: &mut Vec<TargetId>) -> Json {
        if seen.contains(&self.id()) {
            return Json::String("[Circular]".to_owned());
        }
        if self.kind().is_weak() {
            return Json::String(format!("[{}]", self.kind()));
        }

        seen.push(self.id());
        let json = match self.kind() {
            TargetKind::Record => {
                let mut object = JsonMap::new();
                for (key, value) in self.entries() {
                    object.insert(key.to_string(), value.snapshot(seen));
                }
                Json::Object(object)
            }
            TargetKind::Map => Json::Array(
                self.entries()
                    .iter()
                    .map(|(k, v)| Json::Array(vec![k.snapshot(seen), v.snapshot(seen)]))
                    .collect(),
            ),
            _ => Json::Array(self.values().iter().map(|v| v.snapshot(seen)).collect()),
        };
        seen.pop();
        json
    }
}

impl Observable for Target {
    fn target_id(&self) -> TargetId {
        self.id()
    }

    fn is_map_like(&self) -> bool {
        self.kind() == TargetKind::Map
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("len", &self.len())
            .field("marked_raw", &self.is_marked_raw())
            .finish()
    }
}
