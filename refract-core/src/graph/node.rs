//! Graph Nodes
//!
//! Identifiers and operation kinds shared by everything that reads from or
//! writes to the dependency graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::value::Value;

/// Identity of a dependency source: a raw container, a value box, or a
/// derived value.
///
/// Ids are never reused, so a stale id left behind in a subscriber's link
/// list can never alias a newer source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of read recorded a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// What kind of write is being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

impl fmt::Display for TrackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackOp::Get => "Get",
            TrackOp::Has => "Has",
            TrackOp::Iterate => "Iterate",
        };
        f.write_str(name)
    }
}

impl fmt::Display for TriggerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerOp::Set => "Set",
            TriggerOp::Add => "Add",
            TriggerOp::Delete => "Delete",
            TriggerOp::Clear => "Clear",
        };
        f.write_str(name)
    }
}

/// The key half of a (target, key) dependency.
///
/// Container-valued keys are reduced to the raw identity of the container,
/// so the raw and the wrapped form of the same key share one entry and the
/// graph never holds a strong reference to a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// The single slot of a value box or derived value.
    Slot,
    /// Structural enumeration: keys, values, entries, size, for-each.
    Iterate,
    /// Key-only enumeration of a map. Unaffected by value replacement.
    MapKeyIterate,
    /// A primitive key.
    Field(Value),
    /// A container or box used as a key.
    Identity(TargetId),
}

impl TrackKey {
    pub fn of(key: &Value) -> Self {
        match key.identity() {
            Some(id) => TrackKey::Identity(id),
            None => TrackKey::Field(key.clone()),
        }
    }
}

impl From<&str> for TrackKey {
    fn from(key: &str) -> Self {
        TrackKey::Field(Value::from(key))
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKey::Slot => f.write_str("value"),
            TrackKey::Iterate => f.write_str("<iterate>"),
            TrackKey::MapKeyIterate => f.write_str("<map key iterate>"),
            TrackKey::Field(value) => write!(f, "{value}"),
            TrackKey::Identity(id) => write!(f, "{id}"),
        }
    }
}

/// Anything that can be recorded as a dependency source.
///
/// Implemented by raw containers, value boxes and derived values. A custom
/// source only needs a stable [`TargetId`]; it then calls
/// [`track`](crate::track) on reads and [`trigger`](crate::trigger) on writes.
pub trait Observable {
    fn target_id(&self) -> TargetId;

    /// Map-like sources also notify value iterators on `Set` and key-only
    /// iterators on `Add`/`Delete`.
    fn is_map_like(&self) -> bool {
        false
    }
}

impl Observable for TargetId {
    fn target_id(&self) -> TargetId {
        *self
    }
}
