//! Dependency Graph
//!
//! This module implements the structure that associates every
//! (target, key) pair with the subscribers currently depending on it.
//!
//! # Overview
//!
//! The graph is a two-level map: target → (key → subscriber set). Every
//! link is bidirectional: the graph's entry gains the subscriber, and the
//! subscriber's own link list gains the (target, key) pair, so cleanup
//! before a re-run is proportional to what the subscriber read rather than
//! to the size of the graph.
//!
//! # Design Decisions
//!
//! 1. Subscriber sets keep insertion order, so notification order follows
//!    the order in which subscribers first read a key.
//!
//! 2. Entries are keyed by [`TargetId`], never by the target itself. The
//!    graph holds no strong reference to any target; dropping a target
//!    forgets its entries. Two kinds of entry outlive their data: raw
//!    containers in a reference cycle never drop, and an entry keyed by
//!    `TrackKey::Identity` of a dead weak-collection key stays until the
//!    reading subscriber re-runs or stops.
//!
//! 3. Removal methods hand back what they removed instead of dropping it
//!    in place. Dropping a subscriber can drop the last handle to a target,
//!    whose own `Drop` re-enters the graph, so callers drop removed values
//!    only after releasing their borrow.

mod node;
mod scheduler;

pub use node::{Observable, TargetId, TrackKey, TrackOp, TriggerOp};
pub use scheduler::JobQueue;

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::reactive::{Subscriber, SubscriberId};

/// Subscribers linked to one (target, key) pair, in insertion order.
pub(crate) type Dep = IndexMap<SubscriberId, Subscriber>;

/// A (target, key) pair as recorded on the subscriber side of a link.
pub(crate) type DepKey = (TargetId, TrackKey);

/// Subscribers selected by one trigger call.
#[derive(Default)]
pub(crate) struct Notified {
    /// Derived values, settled first.
    pub computed: Vec<Subscriber>,
    /// Plain effects, each with its run count at collection time.
    pub effects: Vec<(Subscriber, usize)>,
}

impl Notified {
    pub fn is_empty(&self) -> bool {
        self.computed.is_empty() && self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.computed.len() + self.effects.len()
    }
}

#[derive(Default)]
pub(crate) struct DependencyGraph {
    targets: HashMap<TargetId, IndexMap<TrackKey, Dep>>,
}

impl DependencyGraph {
    /// Link `subscriber` to (target, key). Returns `false` when the link
    /// already existed.
    pub fn link(&mut self, target: TargetId, key: &TrackKey, subscriber: &Subscriber) -> bool {
        let dep = self
            .targets
            .entry(target)
            .or_default()
            .entry(key.clone())
            .or_default();

        if dep.contains_key(&subscriber.id()) {
            return false;
        }
        dep.insert(subscriber.id(), subscriber.clone());
        true
    }

    /// Remove one link, pruning empty entries on the way out.
    pub fn unlink(
        &mut self,
        target: TargetId,
        key: &TrackKey,
        subscriber: SubscriberId,
    ) -> Option<Subscriber> {
        let deps = self.targets.get_mut(&target)?;
        let dep = deps.get_mut(key)?;
        let removed = dep.shift_remove(&subscriber);

        if dep.is_empty() {
            deps.shift_remove(key);
        }
        if deps.is_empty() {
            self.targets.remove(&target);
        }
        removed
    }

    /// Drop every entry recorded against `target`.
    pub fn forget(&mut self, target: TargetId) -> Option<IndexMap<TrackKey, Dep>> {
        self.targets.remove(&target)
    }

    pub fn contains_target(&self, target: TargetId) -> bool {
        self.targets.contains_key(&target)
    }

    pub fn subscriber_count(&self, target: TargetId, key: &TrackKey) -> usize {
        self.targets
            .get(&target)
            .and_then(|deps| deps.get(key))
            .map_or(0, |dep| dep.len())
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Resolve the subscribers a trigger must notify.
    ///
    /// `active` is the subscriber currently running, if any; it is skipped
    /// unless it opted into recursion.
    pub fn collect(
        &self,
        target: TargetId,
        op: TriggerOp,
        key: Option<&TrackKey>,
        map_like: bool,
        active: Option<SubscriberId>,
    ) -> Notified {
        let Some(deps) = self.targets.get(&target) else {
            return Notified::default();
        };

        let mut computed: IndexMap<SubscriberId, Subscriber> = IndexMap::new();
        let mut effects: IndexMap<SubscriberId, (Subscriber, usize)> = IndexMap::new();

        let mut add = |dep: Option<&Dep>| {
            for (id, subscriber) in dep.into_iter().flatten() {
                if Some(*id) == active && !subscriber.allows_recurse() {
                    continue;
                }
                if subscriber.is_computed() {
                    computed.entry(*id).or_insert_with(|| subscriber.clone());
                } else {
                    effects
                        .entry(*id)
                        .or_insert_with(|| (subscriber.clone(), subscriber.run_count()));
                }
            }
        };

        if op == TriggerOp::Clear {
            for dep in deps.values() {
                add(Some(dep));
            }
        } else {
            if let Some(key) = key {
                add(deps.get(key));
            }
            match op {
                TriggerOp::Add | TriggerOp::Delete => {
                    add(deps.get(&TrackKey::Iterate));
                    if map_like {
                        add(deps.get(&TrackKey::MapKeyIterate));
                    }
                }
                TriggerOp::Set => {
                    if map_like {
                        add(deps.get(&TrackKey::Iterate));
                    }
                }
                TriggerOp::Clear => {}
            }
        }

        Notified {
            computed: computed.into_values().collect(),
            effects: effects.into_values().collect(),
        }
    }
}
