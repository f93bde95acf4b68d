//! Collection instrumentations.
//!
//! Maps, sets and their weak-keyed variants. Storage is always raw; a
//! lookup accepts either the raw or the wrapped form of a container key.

use crate::error::{warn_with, ReactiveError};
use crate::graph::{Observable, TrackKey, TrackOp, TriggerOp};
use crate::reactive::{track, trigger};
use crate::target::Target;
use crate::value::{has_changed, Value};

use super::{to_raw, wrap_value, Handle, Mode};

/// Collection storage is raw in every mode, so the tables differ only in
/// whether writes are refused. Nested wrapping follows the handle's mode.
pub(crate) struct Instrumentations {
    readonly: bool,
}

static MUTABLE: Instrumentations = Instrumentations { readonly: false };
static READONLY: Instrumentations = Instrumentations { readonly: true };

pub(crate) fn instrumentations(mode: Mode) -> &'static Instrumentations {
    if mode.is_readonly() {
        &READONLY
    } else {
        &MUTABLE
    }
}

/// Weak kinds accept only container keys, raw or wrapped.
fn valid_key(target: &Target, key: &Value) -> bool {
    if target.kind().is_weak() && key.raw_target().is_none() {
        warn_with(|| ReactiveError::InvalidWeakKey {
            kind: target.kind(),
            value: key.to_string(),
        });
        return false;
    }
    true
}

/// Weak kinds cannot be enumerated or sized.
fn enumerable(target: &Target, op: &'static str) -> bool {
    if target.kind().is_weak() {
        warn_with(|| ReactiveError::Unsupported {
            op,
            kind: target.kind(),
        });
        return false;
    }
    true
}

/// The stored form of `key`: as given if present, else its raw form.
fn resolve(target: &Target, key: &Value) -> Option<Value> {
    if target.contains(key) {
        return Some(key.clone());
    }
    let raw = to_raw(key);
    (raw != *key && target.contains(&raw)).then_some(raw)
}

fn check_identity_keys(target: &Target, key: &Value, raw_key: &Value) {
    if !target.kind().is_weak() && key != raw_key && target.contains(raw_key) {
        warn_with(|| ReactiveError::DuplicateIdentityKey {
            kind: target.kind(),
        });
    }
}

impl Instrumentations {
    fn refuse(&self, op: TriggerOp, key: Option<&Value>, target: &Target) -> bool {
        if self.readonly {
            warn_with(|| ReactiveError::readonly(op, key, target));
        }
        self.readonly
    }

    pub fn get(&self, handle: &Handle, key: &Value) -> Option<Value> {
        let target = handle.target();
        if !valid_key(target, key) {
            return None;
        }
        // Raw and wrapped forms share one track key.
        track(target, TrackOp::Get, TrackKey::of(key));

        let stored = resolve(target, key)?;
        let value = target.get(&stored)?;
        Some(wrap_value(value, handle.mode().nested()))
    }

    pub fn has(&self, handle: &Handle, key: &Value) -> bool {
        let target = handle.target();
        if !valid_key(target, key) {
            return false;
        }
        track(target, TrackOp::Has, TrackKey::of(key));
        resolve(target, key).is_some()
    }

    pub fn size(&self, handle: &Handle) -> usize {
        let target = handle.target();
        if !enumerable(target, "size") {
            return 0;
        }
        track(target, TrackOp::Iterate, TrackKey::Iterate);
        target.len()
    }

    pub fn add(&self, handle: &Handle, value: Value) {
        let target = handle.target();
        if self.refuse(TriggerOp::Add, Some(&value), target) || !valid_key(target, &value) {
            return;
        }

        // Storage is raw in every mode.
        let value = to_raw(&value);
        if target.contains(&value) {
            return;
        }
        target.add(value.clone());
        trigger(target, TriggerOp::Add, Some(TrackKey::of(&value)), Some(&value), None);
    }

    pub fn set(&self, handle: &Handle, key: Value, value: Value) {
        let target = handle.target();
        if self.refuse(TriggerOp::Set, Some(&key), target) || !valid_key(target, &key) {
            return;
        }

        let value = to_raw(&value);
        let raw_key = to_raw(&key);
        let key = if target.contains(&key) {
            check_identity_keys(target, &key, &raw_key);
            key
        } else {
            raw_key
        };

        let old = target.get(&key);
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
        if self.refuse(TriggerOp::Delete, Some(key), target) || !valid_key(target, key) {
            return false;
        }

        let Some(stored) = resolve(target, key) else {
            return false;
        };
        let old = target.remove(&stored);
        trigger(target, TriggerOp::Delete, Some(TrackKey::of(&stored)), None, old.as_ref());
        true
    }

    pub fn clear(&self, handle: &Handle) {
        let target = handle.target();
        if self.refuse(TriggerOp::Clear, None, target) || !enumerable(target, "clear") {
            return;
        }

        let had_items = !target.is_empty();
        target.clear();
        if had_items {
            trigger(target, TriggerOp::Clear, None, None, None);
        }
    }

    pub fn for_each(&self, handle: &Handle, f: &mut dyn FnMut(Value, Value, &Handle)) {
        let target = handle.target();
        if !enumerable(target, "for_each") {
            return;
        }
        track(target, TrackOp::Iterate, TrackKey::Iterate);

        let nested = handle.mode().nested();
        for (key, value) in target.entries() {
            f(wrap_value(value, nested), wrap_value(key, nested), handle);
        }
    }

    /// Key-only iteration of a map is tracked apart from other iteration.
    pub fn keys(&self, handle: &Handle) -> Vec<Value> {
        let target = handle.target();
        if !enumerable(target, "keys") {
            return Vec::new();
        }
        let marker = if target.is_map_like() {
            TrackKey::MapKeyIterate
        } else {
            TrackKey::Iterate
        };
        track(target, TrackOp::Iterate, marker);
        target.keys()
    }

    pub fn values(&self, handle: &Handle) -> Vec<Value> {
        let target = handle.target();
        if !enumerable(target, "values") {
            return Vec::new();
        }
        track(target, TrackOp::Iterate, TrackKey::Iterate);
        target.values()
    }

    pub fn entries(&self, handle: &Handle) -> Vec<(Value, Value)> {
        let target = handle.target();
        if !enumerable(target, "entries") {
            return Vec::new();
        }
        track(target, TrackOp::Iterate, TrackKey::Iterate);
        target.entries()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::proxy::{reactive, readonly, shallow_reactive};
    use crate::reactive::{effect, value_ref};

    fn runs() -> Rc<Cell<usize>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn map_get_reader_lifecycle() {
        let map = reactive(&Target::map());
        let count = runs();

        let (source, observed) = (map.clone(), count.clone());
        let _effect = effect(move || {
            source.get("k");
            observed.set(observed.get() + 1);
        });

        map.set("k", 1);
        assert_eq!(count.get(), 2);
        map.set("k", 1);
        assert_eq!(count.get(), 2);
        map.delete("k");
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn clear_reaches_every_reader() {
        let map = reactive(&Target::map_from([("a", 1), ("b", 2)]));
        let (by_key, by_size) = (runs(), runs());

        let (source, observed) = (map.clone(), by_key.clone());
        let _reader = effect(move || {
            source.get("a");
            observed.set(observed.get() + 1);
        });
        let (source, observed) = (map.clone(), by_size.clone());
        let _sizer = effect(move || {
            source.len();
            observed.set(observed.get() + 1);
        });

        map.clear();
        assert_eq!((by_key.get(), by_size.get()), (2, 2));

        map.clear();
        assert_eq!((by_key.get(), by_size.get()), (2, 2));
    }

    #[test]
    fn map_key_iteration_ignores_value_replacement() {
        let map = reactive(&Target::map_from([("a", 1)]));
        let (keys, values) = (runs(), runs());

        let (source, observed) = (map.clone(), keys.clone());
        let _keys = effect(move || {
            source.keys().count();
            observed.set(observed.get() + 1);
        });
        let (source, observed) = (map.clone(), values.clone());
        let _values = effect(move || {
            source.values().count();
            observed.set(observed.get() + 1);
        });

        map.set("a", 2);
        assert_eq!((keys.get(), values.get()), (1, 2));

        map.set("b", 1);
        assert_eq!((keys.get(), values.get()), (2, 3));
    }

    #[test]
    fn set_add_is_deduplicated() {
        let set = reactive(&Target::set());
        let count = runs();

        let (source, observed) = (set.clone(), count.clone());
        let _effect = effect(move || {
            source.has(1);
            observed.set(observed.get() + 1);
        });

        set.add(1);
        assert_eq!(count.get(), 2);
        set.add(1);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn wrapped_and_raw_keys_resolve_to_one_entry() {
        let key = Target::record();
        let map = reactive(&Target::map());
        map.set(reactive(&key), "value");

        assert_eq!(map.get(&key), Some(Value::from("value")));
        assert_eq!(map.get(reactive(&key)), Some(Value::from("value")));
        assert!(map.has(&key));
        assert_eq!(map.len(), 1);
        assert!(map.delete(reactive(&key)));
        assert!(map.is_empty());
    }

    #[test]
    fn nested_values_are_wrapped() {
        let child = Target::record();
        let map = Target::map_from([("child", &child)]);

        assert_eq!(
            reactive(&map).get("child"),
            Some(Value::from(reactive(&child)))
        );
        let values: Vec<_> = readonly(&map).values().collect();
        assert_eq!(values, vec![Value::from(readonly(&child))]);
    }

    #[test]
    fn for_each_tolerates_mutation() {
        let map = reactive(&Target::map_from([("a", 1), ("b", 2)]));
        let mut seen = Vec::new();
        map.for_each(|value, key, owner| {
            owner.delete("b");
            seen.push((key, value));
        });
        assert_eq!(seen.len(), 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn readonly_collections_refuse_writes() {
        let raw = Target::set_from([1]);
        let ro = readonly(&raw);
        ro.add(2).clear();
        assert!(!ro.delete(1));
        assert_eq!(raw.len(), 1);
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn diagnostics_for_misuse() {
        use crate::error::set_warn_handler;
        use std::cell::RefCell;

        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = warnings.clone();
        set_warn_handler(move |err| sink.borrow_mut().push(err.clone()));

        let weak = reactive(&Target::weak_map());
        weak.set("primitive", 1);
        assert_eq!(weak.get("primitive"), None);
        assert_eq!(weak.len(), 0);
        reactive(&Target::map()).add(1);

        let key = Target::record();
        let raw = Target::map();
        raw.insert(&key, 1);
        raw.insert(reactive(&key), 2);
        reactive(&raw).set(reactive(&key), 3);

        let warnings = warnings.borrow();
        assert!(matches!(warnings[0], ReactiveError::InvalidWeakKey { .. }));
        assert!(matches!(warnings[1], ReactiveError::InvalidWeakKey { .. }));
        assert!(matches!(warnings[2], ReactiveError::Unsupported { op: "size", .. }));
        assert!(matches!(warnings[3], ReactiveError::Unsupported { op: "add", .. }));
        assert!(matches!(
            warnings[4],
            ReactiveError::DuplicateIdentityKey { .. }
        ));
    }

    #[test]
    fn weak_map_tracks_container_keys() {
        let key = Target::record();
        let weak = reactive(&Target::weak_map());
        let count = runs();

        let (source, observed, probe) = (weak.clone(), count.clone(), key.clone());
        let _effect = effect(move || {
            source.get(&probe);
            observed.set(observed.get() + 1);
        });

        weak.set(reactive(&key), "meta");
        assert_eq!(count.get(), 2);
        assert_eq!(weak.get(&key), Some(Value::from("meta")));
    }

    #[test]
    fn shallow_set_stores_raw_members() {
        let member = Target::record();
        let raw = Target::set();
        let set = shallow_reactive(&raw);

        set.add(reactive(&member));
        assert!(set.has(&member));
        assert!(raw.contains(&Value::from(&member)));

        set.add(&member);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn weak_map_ignores_box_keys() {
        let boxed = value_ref(0);
        let raw = Target::weak_map();
        let weak = reactive(&raw);
        let count = runs();

        let (source, observed, probe) = (weak.clone(), count.clone(), boxed.clone());
        let _effect = effect(move || {
            source.get(&probe);
            observed.set(observed.get() + 1);
        });

        weak.set(&boxed, "x");
        assert_eq!(count.get(), 1);
        assert_eq!(weak.get(&boxed), None);

        let members = reactive(&Target::weak_set());
        members.add(&boxed);
        assert!(!members.has(&boxed));
    }
}
