//! Traps for map-like targets.
//!
//! Maps differ from records in which sentinels they track: `size`,
//! `values` and `entries` depend on [`Key::Iterate`], while `keys` depends
//! on [`Key::MapKeyIterate`] so that overwriting a value does not re-run
//! effects that only enumerate keys. Values written into a map are always
//! stored raw.

use super::observed::{to_raw, Observed};
use super::operations::{TrackOpType, TriggerOpType};
use super::runtime::{track, trigger};
use super::{Key, Value};

pub(crate) fn get(observed: &Observed, key: &Key) -> Value {
    let raw = observed.raw();
    if observed.tracks() && !key.is_untracked() {
        track(raw, TrackOpType::Get, key);
    }
    observed.wrap_nested(raw.get(key))
}

pub(crate) fn has(observed: &Observed, key: &Key) -> bool {
    let raw = observed.raw();
    if observed.tracks() {
        track(raw, TrackOpType::Has, key);
    }
    raw.has_own(key)
}

pub(crate) fn size(observed: &Observed) -> usize {
    let raw = observed.raw();
    if observed.tracks() {
        track(raw, TrackOpType::Iterate, &Key::Iterate);
    }
    raw.len()
}

pub(crate) fn set(observed: &Observed, key: Key, value: Value) -> bool {
    let raw = observed.raw();
    let value = to_raw(&value);
    let had_key = raw.has_own(&key);
    let old = raw.get(&key);
    if !raw.set(key.clone(), value.clone()) {
        return false;
    }
    if !had_key {
        trigger(raw, TriggerOpType::Add, Some(&key), Some(&value), None);
    } else if !value.same_value(&old) {
        trigger(raw, TriggerOpType::Set, Some(&key), Some(&value), Some(&old));
    }
    true
}

/// Returns whether the key existed.
pub(crate) fn delete(observed: &Observed, key: &Key) -> bool {
    let raw = observed.raw();
    let had_key = raw.has_own(key);
    let old = raw.get(key);
    raw.delete(key);
    if had_key {
        trigger(raw, TriggerOpType::Delete, Some(key), None, Some(&old));
    }
    had_key
}

/// Returns whether there was anything to remove.
pub(crate) fn clear(observed: &Observed) -> bool {
    let raw = observed.raw();
    let had_entries = raw.clear();
    if had_entries {
        trigger(raw, TriggerOpType::Clear, None, None, None);
    }
    had_entries
}

pub(crate) fn keys(observed: &Observed) -> Vec<Key> {
    let raw = observed.raw();
    if observed.tracks() {
        track(raw, TrackOpType::Iterate, &Key::MapKeyIterate);
    }
    raw.own_keys()
}

pub(crate) fn values(observed: &Observed) -> Vec<Value> {
    let raw = observed.raw();
    if observed.tracks() {
        track(raw, TrackOpType::Iterate, &Key::Iterate);
    }
    raw.values()
        .into_iter()
        .map(|value| observed.wrap_nested(value))
        .collect()
}

pub(crate) fn entries(observed: &Observed) -> Vec<(Key, Value)> {
    let raw = observed.raw();
    if observed.tracks() {
        track(raw, TrackOpType::Iterate, &Key::Iterate);
    }
    raw.own_keys()
        .into_iter()
        .map(|key| {
            let value = observed.wrap_nested(raw.get(&key));
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::reactive::{effect, is_reactive, reactive, EffectOptions, RawObject};

    use super::*;

    fn runs_of(f: impl Fn() + 'static) -> (crate::reactive::EffectRunner, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let runner = effect(
            move || {
                f();
                r.set(r.get() + 1);
            },
            EffectOptions::new(),
        );
        (runner, runs)
    }

    #[test]
    fn size_follows_adds_and_deletes() {
        let map = reactive(&RawObject::map([]));
        let m = map.clone();
        let (_runner, runs) = runs_of(move || drop(m.len()));

        map.set("a", 1);
        assert_eq!(runs.get(), 2);
        map.set("a", 2);
        // overwriting does not change the size, but Iterate is notified on SET for maps
        assert_eq!(runs.get(), 3);
        map.delete("a");
        assert_eq!(runs.get(), 4);
        assert!(map.is_empty());
    }

    #[test]
    fn keys_ignore_value_overwrites() {
        let map = reactive(&RawObject::map([(Key::from("a"), Value::from(1))]));
        let m = map.clone();
        let (_runner, runs) = runs_of(move || drop(m.keys()));

        map.set("a", 2);
        assert_eq!(runs.get(), 1);
        map.set("b", 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn get_tracks_single_entry() {
        let map = reactive(&RawObject::map([(Key::from("a"), Value::from(1))]));
        let m = map.clone();
        let (_runner, runs) = runs_of(move || drop(m.get("a")));

        map.set("b", 1);
        assert_eq!(runs.get(), 1);
        map.set("a", 5);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn clear_notifies_every_reader_once() {
        let map = reactive(&RawObject::map([(Key::from("a"), Value::from(1))]));
        let m = map.clone();
        let (_runner, runs) = runs_of(move || {
            m.get("a");
            m.has("b");
            m.len();
        });

        assert!(map.clear());
        assert_eq!(runs.get(), 2);
        // nothing left to clear
        assert!(!map.clear());
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn values_are_wrapped_and_stored_raw() {
        let child = RawObject::record([]);
        let map = reactive(&RawObject::map([]));
        map.set("child", reactive(&child));

        assert!(matches!(map.to_raw().get(&Key::from("child")), Value::Object(_)));
        assert!(map.values().iter().all(is_reactive));
        assert!(is_reactive(&map.get("child")));
    }
}
