//! Interception traps for record and array targets.
//!
//! Every observed read goes through [`Observed::get`], every write through
//! [`Observed::set`], and so on. Map-like targets are dispatched to the
//! collection traps instead.

use tracing::warn;

use super::collection;
use super::context;
use super::key::ReactiveFlag;
use super::observed::{is_readonly, is_shallow, to_raw, Observed};
use super::operations::{TrackOpType, TriggerOpType};
use super::runtime::{track, trigger};
use super::{Key, Value};

impl Observed {
    /// Read a slot.
    ///
    /// Tracks the read unless this wrapper is read-only over a raw object.
    /// Refs stored in records are unwrapped; nested objects come back
    /// wrapped the way this wrapper is.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        self.get_key(&key.into())
    }

    pub fn get_key(&self, key: &Key) -> Value {
        if let Key::Flag(flag) = key {
            return self.flag(*flag);
        }
        if self.raw().is_map() {
            return collection::get(self, key);
        }

        let raw = self.raw();
        let value = raw.get(key);
        if key.is_untracked() {
            return value;
        }
        if self.tracks() {
            track(raw, TrackOpType::Get, key);
        }
        if self.is_shallow() {
            return value;
        }
        if let Value::Ref(r) = &value {
            if !(raw.is_array() && key.is_integer()) {
                return self.wrap_nested(r.get());
            }
        }
        self.wrap_nested(value)
    }

    fn flag(&self, flag: ReactiveFlag) -> Value {
        match flag {
            ReactiveFlag::IsReactive => Value::Bool(self.is_reactive()),
            ReactiveFlag::IsReadonly => Value::Bool(self.is_readonly()),
            ReactiveFlag::IsShallow => Value::Bool(self.is_shallow()),
            ReactiveFlag::Raw => Value::Object(self.to_raw()),
        }
    }

    /// Follow `path` through nested objects. Every step is a tracked read.
    pub fn get_path<K>(&self, path: impl IntoIterator<Item = K>) -> Value
    where
        K: Into<Key>,
    {
        let mut path = path.into_iter();
        let Some(first) = path.next() else {
            return Value::Observed(self.clone());
        };
        let mut current = self.get(first);
        for key in path {
            current = match &current {
                Value::Observed(observed) => observed.get(key),
                _ => return Value::Undefined,
            };
        }
        current
    }

    /// Write a slot, returning whether the write was accepted.
    ///
    /// Read-only wrappers reject the write with a warning but still report
    /// success.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        self.set_with_receiver(key.into(), value.into(), self)
    }

    /// Write a slot on behalf of `receiver`.
    ///
    /// Effects are only notified when `receiver` wraps this same raw
    /// object; a write that merely passes through this wrapper for some
    /// other object is performed silently.
    pub fn set_with_receiver(&self, key: Key, value: Value, receiver: &Observed) -> bool {
        if self.is_readonly() {
            self.warn_readonly("set", &key);
            return true;
        }
        if self.raw().is_map() {
            return collection::set(self, key, value);
        }

        let raw = self.raw();
        let mut old = raw.get(&key);
        let mut value = value;
        if !self.is_shallow() {
            if !is_shallow(&value) && !is_readonly(&value) {
                old = to_raw(&old);
                value = to_raw(&value);
            }
            if !raw.is_array() && !value.is_ref() {
                if let Value::Ref(r) = &old {
                    r.set(value);
                    return true;
                }
            }
        }

        let had_key = match key.as_index() {
            Some(index) if raw.is_array() => index < raw.len(),
            _ => raw.has_own(&key),
        };
        if !raw.set(key.clone(), value.clone()) {
            if raw.exceeds_dense_limit(&key, &value) {
                warn!(
                    target_id = %raw.id(),
                    %key,
                    "array length exceeds dense storage limit"
                );
            } else if raw.is_array() && key.is_length() {
                warn!(target_id = %raw.id(), value = ?value, "invalid array length");
            }
            return false;
        }

        if receiver.raw().ptr_eq(raw) {
            if !had_key {
                trigger(raw, TriggerOpType::Add, Some(&key), Some(&value), None);
            } else if !value.same_value(&old) {
                trigger(raw, TriggerOpType::Set, Some(&key), Some(&value), Some(&old));
            }
        }
        true
    }

    /// Remove a slot. Effects are notified only if the slot existed.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.is_readonly() {
            self.warn_readonly("delete", &key);
            return true;
        }
        if self.raw().is_map() {
            return collection::delete(self, &key);
        }

        let raw = self.raw();
        let had_key = raw.has_own(&key);
        let old = raw.get(&key);
        let deleted = raw.delete(&key);
        if deleted && had_key {
            trigger(raw, TriggerOpType::Delete, Some(&key), None, Some(&old));
        }
        deleted
    }

    /// Containment check, tracked as a `has` read.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.raw().is_map() {
            return collection::has(self, &key);
        }
        let raw = self.raw();
        let result = raw.has_own(&key);
        if self.tracks() && !matches!(key, Key::Symbol(_)) {
            track(raw, TrackOpType::Has, &key);
        }
        result
    }

    /// The object's own keys. Tracks enumeration of the key set.
    pub fn own_keys(&self) -> Vec<Key> {
        let raw = self.raw();
        if self.tracks() {
            let sentinel = if raw.is_array() {
                Key::length()
            } else if raw.is_map() {
                Key::MapKeyIterate
            } else {
                Key::Iterate
            };
            track(raw, TrackOpType::Iterate, &sentinel);
        }
        raw.own_keys()
    }

    /// Tracked size: array length, or number of entries.
    pub fn len(&self) -> usize {
        let raw = self.raw();
        if raw.is_map() {
            return collection::size(self);
        }
        if raw.is_array() {
            return self
                .get_key(&Key::length())
                .as_number()
                .map_or(0, |length| length as usize);
        }
        self.own_keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every value, wrapped like a read of its slot. Array holes are
    /// skipped.
    pub fn values(&self) -> Vec<Value> {
        if self.raw().is_map() {
            return collection::values(self);
        }
        self.data_keys()
            .iter()
            .map(|key| self.get_key(key))
            .collect()
    }

    /// Every `(key, value)` pair, wrapped like a read of its slot.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        if self.raw().is_map() {
            return collection::entries(self);
        }
        self.data_keys()
            .into_iter()
            .map(|key| {
                let value = self.get_key(&key);
                (key, value)
            })
            .collect()
    }

    /// Keys of a map-like target, or own keys otherwise.
    pub fn keys(&self) -> Vec<Key> {
        if self.raw().is_map() {
            return collection::keys(self);
        }
        self.data_keys()
    }

    /// Remove every entry of a map-like target.
    pub fn clear(&self) -> bool {
        if self.is_readonly() {
            self.warn_readonly("clear", &Key::Iterate);
            return true;
        }
        if !self.raw().is_map() {
            warn!(
                target_id = %self.raw().id(),
                kind = ?self.raw().kind(),
                "clear is only supported on map-like targets"
            );
            return false;
        }
        collection::clear(self)
    }

    fn data_keys(&self) -> Vec<Key> {
        let mut keys = self.own_keys();
        if self.raw().is_array() {
            keys.retain(|key| !key.is_length());
        }
        keys
    }

    pub(crate) fn warn_readonly(&self, op: &str, key: &Key) {
        if context::warn_on_readonly_mutation() {
            warn!(
                target_id = %self.raw().id(),
                %key,
                "{op} operation on key \"{key}\" failed: target is readonly"
            );
        }
    }
}
