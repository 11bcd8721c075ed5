//! Raw Objects
//!
//! A raw object is the plain mutable data behind an observed wrapper. It
//! knows nothing about tracking: every operation here is the untracked
//! "underlying" operation that the interception layer performs after (or
//! before) recording the access.
//!
//! # Identity
//!
//! Each raw object receives a stable [`TargetId`] when it is created. The
//! global dependency map is keyed by that id instead of by object address,
//! and the entry is released when the last handle to the object drops.
//!
//! # Kinds
//!
//! - `Record`: insertion-ordered string-keyed properties.
//! - `Array`: index slots (which may be holes) plus named properties.
//!   The `length` key reads and writes the slot count.
//! - `Map`: an insertion-ordered keyed collection.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::runtime;
use super::{Key, Value};

/// Stable identity of a raw object or ref box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh identity.
    ///
    /// Uses an atomic counter so ids stay unique across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

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

/// The shape of a raw object. Selected at creation and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Record,
    Array,
    Map,
}

enum ObjectData {
    Record(IndexMap<Key, Value>),
    Array {
        items: Vec<Option<Value>>,
        props: IndexMap<Key, Value>,
    },
    Map(IndexMap<Key, Value>),
}

struct ObjectInner {
    id: TargetId,
    kind: TargetKind,
    data: RefCell<ObjectData>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        runtime::release_target(self.id);
    }
}

/// A shared handle to plain mutable data.
#[derive(Clone)]
pub struct RawObject(Rc<ObjectInner>);

/// Largest valid array length.
const MAX_ARRAY_LENGTH: f64 = u32::MAX as f64;

/// Arrays store their slots densely and refuse to grow past this many.
pub const MAX_DENSE_LENGTH: usize = 1 << 24;

impl RawObject {
    fn with_data(kind: TargetKind, data: ObjectData) -> Self {
        Self(Rc::new(ObjectInner {
            id: TargetId::new(),
            kind,
            data: RefCell::new(data),
        }))
    }

    pub fn record(entries: impl IntoIterator<Item = (Key, Value)>) -> Self {
        Self::with_data(
            TargetKind::Record,
            ObjectData::Record(entries.into_iter().collect()),
        )
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Self::with_data(
            TargetKind::Array,
            ObjectData::Array {
                items: items.into_iter().map(Some).collect(),
                props: IndexMap::new(),
            },
        )
    }

    pub fn map(entries: impl IntoIterator<Item = (Key, Value)>) -> Self {
        Self::with_data(
            TargetKind::Map,
            ObjectData::Map(entries.into_iter().collect()),
        )
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn kind(&self) -> TargetKind {
        self.0.kind
    }

    pub fn is_array(&self) -> bool {
        self.0.kind == TargetKind::Array
    }

    pub fn is_map(&self) -> bool {
        self.0.kind == TargetKind::Map
    }

    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Slot count for arrays, entry count otherwise.
    pub fn len(&self) -> usize {
        match &*self.0.data.borrow() {
            ObjectData::Record(props) | ObjectData::Map(props) => props.len(),
            ObjectData::Array { items, .. } => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a slot. Missing keys and holes read as `undefined`.
    pub fn get(&self, key: &Key) -> Value {
        match &*self.0.data.borrow() {
            ObjectData::Record(props) | ObjectData::Map(props) => {
                props.get(key).cloned().unwrap_or_default()
            }
            ObjectData::Array { items, props } => match key {
                Key::Index(index) => items.get(*index).cloned().flatten().unwrap_or_default(),
                key if key.is_length() => Value::from(items.len()),
                key => props.get(key).cloned().unwrap_or_default(),
            },
        }
    }

    /// Whether the object itself holds `key`. Holes are not held.
    pub fn has_own(&self, key: &Key) -> bool {
        match &*self.0.data.borrow() {
            ObjectData::Record(props) | ObjectData::Map(props) => props.contains_key(key),
            ObjectData::Array { items, props } => match key {
                Key::Index(index) => items.get(*index).is_some_and(Option::is_some),
                key if key.is_length() => true,
                key => props.contains_key(key),
            },
        }
    }

    /// Write a slot. Returns `false` when the write is rejected: sentinel
    /// and flag keys never hold data, an array `length` must be a
    /// non-negative integer no larger than `u32::MAX`, and no write may grow
    /// an array past [`MAX_DENSE_LENGTH`].
    pub fn set(&self, key: Key, value: Value) -> bool {
        if !key.is_data() || self.exceeds_dense_limit(&key, &value) {
            return false;
        }
        match &mut *self.0.data.borrow_mut() {
            ObjectData::Record(props) | ObjectData::Map(props) => {
                props.insert(key, value);
                true
            }
            ObjectData::Array { items, props } => match key {
                Key::Index(index) => {
                    if index >= items.len() {
                        items.resize(index + 1, None);
                    }
                    items[index] = Some(value);
                    true
                }
                key if key.is_length() => match value {
                    Value::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= MAX_ARRAY_LENGTH => {
                        items.resize(n as usize, None);
                        true
                    }
                    _ => false,
                },
                key => {
                    props.insert(key, value);
                    true
                }
            },
        }
    }

    /// Whether writing `value` to `key` would grow this array past
    /// [`MAX_DENSE_LENGTH`].
    pub fn exceeds_dense_limit(&self, key: &Key, value: &Value) -> bool {
        if !self.is_array() {
            return false;
        }
        let current = self.len();
        let wanted = match key {
            Key::Index(index) => index.saturating_add(1),
            key if key.is_length() => match value.as_number() {
                Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= MAX_ARRAY_LENGTH => n as usize,
                _ => return false,
            },
            _ => return false,
        };
        wanted > current && wanted > MAX_DENSE_LENGTH
    }

    /// Remove a slot. Removing an absent key succeeds; removing an array's
    /// `length` fails. Removing an array index leaves a hole.
    pub fn delete(&self, key: &Key) -> bool {
        match &mut *self.0.data.borrow_mut() {
            ObjectData::Record(props) | ObjectData::Map(props) => {
                props.shift_remove(key);
                true
            }
            ObjectData::Array { items, props } => match key {
                Key::Index(index) => {
                    if let Some(slot) = items.get_mut(*index) {
                        *slot = None;
                    }
                    true
                }
                key if key.is_length() => false,
                key => {
                    props.shift_remove(key);
                    true
                }
            },
        }
    }

    /// Remove every entry. Returns whether anything was removed.
    pub fn clear(&self) -> bool {
        let old = std::mem::replace(
            &mut *self.0.data.borrow_mut(),
            match self.0.kind {
                TargetKind::Record => ObjectData::Record(IndexMap::new()),
                TargetKind::Map => ObjectData::Map(IndexMap::new()),
                TargetKind::Array => ObjectData::Array {
                    items: Vec::new(),
                    props: IndexMap::new(),
                },
            },
        );
        // drop the old entries outside the borrow
        match old {
            ObjectData::Record(props) | ObjectData::Map(props) => !props.is_empty(),
            ObjectData::Array { items, props } => !items.is_empty() || !props.is_empty(),
        }
    }

    /// Own keys in enumeration order: held indices, then `length`, then
    /// named properties for arrays; insertion order otherwise.
    pub fn own_keys(&self) -> Vec<Key> {
        match &*self.0.data.borrow() {
            ObjectData::Record(props) | ObjectData::Map(props) => props.keys().cloned().collect(),
            ObjectData::Array { items, props } => items
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_some())
                .map(|(index, _)| Key::Index(index))
                .chain(std::iter::once(Key::length()))
                .chain(props.keys().cloned())
                .collect(),
        }
    }

    /// Values in enumeration order. Array holes are skipped.
    pub fn values(&self) -> Vec<Value> {
        match &*self.0.data.borrow() {
            ObjectData::Record(props) | ObjectData::Map(props) => props.values().cloned().collect(),
            ObjectData::Array { items, .. } => items.iter().flatten().cloned().collect(),
        }
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawObject")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let a = RawObject::record([]);
        let b = RawObject::record([]);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn array_length_truncates_and_extends_with_holes() {
        let arr = RawObject::array([Value::from(1), Value::from(2), Value::from(3)]);
        assert!(arr.set(Key::length(), Value::from(1)));
        assert_eq!(arr.len(), 1);
        assert!(arr.set(Key::length(), Value::from(3)));
        assert_eq!(arr.len(), 3);
        assert!(!arr.has_own(&Key::Index(2)));
        assert!(arr.get(&Key::Index(2)).is_undefined());
    }

    #[test]
    fn array_rejects_invalid_length() {
        let arr = RawObject::array([]);
        assert!(!arr.set(Key::length(), Value::from(-1)));
        assert!(!arr.set(Key::length(), Value::from(1.5)));
        assert!(!arr.set(Key::length(), Value::from("3")));
        assert!(!arr.delete(&Key::length()));
    }

    #[test]
    fn writing_past_the_end_grows_the_array() {
        let arr = RawObject::array([]);
        assert!(arr.set(Key::Index(2), Value::from("x")));
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.own_keys(), vec![Key::Index(2), Key::length()]);
    }

    #[test]
    fn array_refuses_to_grow_past_the_dense_limit() {
        let arr = RawObject::array([Value::from(1)]);
        assert!(!arr.set(Key::Index(usize::MAX), Value::from(2)));
        assert!(!arr.set(Key::Index(MAX_DENSE_LENGTH), Value::from(2)));
        assert!(!arr.set(Key::length(), Value::from(u32::MAX)));
        assert_eq!(arr.len(), 1);

        // growth below the limit and shrinking are unaffected
        assert!(arr.set(Key::Index(9), Value::from(3)));
        assert_eq!(arr.len(), 10);
        assert!(arr.set(Key::length(), Value::from(1)));
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn record_keeps_insertion_order() {
        let rec = RawObject::record([(Key::from("b"), Value::from(1))]);
        rec.set(Key::from("a"), Value::from(2));
        rec.set(Key::from("c"), Value::from(3));
        rec.delete(&Key::from("a"));
        assert_eq!(rec.own_keys(), vec![Key::from("b"), Key::from("c")]);
    }

    #[test]
    fn sentinel_keys_hold_no_data() {
        let rec = RawObject::record([]);
        assert!(!rec.set(Key::Iterate, Value::from(1)));
        assert!(!rec.has_own(&Key::Iterate));
    }

    #[test]
    fn clear_reports_whether_entries_existed() {
        let map = RawObject::map([(Key::from("k"), Value::from(1))]);
        assert!(map.clear());
        assert!(!map.clear());
        assert!(map.is_empty());
    }
}
