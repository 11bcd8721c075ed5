//! Array instrumentation.
//!
//! The search methods compare by identity, and the wrapper a caller holds
//! is not the raw value stored in the array. They therefore track every
//! index plus `length`, try the lookup with the argument as given, and
//! retry with the argument unwrapped.
//!
//! The length-changing methods read `length` internally. Run under normal
//! tracking, an effect calling `push` would subscribe to `length` and then
//! re-trigger itself through its own write. They run with tracking paused
//! and perform every write through the ordinary traps, so each touched
//! slot still notifies its readers.

use super::context::TrackingGuard;
use super::observed::{to_raw, Observed};
use super::operations::TrackOpType;
use super::runtime::track;
use super::{Key, Value};

impl Observed {
    /// Whether the array contains `value` (SameValueZero, holes read as
    /// `undefined`).
    pub fn includes(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        let Some(items) = self.tracked_items() else {
            return false;
        };
        let found = |needle: &Value| {
            items
                .iter()
                .any(|item| item.as_ref().unwrap_or(&Value::Undefined).same_value_zero(needle))
        };
        found(&value) || found(&to_raw(&value))
    }

    /// First index holding `value` (strict equality, holes skipped).
    pub fn index_of(&self, value: impl Into<Value>) -> Option<usize> {
        let value = value.into();
        let items = self.tracked_items()?;
        let position = |needle: &Value| {
            items
                .iter()
                .position(|item| item.as_ref().is_some_and(|item| item.strict_equals(needle)))
        };
        position(&value).or_else(|| position(&to_raw(&value)))
    }

    /// Last index holding `value` (strict equality, holes skipped).
    pub fn last_index_of(&self, value: impl Into<Value>) -> Option<usize> {
        let value = value.into();
        let items = self.tracked_items()?;
        let position = |needle: &Value| {
            items
                .iter()
                .rposition(|item| item.as_ref().is_some_and(|item| item.strict_equals(needle)))
        };
        position(&value).or_else(|| position(&to_raw(&value)))
    }

    /// Raw slots of an array target, tracking `length` and every index.
    fn tracked_items(&self) -> Option<Vec<Option<Value>>> {
        let raw = self.raw();
        if !raw.is_array() {
            return None;
        }
        let length = raw.len();
        if self.tracks() {
            track(raw, TrackOpType::Get, &Key::length());
            for index in 0..length {
                track(raw, TrackOpType::Get, &Key::Index(index));
            }
        }
        Some(
            (0..length)
                .map(|index| {
                    let key = Key::Index(index);
                    raw.has_own(&key).then(|| raw.get(&key))
                })
                .collect(),
        )
    }

    /// Append `items`, returning the new length.
    pub fn push(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let _paused = TrackingGuard::pause();
        let Some(mut length) = self.array_length() else {
            return 0;
        };
        for item in items {
            self.set(Key::Index(length), item);
            length += 1;
        }
        self.set(Key::length(), length);
        length
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        let _paused = TrackingGuard::pause();
        let Some(length) = self.array_length() else {
            return Value::Undefined;
        };
        if length == 0 {
            self.set(Key::length(), 0usize);
            return Value::Undefined;
        }
        let last = Key::Index(length - 1);
        let element = self.get_key(&last);
        self.delete(last);
        self.set(Key::length(), length - 1);
        element
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Value {
        let _paused = TrackingGuard::pause();
        let Some(length) = self.array_length() else {
            return Value::Undefined;
        };
        if length == 0 {
            self.set(Key::length(), 0usize);
            return Value::Undefined;
        }
        let first = self.get_key(&Key::Index(0));
        for from in 1..length {
            self.move_slot(from, from - 1);
        }
        self.delete(Key::Index(length - 1));
        self.set(Key::length(), length - 1);
        first
    }

    /// Prepend `items`, returning the new length.
    pub fn unshift(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let _paused = TrackingGuard::pause();
        let Some(length) = self.array_length() else {
            return 0;
        };
        let items: Vec<Value> = items.into_iter().collect();
        let count = items.len();
        if count > 0 {
            for from in (0..length).rev() {
                self.move_slot(from, from + count);
            }
            for (index, item) in items.into_iter().enumerate() {
                self.set(Key::Index(index), item);
            }
        }
        self.set(Key::length(), length + count);
        length + count
    }

    /// Remove `delete_count` elements at `start` (all of them when `None`)
    /// and insert `items` in their place. A negative `start` counts from
    /// the end. Returns the removed elements.
    pub fn splice(
        &self,
        start: isize,
        delete_count: Option<usize>,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let _paused = TrackingGuard::pause();
        let Some(length) = self.array_length() else {
            return Vec::new();
        };
        let start = if start < 0 {
            length.saturating_sub(start.unsigned_abs())
        } else {
            start.unsigned_abs().min(length)
        };
        let delete_count = delete_count.map_or(length - start, |count| count.min(length - start));
        let items: Vec<Value> = items.into_iter().collect();
        let item_count = items.len();

        let removed = (start..start + delete_count)
            .map(|index| self.get_key(&Key::Index(index)))
            .collect();

        if item_count < delete_count {
            for from in start + delete_count..length {
                self.move_slot(from, from - delete_count + item_count);
            }
            for index in (length - delete_count + item_count..length).rev() {
                self.delete(Key::Index(index));
            }
        } else if item_count > delete_count {
            for from in (start + delete_count..length).rev() {
                self.move_slot(from, from + item_count - delete_count);
            }
        }
        for (offset, item) in items.into_iter().enumerate() {
            self.set(Key::Index(start + offset), item);
        }
        self.set(Key::length(), length - delete_count + item_count);
        removed
    }

    fn array_length(&self) -> Option<usize> {
        let raw = self.raw();
        raw.is_array().then(|| raw.len())
    }

    /// Copy slot `from` into `to` through the traps, preserving holes.
    fn move_slot(&self, from: usize, to: usize) {
        if self.has(Key::Index(from)) {
            let value = self.get_key(&Key::Index(from));
            self.set(Key::Index(to), value);
        } else {
            self.delete(Key::Index(to));
        }
    }
}
