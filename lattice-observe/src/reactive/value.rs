//! Dynamic values stored in observed objects.
//!
//! `Value` is a tagged variant: plain scalars, raw objects, observed
//! wrappers, and boxed references ([`Ref`]) are all distinct variants, so
//! the interception layer can check explicitly whether a slot holds a ref
//! that must be unwrapped or an object that must be wrapped.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::error::{ObserveError, Result};

use super::object::{RawObject, TargetId};
use super::observed::Observed;
use super::reference::Ref;
use super::Key;

/// A value held in a slot of an observed object.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// A plain, unobserved object.
    Object(RawObject),
    /// An observed wrapper around an object.
    Observed(Observed),
    /// A boxed reference.
    Ref(Ref),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether this value is object-like (raw or wrapped).
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Observed(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_observed(&self) -> Option<&Observed> {
        match self {
            Value::Observed(observed) => Some(observed),
            _ => None,
        }
    }

    pub fn as_raw_object(&self) -> Option<&RawObject> {
        match self {
            Value::Object(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_ref_box(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// SameValue comparison: `NaN` equals itself, `+0` and `-0` differ,
    /// objects compare by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self.same_non_number(other),
        }
    }

    /// SameValueZero comparison: like [`Value::same_value`] but `+0 == -0`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => self.same_non_number(other),
        }
    }

    /// Strict equality: `NaN` never equals anything, `+0 == -0`.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self.same_non_number(other),
        }
    }

    fn same_non_number(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Observed(a), Value::Observed(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Convert into a JSON document, reading raw content without tracking.
    ///
    /// Refs and observed wrappers serialise their current contents. Holes
    /// and `undefined` become `null`, as do non-finite numbers.
    pub fn to_json(&self) -> Result<JsonValue> {
        let mut path = HashSet::new();
        self.to_json_inner(&mut path)
    }

    fn to_json_inner(&self, path: &mut HashSet<TargetId>) -> Result<JsonValue> {
        let raw = match self {
            Value::Undefined | Value::Null => return Ok(JsonValue::Null),
            Value::Bool(b) => return Ok(JsonValue::Bool(*b)),
            Value::Number(n) => {
                return Ok(JsonNumber::from_f64(*n)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null))
            }
            Value::Str(s) => return Ok(JsonValue::String(s.to_string())),
            Value::Ref(r) => return r.peek().to_json_inner(path),
            Value::Observed(observed) => observed.to_raw(),
            Value::Object(raw) => raw.clone(),
        };

        if !path.insert(raw.id()) {
            return Err(ObserveError::Cycle(raw.id()));
        }
        let json = if raw.is_array() {
            let items = (0..raw.len())
                .map(|index| raw.get(&Key::Index(index)).to_json_inner(path))
                .collect::<Result<Vec<_>>>()?;
            JsonValue::Array(items)
        } else {
            let mut map = JsonMap::new();
            for key in raw.own_keys() {
                let value = raw.get(&key).to_json_inner(path)?;
                map.insert(key.to_string(), value);
            }
            JsonValue::Object(map)
        };
        path.remove(&raw.id());
        Ok(json)
    }
}

impl From<JsonValue> for Value {
    /// Build a fresh raw object graph from a JSON document.
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Value::Str(Rc::from(s)),
            JsonValue::Array(items) => {
                Value::Object(RawObject::array(items.into_iter().map(Value::from)))
            }
            JsonValue::Object(map) => Value::Object(RawObject::record(
                map.into_iter().map(|(k, v)| (Key::parse(&k), Value::from(v))),
            )),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
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

impl From<RawObject> for Value {
    fn from(raw: RawObject) -> Self {
        Value::Object(raw)
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        Value::Observed(observed)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(raw) => write!(f, "{raw:?}"),
            Value::Observed(observed) => write!(f, "{observed:?}"),
            Value::Ref(r) => write!(f, "{r:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_treats_nan_as_equal() {
        let nan = Value::Number(f64::NAN);
        assert!(nan.same_value(&Value::Number(f64::NAN)));
        assert!(nan.same_value_zero(&Value::Number(f64::NAN)));
        assert!(!nan.strict_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn same_value_distinguishes_signed_zero() {
        let pos = Value::Number(0.0);
        let neg = Value::Number(-0.0);
        assert!(!pos.same_value(&neg));
        assert!(pos.same_value_zero(&neg));
        assert!(pos.strict_equals(&neg));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = RawObject::record([]);
        let b = RawObject::record([]);
        assert!(Value::from(a.clone()).same_value(&Value::from(a)));
        assert!(!Value::from(b.clone()).same_value(&Value::Object(RawObject::record([]))));
        assert!(!Value::from("1").same_value(&Value::from(1)));
    }

    #[test]
    fn json_round_trips_through_raw_objects() {
        let doc = json!({"a": 1.0, "list": [true, null, "x"], "nested": {"b": 2.0}});
        let value = Value::from(doc.clone());
        assert_eq!(value.to_json().unwrap(), doc);
    }

    #[test]
    fn to_json_rejects_cycles() {
        let raw = RawObject::record([]);
        raw.set(Key::from("me"), Value::Object(raw.clone()));
        let err = Value::Object(raw.clone()).to_json().unwrap_err();
        assert!(matches!(err, ObserveError::Cycle(id) if id == raw.id()));
        // break the cycle so the object can be reclaimed
        raw.delete(&Key::from("me"));
    }
}
