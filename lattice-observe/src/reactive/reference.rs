//! Refs
//!
//! A [`Ref`] is a single observable slot. It owns its dependency set
//! directly instead of going through the global dependency map.
//!
//! A deep ref stores object values raw and hands them out wrapped
//! reactively; a shallow ref stores and returns exactly what it was
//! given. Records holding a ref unwrap it on read and write through it
//! (see [`Observed::get`](super::Observed::get)).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::dep::Dep;
use super::object::TargetId;
use super::observed::{is_readonly, is_shallow, to_raw, to_reactive};
use super::operations::{TrackOpType, TriggerOpType};
use super::runtime::{self, TriggerInfo};
use super::{Key, Value};

const VALUE_KEY: &str = "value";

struct RefInner {
    id: TargetId,
    value: RefCell<Value>,
    shallow: bool,
    dep: Dep,
}

/// A boxed observable value.
///
/// Clones share the same box.
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

impl Ref {
    pub fn new(value: impl Into<Value>) -> Self {
        Self::create(to_raw(&value.into()), false)
    }

    /// A ref that neither unwraps what it is given nor wraps what it
    /// returns.
    pub fn shallow(value: impl Into<Value>) -> Self {
        Self::create(value.into(), true)
    }

    fn create(value: Value, shallow: bool) -> Self {
        let id = TargetId::new();
        Self(Rc::new(RefInner {
            id,
            value: RefCell::new(value),
            shallow,
            dep: Dep::new(id, Key::from(VALUE_KEY)),
        }))
    }

    /// Tracked read.
    pub fn get(&self) -> Value {
        runtime::track_effects(&self.0.dep, TrackOpType::Get);
        let value = self.peek();
        if self.0.shallow {
            value
        } else {
            to_reactive(value)
        }
    }

    /// Read the stored value without tracking or wrapping.
    pub fn peek(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Store a new value, notifying readers if it differs (SameValue).
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        let value = if self.0.shallow || is_shallow(&value) || is_readonly(&value) {
            value
        } else {
            to_raw(&value)
        };
        if value.same_value(&self.0.value.borrow()) {
            return;
        }
        let old = self.0.value.replace(value.clone());
        self.notify(Some(value), Some(old));
    }

    /// Notify readers without changing the value; for shallow refs whose
    /// contents were mutated in place.
    pub fn trigger(&self) {
        self.notify(Some(self.peek()), None);
    }

    fn notify(&self, new_value: Option<Value>, old_value: Option<Value>) {
        let info = TriggerInfo {
            target: self.0.id,
            op: TriggerOpType::Set,
            key: Some(Key::from(VALUE_KEY)),
            new_value,
            old_value,
        };
        runtime::trigger_effects(&self.0.dep, &info);
    }

    pub fn is_shallow(&self) -> bool {
        self.0.shallow
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of effects reading this ref.
    pub fn subscriber_count(&self) -> usize {
        self.0.dep.len()
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.0.id)
            .field("shallow", &self.0.shallow)
            .field("value", &*self.0.value.borrow())
            .finish()
    }
}

pub fn is_ref(value: &Value) -> bool {
    value.is_ref()
}

/// The inner value of a ref (tracked), or `value` itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}
