//! Observed Wrappers
//!
//! An [`Observed`] is the intercepting view over a raw object. Every read,
//! write, delete, containment check and enumeration made through it is
//! routed through the tracking engine.
//!
//! A wrapper is configured along two axes, fixed at creation:
//!
//! - **read-only**: writes and deletes are rejected with a warning but
//!   report success; nothing is tracked because nothing can change
//!   through the view.
//! - **shallow**: nested objects are returned as stored instead of being
//!   wrapped on the way out, and refs are not unwrapped.
//!
//! A read-only view created over a mutable wrapper reads *through* that
//! wrapper, so its reads are still tracked even though the view itself
//! cannot write.
//!
//! Wrappers are cheap handles. Two wrappers are equal when they view the
//! same raw object in the same way.

use std::fmt;

use super::object::RawObject;
use super::Value;

/// How a raw object is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Mutable,
    ShallowMutable,
    Readonly,
    ShallowReadonly,
}

impl WrapMode {
    pub fn is_readonly(self) -> bool {
        matches!(self, WrapMode::Readonly | WrapMode::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, WrapMode::ShallowMutable | WrapMode::ShallowReadonly)
    }
}

/// An intercepting view over a raw object.
#[derive(Clone)]
pub struct Observed {
    raw: RawObject,
    mode: WrapMode,
    /// Mode of the mutable wrapper a read-only view reads through.
    through: Option<WrapMode>,
}

impl Observed {
    pub(crate) fn raw(&self) -> &RawObject {
        &self.raw
    }

    pub fn mode(&self) -> WrapMode {
        self.mode
    }

    /// The original object behind this wrapper.
    pub fn to_raw(&self) -> RawObject {
        self.raw.clone()
    }

    /// Whether this wrapper (or the wrapper it reads through) is mutable.
    pub fn is_reactive(&self) -> bool {
        !self.mode.is_readonly() || self.through.is_some()
    }

    pub fn is_readonly(&self) -> bool {
        self.mode.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.mode.is_shallow()
    }

    /// Whether reads through this wrapper are tracked.
    pub(crate) fn tracks(&self) -> bool {
        self.is_reactive()
    }

    /// Wrap a nested value read through this wrapper.
    ///
    /// Shallow wrappers return it as stored. A read-only view over a
    /// mutable wrapper hands out read-only views over mutable wrappers, so
    /// nested reads stay tracked.
    pub(crate) fn wrap_nested(&self, value: Value) -> Value {
        match (self.mode, self.through) {
            (WrapMode::ShallowReadonly, Some(WrapMode::Mutable)) => wrap(value, WrapMode::Mutable),
            (WrapMode::ShallowMutable | WrapMode::ShallowReadonly, _) => value,
            (WrapMode::Readonly, Some(WrapMode::Mutable)) => {
                wrap(wrap(value, WrapMode::Mutable), WrapMode::Readonly)
            }
            (mode, _) => wrap(value, mode),
        }
    }

    /// A read-only view of this wrapper.
    ///
    /// Read-only wrappers are returned unchanged; mutable ones get a view
    /// that keeps tracking through them.
    pub fn readonly(&self) -> Observed {
        self.readonly_with(WrapMode::Readonly)
    }

    pub fn shallow_readonly(&self) -> Observed {
        self.readonly_with(WrapMode::ShallowReadonly)
    }

    fn readonly_with(&self, mode: WrapMode) -> Observed {
        if self.is_readonly() {
            return self.clone();
        }
        Observed {
            raw: self.raw.clone(),
            mode,
            through: Some(self.mode),
        }
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        self.raw.ptr_eq(&other.raw) && self.mode == other.mode && self.through == other.through
    }
}

impl Eq for Observed {}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("target", &self.raw.id())
            .field("kind", &self.raw.kind())
            .field("mode", &self.mode)
            .field("through", &self.through)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Creation
// ----------------------------------------------------------------------------

/// Wrap `raw` in the given mode.
pub fn observe(raw: &RawObject, mode: WrapMode) -> Observed {
    Observed {
        raw: raw.clone(),
        mode,
        through: None,
    }
}

/// Deep mutable wrapper.
pub fn reactive(raw: &RawObject) -> Observed {
    observe(raw, WrapMode::Mutable)
}

/// Mutable wrapper that does not wrap nested objects.
pub fn shallow_reactive(raw: &RawObject) -> Observed {
    observe(raw, WrapMode::ShallowMutable)
}

/// Deep read-only wrapper.
pub fn readonly(raw: &RawObject) -> Observed {
    observe(raw, WrapMode::Readonly)
}

/// Read-only wrapper that does not wrap nested objects.
pub fn shallow_readonly(raw: &RawObject) -> Observed {
    observe(raw, WrapMode::ShallowReadonly)
}

/// Wrap an object-like value the way a read through a `mode` wrapper
/// returns it. Non-objects pass through.
///
/// Mutable wrapping leaves existing wrappers alone; read-only wrapping
/// turns a mutable wrapper into a read-only view over it.
pub(crate) fn wrap(value: Value, mode: WrapMode) -> Value {
    match value {
        Value::Object(raw) => Value::Observed(observe(&raw, mode)),
        Value::Observed(observed) if mode.is_readonly() => {
            Value::Observed(observed.readonly_with(mode))
        }
        other => other,
    }
}

// ----------------------------------------------------------------------------
// Value-level queries
// ----------------------------------------------------------------------------

/// Strip an observed wrapper. Raw values are returned as they are.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Observed(observed) => Value::Object(observed.to_raw()),
        other => other.clone(),
    }
}

/// Wrap an object deeply and mutably; other values pass through.
pub fn to_reactive(value: Value) -> Value {
    wrap(value, WrapMode::Mutable)
}

/// Wrap an object deeply and read-only; other values pass through.
pub fn to_readonly(value: Value) -> Value {
    wrap(value, WrapMode::Readonly)
}

pub fn is_reactive(value: &Value) -> bool {
    value.as_observed().is_some_and(Observed::is_reactive)
}

pub fn is_readonly(value: &Value) -> bool {
    value.as_observed().is_some_and(Observed::is_readonly)
}

pub fn is_shallow(value: &Value) -> bool {
    match value {
        Value::Observed(observed) => observed.is_shallow(),
        Value::Ref(r) => r.is_shallow(),
        _ => false,
    }
}

/// Whether `value` is any kind of observed wrapper.
pub fn is_proxy(value: &Value) -> bool {
    value.as_observed().is_some()
}
