//! Property keys.
//!
//! A key names one slot of an observed object. Besides ordinary names and
//! array indices there are two reserved sentinels that stand for "the key
//! set of this object", plus the built-in symbols and internal flags that
//! the read trap answers without tracking.

use std::fmt;
use std::rc::Rc;

/// Internal identity-query keys understood by the read trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactiveFlag {
    IsReactive,
    IsReadonly,
    IsShallow,
    Raw,
}

/// Built-in well-known symbols. Reads of these are never tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    Iterator,
    AsyncIterator,
    HasInstance,
    ToPrimitive,
    ToStringTag,
    Unscopables,
}

/// Largest array index: `2^32 - 2`. Larger integers are plain names.
pub const MAX_ARRAY_INDEX: usize = u32::MAX as usize - 1;

/// Names that are read internally by the runtime and never tracked.
const NON_TRACKABLE_NAMES: [&str; 3] = ["__proto__", "__v_isRef", "__isVue"];

/// A property key of an observed object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A string property name.
    Name(Rc<str>),
    /// A canonical non-negative integer key.
    Index(usize),
    /// Sentinel slot for generic key-set enumeration.
    Iterate,
    /// Sentinel slot for enumerating the keys of a map-like target.
    MapKeyIterate,
    /// A built-in well-known symbol.
    Symbol(WellKnownSymbol),
    /// An internal identity query.
    Flag(ReactiveFlag),
}

impl Key {
    /// The array length slot.
    pub fn length() -> Self {
        Key::Name(Rc::from("length"))
    }

    /// Parse a string key, normalising canonical integers to [`Key::Index`].
    ///
    /// `"7"` becomes `Index(7)`; `"07"`, `"-1"`, `"1.5"` and anything above
    /// [`MAX_ARRAY_INDEX`] stay names.
    pub fn parse(name: &str) -> Self {
        match Self::canonical_index(name) {
            Some(index) => Key::Index(index),
            None => Key::Name(Rc::from(name)),
        }
    }

    fn canonical_index(name: &str) -> Option<usize> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if name.len() > 1 && name.starts_with('0') {
            return None;
        }
        name.parse().ok().filter(|index| *index <= MAX_ARRAY_INDEX)
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == "length")
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Key::Index(_))
    }

    /// Whether reads of this key bypass dependency tracking.
    pub fn is_untracked(&self) -> bool {
        match self {
            Key::Symbol(_) | Key::Flag(_) => true,
            Key::Name(name) => NON_TRACKABLE_NAMES.contains(&&**name),
            _ => false,
        }
    }

    /// Whether this key can hold data (sentinels and flags cannot).
    pub fn is_data(&self) -> bool {
        matches!(self, Key::Name(_) | Key::Index(_) | Key::Symbol(_))
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::parse(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::parse(&name)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        if index <= MAX_ARRAY_INDEX {
            Key::Index(index)
        } else {
            Key::Name(Rc::from(index.to_string()))
        }
    }
}

impl From<i32> for Key {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => Key::Index(index),
            Err(_) => Key::Name(Rc::from(index.to_string())),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::MapKeyIterate => f.write_str("<map-key-iterate>"),
            Key::Symbol(symbol) => write!(f, "Symbol({symbol:?})"),
            Key::Flag(flag) => write!(f, "<{flag:?}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_strings_become_indices() {
        assert_eq!(Key::parse("0"), Key::Index(0));
        assert_eq!(Key::parse("42"), Key::Index(42));
        assert_eq!(Key::from("length"), Key::length());
    }

    #[test]
    fn non_canonical_integers_stay_names() {
        for name in ["007", "-1", "1.5", "", "NaN", "1e3"] {
            assert!(matches!(Key::parse(name), Key::Name(_)), "{name}");
        }
    }

    #[test]
    fn integers_past_the_index_range_are_names() {
        assert_eq!(Key::parse("4294967294"), Key::Index(MAX_ARRAY_INDEX));
        assert!(matches!(Key::parse("4294967295"), Key::Name(_)));
        assert!(matches!(Key::parse("18446744073709551616"), Key::Name(_)));
        assert_eq!(Key::from(usize::MAX), Key::parse(&usize::MAX.to_string()));
        assert!(!Key::from(usize::MAX).is_integer());
    }

    #[test]
    fn internal_keys_are_untracked() {
        assert!(Key::from("__proto__").is_untracked());
        assert!(Key::Symbol(WellKnownSymbol::Iterator).is_untracked());
        assert!(Key::Flag(ReactiveFlag::Raw).is_untracked());
        assert!(!Key::from("name").is_untracked());
        assert!(!Key::Iterate.is_untracked());
    }
}
