//! Dependency Sets
//!
//! A `Dep` is the set of effects subscribed to one observed slot. Effects
//! are held weakly: a dependency set never keeps an effect alive.
//!
//! Each set also carries two bitmasks used while an effect re-runs:
//!
//! - `was_tracked`: the set was a dependency before the current run at a
//!   given nesting depth.
//! - `new_tracked`: the set has been read during the current run at that
//!   depth.
//!
//! Each nesting depth owns one bit, so nested runs do not disturb each
//! other's markers. At the end of a run, a set marked `was_tracked` but
//! not `new_tracked` is stale and the effect leaves it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::effect::{EffectId, EffectInner, ReactiveEffect};
use super::object::TargetId;
use super::runtime;
use super::Key;

struct DepInner {
    target: TargetId,
    key: Key,
    subscribers: RefCell<IndexMap<EffectId, Weak<EffectInner>>>,
    was_tracked: Cell<u32>,
    new_tracked: Cell<u32>,
}

/// The subscribers of one `(target, key)` slot.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

impl Dep {
    pub(crate) fn new(target: TargetId, key: Key) -> Self {
        Self(Rc::new(DepInner {
            target,
            key,
            subscribers: RefCell::new(IndexMap::new()),
            was_tracked: Cell::new(0),
            new_tracked: Cell::new(0),
        }))
    }

    pub fn target(&self) -> TargetId {
        self.0.target
    }

    pub fn key(&self) -> &Key {
        &self.0.key
    }

    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.subscribers.borrow().is_empty()
    }

    pub fn contains(&self, effect: EffectId) -> bool {
        self.0.subscribers.borrow().contains_key(&effect)
    }

    pub(crate) fn add(&self, effect: &ReactiveEffect) {
        self.0
            .subscribers
            .borrow_mut()
            .insert(effect.id(), effect.downgrade());
    }

    /// Unsubscribe an effect. A set left empty is released from the
    /// global dependency map.
    pub(crate) fn remove(&self, effect: EffectId) {
        let now_empty = {
            let mut subscribers = self.0.subscribers.borrow_mut();
            subscribers.shift_remove(&effect);
            subscribers.is_empty()
        };
        if now_empty {
            runtime::release_dep(self);
        }
    }

    /// Live subscribers in subscription order.
    pub(crate) fn effects(&self) -> Vec<ReactiveEffect> {
        self.0
            .subscribers
            .borrow()
            .values()
            .filter_map(ReactiveEffect::upgrade)
            .collect()
    }

    pub fn was_tracked(&self, bit: u32) -> bool {
        self.0.was_tracked.get() & bit != 0
    }

    pub fn new_tracked(&self, bit: u32) -> bool {
        self.0.new_tracked.get() & bit != 0
    }

    pub(crate) fn mark_was_tracked(&self, bit: u32) {
        self.0.was_tracked.set(self.0.was_tracked.get() | bit);
    }

    pub(crate) fn mark_new_tracked(&self, bit: u32) {
        self.0.new_tracked.set(self.0.new_tracked.get() | bit);
    }

    pub(crate) fn clear_markers(&self, bit: u32) {
        self.0.was_tracked.set(self.0.was_tracked.get() & !bit);
        self.0.new_tracked.set(self.0.new_tracked.get() & !bit);
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("target", &self.0.target)
            .field("key", &self.0.key)
            .field("subscribers", &self.len())
            .field("was_tracked", &format_args!("{:#b}", self.0.was_tracked.get()))
            .field("new_tracked", &format_args!("{:#b}", self.0.new_tracked.get()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_per_bit() {
        let dep = Dep::new(TargetId::new(), Key::from("a"));
        dep.mark_was_tracked(0b10);
        dep.mark_new_tracked(0b100);

        assert!(dep.was_tracked(0b10));
        assert!(!dep.was_tracked(0b100));
        assert!(dep.new_tracked(0b100));

        dep.clear_markers(0b10);
        assert!(!dep.was_tracked(0b10));
        assert!(dep.new_tracked(0b100));
    }

    #[test]
    fn holds_effects_weakly() {
        let dep = Dep::new(TargetId::new(), Key::from("a"));
        let effect = ReactiveEffect::new(|| {});
        dep.add(&effect);
        assert_eq!(dep.effects().len(), 1);

        drop(effect);
        assert!(dep.effects().is_empty());
    }
}
