//! Computed Values
//!
//! A computed value caches the result of a getter and recomputes lazily.
//!
//! # How It Works
//!
//! The getter runs inside an effect tagged as computed. When one of its
//! dependencies changes, the effect's scheduler does not recompute; it only
//! marks the cache dirty and notifies whoever read the computed value. The
//! next `get` recomputes.
//!
//! Because computed effects run before plain effects within a trigger, a
//! plain effect that reads both a source and a computed value derived from
//! it always sees the computed value already marked dirty.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::dep::Dep;
use super::effect::{EffectOptions, ReactiveEffect};
use super::object::TargetId;
use super::operations::{TrackOpType, TriggerOpType};
use super::runtime::{self, TriggerInfo};
use super::Key;

struct ComputedInner<T> {
    id: TargetId,
    getter: Rc<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    dep: Dep,
    effect: ReactiveEffect,
}

impl<T> ComputedInner<T> {
    fn invalidate(&self) {
        if self.dirty.replace(true) {
            return;
        }
        let info = TriggerInfo {
            target: self.id,
            op: TriggerOpType::Set,
            key: Some(Key::from("value")),
            new_value: None,
            old_value: None,
        };
        runtime::trigger_effects(&self.dep, &info);
    }
}

/// A lazily evaluated, cached derived value.
///
/// Clones share the same cache.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed value. The getter first runs on the first `get`.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let id = TargetId::new();
        let getter: Rc<dyn Fn() -> T> = Rc::new(getter);
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let for_run = weak.clone();
            let for_schedule = weak.clone();
            let options = EffectOptions::new().lazy(true).scheduler(move |_| {
                if let Some(inner) = for_schedule.upgrade() {
                    inner.invalidate();
                }
            });
            let effect = ReactiveEffect::with_options(
                move || {
                    if let Some(inner) = for_run.upgrade() {
                        let value = (inner.getter)();
                        *inner.value.borrow_mut() = Some(value);
                    }
                },
                &options,
            );
            effect.set_computed(true);

            ComputedInner {
                id,
                getter,
                value: RefCell::new(None),
                dirty: Cell::new(true),
                dep: Dep::new(id, Key::from("value")),
                effect,
            }
        });
        Self { inner }
    }

    /// Tracked read, recomputing first if a dependency changed.
    pub fn get(&self) -> T {
        runtime::track_effects(&self.inner.dep, TrackOpType::Get);
        if self.inner.dirty.replace(false) {
            self.inner.effect.run();
        }
        let cached = self.inner.value.borrow().clone();
        match cached {
            Some(value) => value,
            // the effect was skipped (read from inside its own getter)
            None => (self.inner.getter)(),
        }
    }

    /// Whether the next `get` will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// The effect running the getter.
    pub fn effect(&self) -> &ReactiveEffect {
        &self.inner.effect
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.inner.dirty.get())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// Shorthand for [`Computed::new`].
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, reactive, Observed, RawObject, Value};

    fn counter() -> Observed {
        reactive(&RawObject::record([(Key::from("count"), Value::from(1))]))
    }

    fn count_of(state: &Observed) -> f64 {
        state.get("count").as_number().unwrap_or_default()
    }

    #[test]
    fn computes_lazily_and_caches() {
        let state = counter();
        let calls = Rc::new(Cell::new(0));
        let (s, c) = (state.clone(), calls.clone());
        let doubled = computed(move || {
            c.set(c.get() + 1);
            count_of(&s) * 2.0
        });
        assert_eq!(calls.get(), 0);

        assert_eq!(doubled.get(), 2.0);
        assert_eq!(doubled.get(), 2.0);
        assert_eq!(calls.get(), 1);

        state.set("count", 5);
        assert!(doubled.is_dirty());
        assert_eq!(calls.get(), 1);
        assert_eq!(doubled.get(), 10.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn effects_reading_a_computed_rerun() {
        let state = counter();
        let s = state.clone();
        let doubled = computed(move || count_of(&s) * 2.0);
        let seen = Rc::new(Cell::new(0.0));
        let (d, sn) = (doubled.clone(), seen.clone());
        let _runner = effect(move || sn.set(d.get()), EffectOptions::new());
        assert_eq!(seen.get(), 2.0);

        state.set("count", 3);
        assert_eq!(seen.get(), 6.0);
    }

    #[test]
    fn chained_computeds_settle() {
        let state = counter();
        let s = state.clone();
        let doubled = computed(move || count_of(&s) * 2.0);
        let d = doubled.clone();
        let plus_one = computed(move || d.get() + 1.0);

        assert_eq!(plus_one.get(), 3.0);
        state.set("count", 10);
        assert_eq!(plus_one.get(), 21.0);
    }

    #[test]
    fn computed_effect_is_tagged() {
        let c = computed(|| 1);
        assert!(c.effect().is_computed());
    }
}
