//! Effect Scopes
//!
//! A scope collects the effects created while it runs (or explicitly
//! handed to it through [`EffectOptions::scope`](super::EffectOptions::scope))
//! so they can be stopped together. Scopes nest: a scope created while
//! another one runs becomes its child and is stopped with it, unless it is
//! detached.
//!
//! A scope holds its effects strongly, which also keeps them alive
//! without an [`EffectRunner`](super::EffectRunner).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use super::context;
use super::effect::ReactiveEffect;

struct ScopeInner {
    active: Cell<bool>,
    detached: bool,
    effects: RefCell<Vec<ReactiveEffect>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    scopes: RefCell<Vec<EffectScope>>,
    parent: Weak<ScopeInner>,
}

/// A group of effects stopped together.
#[derive(Clone)]
pub struct EffectScope(Rc<ScopeInner>);

impl EffectScope {
    /// Create a scope. Unless `detached`, it becomes a child of the scope
    /// that is currently running.
    pub fn new(detached: bool) -> Self {
        let parent = if detached { None } else { context::active_scope() };
        let scope = Self(Rc::new(ScopeInner {
            active: Cell::new(true),
            detached,
            effects: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            scopes: RefCell::new(Vec::new()),
            parent: parent.as_ref().map_or_else(Weak::new, |p| Rc::downgrade(&p.0)),
        }));
        if let Some(parent) = parent {
            parent.0.scopes.borrow_mut().push(scope.clone());
        }
        scope
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of effects recorded in this scope.
    pub fn effect_count(&self) -> usize {
        self.0.effects.borrow().len()
    }

    /// Run `f` with this scope as the current one. Returns `None` without
    /// running `f` if the scope was stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            debug!("cannot run an inactive effect scope");
            return None;
        }
        let _current = ScopeGuard::enter(self);
        Some(f())
    }

    /// Stop every recorded effect, run dispose callbacks, and stop child
    /// scopes.
    pub fn stop(&self) {
        if !self.0.active.replace(false) {
            return;
        }
        let effects = std::mem::take(&mut *self.0.effects.borrow_mut());
        for effect in &effects {
            effect.stop();
        }
        let cleanups = std::mem::take(&mut *self.0.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
        let scopes = std::mem::take(&mut *self.0.scopes.borrow_mut());
        for scope in &scopes {
            scope.stop();
        }
        if !self.0.detached {
            if let Some(parent) = self.0.parent.upgrade() {
                parent.scopes.borrow_mut().retain(|child| !child.ptr_eq(self));
            }
        }
        debug!(effects = effects.len(), children = scopes.len(), "effect scope stopped");
    }

    fn record(&self, effect: &ReactiveEffect) {
        self.0.effects.borrow_mut().push(effect.clone());
    }

    fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        self.0.cleanups.borrow_mut().push(cleanup);
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.is_active())
            .field("detached", &self.0.detached)
            .field("effects", &self.effect_count())
            .field("children", &self.0.scopes.borrow().len())
            .finish()
    }
}

/// Restores the previously running scope on drop.
struct ScopeGuard {
    previous: Option<EffectScope>,
}

impl ScopeGuard {
    fn enter(scope: &EffectScope) -> Self {
        Self {
            previous: context::replace_active_scope(Some(scope.clone())),
        }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        context::replace_active_scope(self.previous.take());
    }
}

/// Shorthand for [`EffectScope::new`].
pub fn effect_scope(detached: bool) -> EffectScope {
    EffectScope::new(detached)
}

/// Record `effect` into `scope`, or into the running scope.
pub(crate) fn record_effect_scope(effect: &ReactiveEffect, scope: Option<&EffectScope>) {
    let scope = scope.cloned().or_else(context::active_scope);
    if let Some(scope) = scope.filter(EffectScope::is_active) {
        scope.record(effect);
    }
}

/// The scope that is currently running.
pub fn get_current_scope() -> Option<EffectScope> {
    context::active_scope()
}

/// Register `f` to run when the current scope stops.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) {
    match context::active_scope() {
        Some(scope) => scope.add_cleanup(Box::new(f)),
        None => warn!("on_scope_dispose called without an active effect scope"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, reactive, EffectOptions, Key, RawObject, Value};
    use tracing_test::traced_test;

    #[test]
    fn stopping_a_scope_stops_its_effects() {
        let state = reactive(&RawObject::record([(Key::from("a"), Value::from(1))]));
        let runs = Rc::new(Cell::new(0));
        let scope = EffectScope::new(false);

        let (s, r) = (state.clone(), runs.clone());
        scope.run(move || {
            // no runner kept: the scope keeps the effect alive
            effect(
                move || {
                    s.get("a");
                    r.set(r.get() + 1);
                },
                EffectOptions::new(),
            );
        });
        assert_eq!(scope.effect_count(), 1);

        state.set("a", 2);
        assert_eq!(runs.get(), 2);

        scope.stop();
        state.set("a", 3);
        assert_eq!(runs.get(), 2);
        assert!(scope.run(|| ()).is_none());
    }

    #[test]
    fn explicit_scope_option_records() {
        let scope = EffectScope::new(true);
        let _runner = effect(|| {}, EffectOptions::new().scope(&scope));
        assert_eq!(scope.effect_count(), 1);
        assert!(get_current_scope().is_none());
    }

    #[test]
    fn child_scopes_stop_with_parent_unless_detached() {
        let parent = EffectScope::new(false);
        let (child, detached) = parent
            .run(|| (EffectScope::new(false), EffectScope::new(true)))
            .unwrap();

        parent.stop();
        assert!(!child.is_active());
        assert!(detached.is_active());
    }

    #[test]
    fn dispose_callbacks_run_on_stop() {
        let disposed = Rc::new(Cell::new(false));
        let scope = EffectScope::new(false);
        let d = disposed.clone();
        scope.run(|| on_scope_dispose(move || d.set(true)));
        assert!(!disposed.get());

        scope.stop();
        assert!(disposed.get());
    }

    #[test]
    fn current_scope_is_restored() {
        let outer = EffectScope::new(false);
        outer.run(|| {
            let inner = EffectScope::new(false);
            inner.run(|| assert!(get_current_scope().is_some_and(|s| s.ptr_eq(&inner))));
            assert!(get_current_scope().is_some_and(|s| s.ptr_eq(&outer)));
        });
        assert!(get_current_scope().is_none());
    }

    #[test]
    #[traced_test]
    fn dispose_outside_a_scope_warns() {
        on_scope_dispose(|| {});
        assert!(logs_contain("on_scope_dispose called without an active effect scope"));
    }
}
