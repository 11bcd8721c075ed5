//! Effect Implementation
//!
//! An effect is a re-runnable computation. While it runs, every observed
//! read it performs subscribes it to the slot that was read; a later write
//! to one of those slots re-runs it (or hands it to its scheduler).
//!
//! # How Effects Work
//!
//! 1. `run` makes the effect the active effect and bumps the nesting
//!    depth. The depth selects one marker bit.
//!
//! 2. Every dependency set the effect belonged to after its previous run
//!    gets `was_tracked` set for that bit.
//!
//! 3. Reads during the run set `new_tracked`. A set that was not a
//!    dependency before gains the effect as a subscriber.
//!
//! 4. On exit, sets that were tracked before but not read this time lose
//!    the effect, the effect's own list is compacted, and the bit is
//!    cleared on every visited set.
//!
//! Unchanged dependencies therefore cost one bit flip each instead of an
//! unsubscribe and a resubscribe. Past the configured maximum depth the
//! markers are not used: the effect drops every dependency up front and
//! rebuilds the list from scratch.
//!
//! # Lifecycle
//!
//! `stop` is terminal. A stopped effect that is run again still executes
//! its computation but records nothing. Stopping the effect that is
//! currently running is deferred until that run returns.
//!
//! Dependency sets hold effects weakly; keep the [`EffectRunner`] (or an
//! [`EffectScope`] the effect was recorded in) alive for as long as the
//! effect should react.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::context;
use super::dep::Dep;
use super::object::TargetId;
use super::operations::{TrackOpType, TriggerOpType};
use super::scope::{self, EffectScope};
use super::{Key, Value};

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which operation a [`DebuggerEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerOp {
    Track(TrackOpType),
    Trigger(TriggerOpType),
}

/// Payload of the `on_track` / `on_trigger` debug hooks.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub effect: EffectId,
    pub target: TargetId,
    pub op: DebuggerOp,
    pub key: Option<Key>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

/// Replaces the default re-run when a dependency changes.
pub type Scheduler = Rc<dyn Fn(&ReactiveEffect)>;

/// Debug hook receiving track and trigger events.
pub type DebugHook = Rc<dyn Fn(&DebuggerEvent)>;

pub(crate) struct EffectInner {
    id: EffectId,
    computation: Rc<dyn Fn()>,
    active: Cell<bool>,
    deps: RefCell<Vec<Dep>>,
    /// Marker bit of the run in progress, 0 outside a marker run.
    run_bit: Cell<u32>,
    parent: RefCell<Option<ReactiveEffect>>,
    scheduler: Option<Scheduler>,
    allow_recurse: Cell<bool>,
    computed: Cell<bool>,
    defer_stop: Cell<bool>,
    on_stop: Option<Rc<dyn Fn()>>,
    on_track: Option<DebugHook>,
    on_trigger: Option<DebugHook>,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        for dep in self.deps.get_mut().drain(..) {
            dep.remove(self.id);
        }
    }
}

/// A handle to a re-runnable computation.
///
/// Clones share the same effect.
#[derive(Clone)]
pub struct ReactiveEffect {
    inner: Rc<EffectInner>,
}

impl ReactiveEffect {
    /// Create an effect without running it.
    pub fn new<F>(computation: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(computation, &EffectOptions::default())
    }

    /// Create an effect configured by `options` without running it.
    ///
    /// The effect is recorded into `options.scope`, or into the scope that
    /// is currently running.
    pub fn with_options<F>(computation: F, options: &EffectOptions) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: EffectId::new(),
                computation: Rc::new(computation),
                active: Cell::new(true),
                deps: RefCell::new(Vec::new()),
                run_bit: Cell::new(0),
                parent: RefCell::new(None),
                scheduler: options.scheduler.clone(),
                allow_recurse: Cell::new(options.allow_recurse),
                computed: Cell::new(false),
                defer_stop: Cell::new(false),
                on_stop: options.on_stop.clone(),
                on_track: options.on_track.clone(),
                on_trigger: options.on_trigger.clone(),
            }),
        };
        scope::record_effect_scope(&effect, options.scope.as_ref());
        effect
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &ReactiveEffect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<EffectInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<EffectInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// `false` once the effect has been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn is_computed(&self) -> bool {
        self.inner.computed.get()
    }

    /// Tag this effect as computing a derived value. Computed effects run
    /// before plain effects when a write notifies both.
    pub fn set_computed(&self, computed: bool) {
        self.inner.computed.set(computed);
    }

    pub fn allow_recurse(&self) -> bool {
        self.inner.allow_recurse.get()
    }

    pub fn set_allow_recurse(&self, allow: bool) {
        self.inner.allow_recurse.set(allow);
    }

    pub fn has_scheduler(&self) -> bool {
        self.inner.scheduler.is_some()
    }

    /// The effect that was running when this one started, while it runs.
    pub fn parent(&self) -> Option<ReactiveEffect> {
        self.inner.parent.borrow().clone()
    }

    /// Number of dependency sets this effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Run the computation, recording its reads.
    ///
    /// Does nothing if this effect is already running further up the
    /// stack. A panic in the computation propagates after the engine state
    /// has been restored.
    pub fn run(&self) {
        if !self.is_active() {
            let computation = Rc::clone(&self.inner.computation);
            computation();
            return;
        }

        let mut ancestor = context::active_effect();
        while let Some(effect) = ancestor {
            if effect.ptr_eq(self) {
                debug!(effect = ?self.id(), "skipping recursive effect run");
                return;
            }
            ancestor = effect.parent();
        }

        let _run = RunGuard::enter(self);
        let computation = Rc::clone(&self.inner.computation);
        computation();
    }

    /// Stop reacting to changes.
    ///
    /// If this effect is the one currently running, the stop takes effect
    /// when the run returns.
    pub fn stop(&self) {
        if context::is_active_effect(self) {
            debug!(effect = ?self.id(), "deferring stop of running effect");
            self.inner.defer_stop.set(true);
        } else if self.is_active() {
            self.cleanup();
            if let Some(on_stop) = &self.inner.on_stop {
                on_stop();
            }
            self.inner.active.set(false);
            debug!(effect = ?self.id(), "effect stopped");
        }
    }

    /// Leave every dependency set. Mid-run, also clears the run's markers
    /// so the sets do not carry them into later runs of other effects.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.inner.deps.borrow_mut());
        let bit = self.inner.run_bit.get();
        for dep in &deps {
            if bit != 0 {
                dep.clear_markers(bit);
            }
            dep.remove(self.id());
        }
    }

    fn init_dep_markers(&self, bit: u32) {
        for dep in self.inner.deps.borrow().iter() {
            dep.mark_was_tracked(bit);
        }
    }

    fn finalize_dep_markers(&self, bit: u32) {
        let id = self.id();
        let mut stale = Vec::new();
        self.inner.deps.borrow_mut().retain(|dep| {
            let keep = !(dep.was_tracked(bit) && !dep.new_tracked(bit));
            dep.clear_markers(bit);
            if !keep {
                stale.push(dep.clone());
            }
            keep
        });
        for dep in stale {
            dep.remove(id);
        }
    }

    pub(crate) fn push_dep(&self, dep: Dep) {
        self.inner.deps.borrow_mut().push(dep);
    }

    pub(crate) fn fire_on_track(&self, event: impl FnOnce() -> DebuggerEvent) {
        if let Some(hook) = &self.inner.on_track {
            hook(&event());
        }
    }

    pub(crate) fn fire_on_trigger(&self, event: impl FnOnce() -> DebuggerEvent) {
        if let Some(hook) = &self.inner.on_trigger {
            hook(&event());
        }
    }

    pub(crate) fn schedule(&self) {
        match &self.inner.scheduler {
            Some(scheduler) => {
                let scheduler = Rc::clone(scheduler);
                scheduler(self);
            }
            None => self.run(),
        }
    }
}

/// Engine state entered by one effect run, restored on drop.
struct RunGuard {
    effect: ReactiveEffect,
    last_should_track: bool,
    bit: u32,
    uses_markers: bool,
}

impl RunGuard {
    fn enter(effect: &ReactiveEffect) -> Self {
        let previous = context::replace_active_effect(Some(effect.clone()));
        *effect.inner.parent.borrow_mut() = previous;
        let last_should_track = context::replace_should_track(true);

        let depth = context::enter_depth();
        let bit = context::marker_bit(depth);
        let uses_markers = depth <= context::max_marker_bits();
        if uses_markers {
            effect.inner.run_bit.set(bit);
            effect.init_dep_markers(bit);
        } else {
            debug!(effect = ?effect.id(), depth, "nesting too deep for markers, full cleanup");
            effect.cleanup();
        }

        Self {
            effect: effect.clone(),
            last_should_track,
            bit,
            uses_markers,
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let effect = &self.effect;
        if self.uses_markers {
            effect.finalize_dep_markers(self.bit);
            effect.inner.run_bit.set(0);
        }
        context::exit_depth();

        let parent = effect.inner.parent.borrow_mut().take();
        let finished = context::replace_active_effect(parent);
        context::replace_should_track(self.last_should_track);
        drop(finished);

        if effect.inner.defer_stop.replace(false) {
            effect.stop();
        }
    }
}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("computed", &self.is_computed())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// effect() entry point
// ----------------------------------------------------------------------------

/// Options recognised by [`effect`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    lazy: bool,
    scheduler: Option<Scheduler>,
    scope: Option<EffectScope>,
    allow_recurse: bool,
    on_stop: Option<Rc<dyn Fn()>>,
    on_track: Option<DebugHook>,
    on_trigger: Option<DebugHook>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer the first run until the runner is invoked.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Hand re-runs to `scheduler` instead of running immediately.
    pub fn scheduler(mut self, scheduler: impl Fn(&ReactiveEffect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Record the effect into `scope` so stopping the scope stops it.
    pub fn scope(mut self, scope: &EffectScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    /// Let the effect be re-triggered by its own writes.
    pub fn allow_recurse(mut self, allow: bool) -> Self {
        self.allow_recurse = allow;
        self
    }

    pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(hook));
        self
    }

    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }
}

/// Handle returned by [`effect`].
///
/// Dropping the last runner (and every scope the effect was recorded in)
/// releases the effect.
#[derive(Clone, Debug)]
pub struct EffectRunner {
    effect: ReactiveEffect,
}

impl EffectRunner {
    /// Force a run.
    pub fn run(&self) {
        self.effect.run();
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.effect
    }
}

/// Create an effect and, unless `options` say it is lazy, run it once.
pub fn effect<F>(computation: F, options: EffectOptions) -> EffectRunner
where
    F: Fn() + 'static,
{
    let effect = ReactiveEffect::with_options(computation, &options);
    if !options.lazy {
        effect.run();
    }
    EffectRunner { effect }
}

/// Stop the effect behind `runner`.
pub fn stop(runner: &EffectRunner) {
    runner.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{reactive, RawObject};

    fn counter_record() -> crate::reactive::Observed {
        reactive(&RawObject::record([(Key::from("count"), Value::from(0))]))
    }

    #[test]
    fn effect_runs_on_creation() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let _runner = effect(move || r.set(r.get() + 1), EffectOptions::new());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn lazy_effect_waits_for_runner() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let runner = effect(move || r.set(r.get() + 1), EffectOptions::new().lazy(true));
        assert_eq!(runs.get(), 0);

        runner.run();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn run_restores_context_after_panic() {
        let state = counter_record();
        let s = state.clone();
        let effect = ReactiveEffect::new(move || {
            s.get(&Key::from("count"));
            panic!("computation failed");
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| effect.run()));
        assert!(result.is_err());
        assert!(context::active_effect().is_none());
        assert_eq!(context::effect_depth(), 0);
        assert!(context::should_track());
        // the read before the panic was still recorded
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn stopped_effect_runs_without_tracking() {
        let state = counter_record();
        let runs = Rc::new(Cell::new(0));
        let (s, r) = (state.clone(), runs.clone());
        let runner = effect(
            move || {
                s.get(&Key::from("count"));
                r.set(r.get() + 1);
            },
            EffectOptions::new(),
        );
        runner.stop();
        assert!(!runner.effect().is_active());
        assert_eq!(runner.effect().dependency_count(), 0);

        runner.run();
        assert_eq!(runs.get(), 2);
        assert_eq!(runner.effect().dependency_count(), 0);

        state.set(Key::from("count"), Value::from(1));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn parent_stopped_by_nested_effect_stops_tracking() {
        let state = reactive(&RawObject::record([
            (Key::from("a"), Value::from(1)),
            (Key::from("b"), Value::from(2)),
        ]));
        let raw = state.to_raw();
        let outer_slot: Rc<RefCell<Option<ReactiveEffect>>> = Rc::new(RefCell::new(None));

        let sl = outer_slot.clone();
        let inner = ReactiveEffect::new(move || {
            let outer = sl.borrow().clone();
            if let Some(outer) = outer {
                outer.stop();
            }
        });
        let (s, i) = (state.clone(), inner.clone());
        let outer = ReactiveEffect::new(move || {
            s.get("a");
            i.run();
            s.get("b");
        });
        *outer_slot.borrow_mut() = Some(outer.clone());

        outer.run();
        assert!(!outer.is_active());
        assert_eq!(outer.dependency_count(), 0);
        assert_eq!(crate::reactive::subscriber_count(&raw, &Key::from("a")), 0);
        assert_eq!(crate::reactive::subscriber_count(&raw, &Key::from("b")), 0);

        // the run's markers were cleared along with its subscriptions
        let s = state.clone();
        let follower = ReactiveEffect::new(move || drop(s.get("a")));
        follower.run();
        assert_eq!(crate::reactive::subscriber_count(&raw, &Key::from("a")), 1);
        outer_slot.borrow_mut().take();
    }

    #[test]
    fn stop_hook_fires_once() {
        let stops = Rc::new(Cell::new(0));
        let s = stops.clone();
        let runner = effect(|| {}, EffectOptions::new().on_stop(move || s.set(s.get() + 1)));
        runner.stop();
        runner.stop();
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn recursive_run_is_skipped() {
        let runs = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<ReactiveEffect>>> = Rc::new(RefCell::new(None));
        let (r, sl) = (runs.clone(), slot.clone());
        let effect = ReactiveEffect::new(move || {
            r.set(r.get() + 1);
            let this = sl.borrow().clone();
            if let Some(this) = this {
                this.run();
            }
        });
        *slot.borrow_mut() = Some(effect.clone());

        effect.run();
        assert_eq!(runs.get(), 1);
        slot.borrow_mut().take();
    }

    #[test]
    fn parent_is_set_only_while_running() {
        let outer_seen = Rc::new(RefCell::new(None));
        let seen = outer_seen.clone();
        let inner = ReactiveEffect::new(move || {
            let parent = context::active_effect().and_then(|active| active.parent());
            *seen.borrow_mut() = parent.map(|p| p.id());
        });
        let inner_clone = inner.clone();
        let outer = ReactiveEffect::new(move || inner_clone.run());

        outer.run();
        assert_eq!(*outer_seen.borrow(), Some(outer.id()));
        assert!(inner.parent().is_none());
    }

    #[test]
    fn dropping_the_runner_unsubscribes() {
        let state = counter_record();
        let s = state.clone();
        let runner = effect(move || drop(s.get(&Key::from("count"))), EffectOptions::new());
        assert_eq!(crate::reactive::subscriber_count(&state.to_raw(), &Key::from("count")), 1);

        drop(runner);
        assert_eq!(crate::reactive::subscriber_count(&state.to_raw(), &Key::from("count")), 0);
    }
}
