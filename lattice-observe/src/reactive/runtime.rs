//! Tracking Runtime
//!
//! The runtime owns the global dependency map and implements the two entry
//! points of the engine: `track` records that the running effect read a
//! slot, `trigger` finds and re-runs the effects that read a slot that has
//! just been written.
//!
//! # How It Works
//!
//! 1. The dependency map is keyed first by [`TargetId`], then by [`Key`].
//!    Entries are created lazily on the first tracked read.
//!
//! 2. `track` looks up (or creates) the slot's [`Dep`] and subscribes the
//!    active effect using the marker bits of the current nesting depth.
//!
//! 3. `trigger` selects the dependency sets a write affects, merges their
//!    subscribers without duplicates, and runs computed effects before
//!    plain ones so derived values settle before side effects observe
//!    them.
//!
//! # Reclamation
//!
//! A dependency set leaves the map as soon as its last subscriber leaves.
//! A target's entry is released when its raw object is dropped.

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::trace;

use super::context;
use super::dep::Dep;
use super::effect::{DebuggerEvent, DebuggerOp, EffectId, ReactiveEffect};
use super::object::{RawObject, TargetId};
use super::operations::{TrackOpType, TriggerOpType};
use super::{Key, Value};

type KeyToDepMap = IndexMap<Key, Dep>;

thread_local! {
    static TARGET_MAP: RefCell<HashMap<TargetId, KeyToDepMap>> = RefCell::new(HashMap::new());
}

/// Describes the write that caused a trigger; feeds `on_trigger` hooks.
#[derive(Debug, Clone)]
pub struct TriggerInfo {
    pub target: TargetId,
    pub op: TriggerOpType,
    pub key: Option<Key>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

impl TriggerInfo {
    fn event_for(&self, effect: EffectId) -> DebuggerEvent {
        DebuggerEvent {
            effect,
            target: self.target,
            op: DebuggerOp::Trigger(self.op),
            key: self.key.clone(),
            new_value: self.new_value.clone(),
            old_value: self.old_value.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// track
// ----------------------------------------------------------------------------

/// Record that the active effect read `key` of `target`.
///
/// No-op when tracking is paused or no effect is running.
pub fn track(target: &RawObject, op: TrackOpType, key: &Key) {
    if !context::is_tracking() {
        return;
    }
    let dep = TARGET_MAP.with(|map| {
        map.borrow_mut()
            .entry(target.id())
            .or_default()
            .entry(key.clone())
            .or_insert_with(|| Dep::new(target.id(), key.clone()))
            .clone()
    });
    track_effects(&dep, op);
}

/// Subscribe the active effect to `dep`.
///
/// Within the marker depth a set is subscribed at most once per run and
/// only if it was not already a dependency. Beyond it, membership is
/// checked directly.
pub fn track_effects(dep: &Dep, op: TrackOpType) {
    if !context::should_track() {
        return;
    }
    let Some(effect) = context::active_effect() else {
        return;
    };
    // stopped mid-run by a nested effect
    if !effect.is_active() {
        return;
    }

    let (bit, uses_markers) = context::marker_state();
    let subscribe = if uses_markers {
        if dep.new_tracked(bit) {
            false
        } else {
            dep.mark_new_tracked(bit);
            !dep.was_tracked(bit)
        }
    } else {
        !dep.contains(effect.id())
    };

    if subscribe {
        trace!(effect = ?effect.id(), target_id = %dep.target(), key = %dep.key(), %op, "track");
        dep.add(&effect);
        effect.push_dep(dep.clone());
        effect.fire_on_track(|| DebuggerEvent {
            effect: effect.id(),
            target: dep.target(),
            op: DebuggerOp::Track(op),
            key: Some(dep.key().clone()),
            new_value: None,
            old_value: None,
        });
    }
}

// ----------------------------------------------------------------------------
// trigger
// ----------------------------------------------------------------------------

/// Notify the effects affected by a write to `key` of `target`.
///
/// For a write to an array's `length`, `new_value` is the new length.
pub fn trigger(
    target: &RawObject,
    op: TriggerOpType,
    key: Option<&Key>,
    new_value: Option<&Value>,
    old_value: Option<&Value>,
) {
    let deps = TARGET_MAP.with(|map| {
        let map = map.borrow();
        map.get(&target.id())
            .map(|deps| select_deps(target, deps, op, key, new_value))
    });
    let Some(deps) = deps else {
        return;
    };
    if deps.is_empty() {
        return;
    }

    let info = TriggerInfo {
        target: target.id(),
        op,
        key: key.cloned(),
        new_value: new_value.cloned(),
        old_value: old_value.cloned(),
    };

    let mut seen = IndexSet::new();
    let mut effects = Vec::new();
    for dep in &deps {
        for effect in dep.effects() {
            if seen.insert(effect.id()) {
                effects.push(effect);
            }
        }
    }
    trace!(target_id = %info.target, %op, key = ?info.key, effects = effects.len(), "trigger");
    run_effects(&effects, &info);
}

/// The dependency sets a write affects.
fn select_deps(
    target: &RawObject,
    deps: &KeyToDepMap,
    op: TriggerOpType,
    key: Option<&Key>,
    new_value: Option<&Value>,
) -> SmallVec<[Dep; 4]> {
    let mut selected: SmallVec<[Dep; 4]> = SmallVec::new();
    let is_array = target.is_array();

    if op == TriggerOpType::Clear {
        selected.extend(deps.values().cloned());
        return selected;
    }

    if is_array && key.is_some_and(Key::is_length) {
        let new_length = new_value.and_then(Value::as_number).unwrap_or(f64::NAN);
        for (dep_key, dep) in deps {
            let truncated = dep_key
                .as_index()
                .is_some_and(|index| index as f64 >= new_length);
            if dep_key.is_length() || truncated {
                selected.push(dep.clone());
            }
        }
        return selected;
    }

    let mut push = |key: &Key| {
        if let Some(dep) = deps.get(key) {
            selected.push(dep.clone());
        }
    };

    if let Some(key) = key {
        push(key);
    }
    match op {
        TriggerOpType::Add => {
            if !is_array {
                push(&Key::Iterate);
                if target.is_map() {
                    push(&Key::MapKeyIterate);
                }
            } else if key.is_some_and(Key::is_integer) {
                push(&Key::length());
            }
        }
        TriggerOpType::Delete => {
            if !is_array {
                push(&Key::Iterate);
                if target.is_map() {
                    push(&Key::MapKeyIterate);
                }
            }
        }
        TriggerOpType::Set => {
            if target.is_map() {
                push(&Key::Iterate);
            }
        }
        TriggerOpType::Clear => {}
    }
    selected
}

/// Notify every subscriber of a single dependency set, such as a ref's.
pub fn trigger_effects(dep: &Dep, info: &TriggerInfo) {
    let effects = dep.effects();
    run_effects(&effects, info);
}

fn run_effects(effects: &[ReactiveEffect], info: &TriggerInfo) {
    for effect in effects.iter().filter(|effect| effect.is_computed()) {
        trigger_effect(effect, info);
    }
    for effect in effects.iter().filter(|effect| !effect.is_computed()) {
        trigger_effect(effect, info);
    }
}

fn trigger_effect(effect: &ReactiveEffect, info: &TriggerInfo) {
    // stopped by an earlier effect of the same trigger
    if !effect.is_active() {
        return;
    }
    if context::is_active_effect(effect) && !effect.allow_recurse() {
        return;
    }
    effect.fire_on_trigger(|| info.event_for(effect.id()));
    effect.schedule();
}

// ----------------------------------------------------------------------------
// Reclamation and introspection
// ----------------------------------------------------------------------------

/// Drop a dependency set from the map once it has no subscribers.
pub(crate) fn release_dep(dep: &Dep) {
    let _ = TARGET_MAP.try_with(|map| {
        let Ok(mut map) = map.try_borrow_mut() else {
            return;
        };
        let Some(deps) = map.get_mut(&dep.target()) else {
            return;
        };
        if deps.get(dep.key()).is_some_and(|current| current.ptr_eq(dep)) {
            deps.shift_remove(dep.key());
        }
        if deps.is_empty() {
            map.remove(&dep.target());
        }
    });
}

/// Forget every dependency set of a target whose raw object was dropped.
pub(crate) fn release_target(target: TargetId) {
    let removed = TARGET_MAP
        .try_with(|map| {
            map.try_borrow_mut()
                .ok()
                .and_then(|mut map| map.remove(&target))
        })
        .ok()
        .flatten();
    if removed.is_some() {
        trace!(target_id = %target, "released dependency map entry");
    }
}

/// Number of tracked slots of `target`.
pub fn dep_count(target: &RawObject) -> usize {
    TARGET_MAP.with(|map| map.borrow().get(&target.id()).map_or(0, IndexMap::len))
}

/// Number of effects subscribed to `key` of `target`.
pub fn subscriber_count(target: &RawObject, key: &Key) -> usize {
    TARGET_MAP.with(|map| {
        map.borrow()
            .get(&target.id())
            .and_then(|deps| deps.get(key))
            .map_or(0, Dep::len)
    })
}

/// Number of targets with at least one tracked slot on this thread.
pub fn tracked_target_count() -> usize {
    TARGET_MAP.with(|map| map.borrow().len())
}
