//! Reactive Primitives
//!
//! This module implements fine-grained dependency tracking over plain
//! mutable objects: observed wrappers, effects, and the tracking runtime
//! that connects them.
//!
//! # Concepts
//!
//! ## Observed Wrappers
//!
//! An [`Observed`] is an intercepting view over a [`RawObject`] (a record,
//! an array or a map). Reads made through it while an effect runs are
//! recorded as dependencies of that effect; writes made through it notify
//! the effects that read the written slot.
//!
//! ## Effects
//!
//! An effect is a computation that re-runs whenever a slot it read during
//! its last run changes. Dependencies are rediscovered on every run, so
//! branches that stop reading a slot stop depending on it.
//!
//! ## Refs and Computed Values
//!
//! A [`Ref`] is a single observable slot. A [`Computed`] caches a derived
//! value and recomputes it lazily; when a write notifies both computed and
//! plain effects, computed effects run first.
//!
//! ## Scopes
//!
//! An [`EffectScope`] groups effects so they can be stopped together.
//!
//! # Implementation Notes
//!
//! All engine state is thread-local: the running effect, the tracking
//! flag, the nesting depth and the global dependency map. Values are
//! `Rc`-based, so an engine and its objects belong to one thread.

mod array;
mod collection;
mod computed;
pub(crate) mod context;
mod dep;
mod effect;
mod handlers;
mod key;
mod object;
mod observed;
mod operations;
mod reference;
mod runtime;
mod scope;
mod value;

pub use computed::{computed, Computed};
pub use context::{
    active_effect, effect_depth, enable_tracking, is_tracking, pause_tracking, reset_tracking,
    untracked, TrackingGuard,
};
pub use dep::Dep;
pub use effect::{
    effect, stop, DebugHook, DebuggerEvent, DebuggerOp, EffectId, EffectOptions, EffectRunner,
    ReactiveEffect, Scheduler,
};
pub use key::{Key, ReactiveFlag, WellKnownSymbol};
pub use object::{RawObject, TargetId, TargetKind};
pub use observed::{
    is_proxy, is_reactive, is_readonly, is_shallow, observe, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly, Observed, WrapMode,
};
pub use operations::{TrackOpType, TriggerOpType};
pub use reference::{is_ref, unref, Ref};
pub use runtime::{
    dep_count, subscriber_count, track, track_effects, tracked_target_count, trigger,
    trigger_effects, TriggerInfo,
};
pub use scope::{effect_scope, get_current_scope, on_scope_dispose, EffectScope};
pub use value::Value;
