//! Execution Context
//!
//! The execution context answers "which effect is running right now" and
//! "should reads be recorded at all". It also carries the nesting depth
//! used to derive the per-run marker bit, the active effect scope, and the
//! thread's configuration.
//!
//! # Implementation
//!
//! The state lives in a thread-local cell. Each thread therefore has an
//! independent engine and no synchronization is needed. Every mutation
//! that must be undone on exit is paired with an RAII guard so the state
//! is restored even when an effect body panics.
//!
//! No borrow of the cell is ever held while user code runs: values are
//! swapped in and out and dropped after the borrow ends.

use std::cell::RefCell;

use crate::config::ReactiveConfig;

use super::effect::ReactiveEffect;
use super::scope::EffectScope;

thread_local! {
    static CONTEXT: RefCell<ContextState> = RefCell::new(ContextState::default());
}

struct ContextState {
    /// The effect whose computation is currently executing.
    active_effect: Option<ReactiveEffect>,
    /// Whether reads are currently recorded.
    should_track: bool,
    /// Saved `should_track` values for nested pause/enable calls.
    track_stack: Vec<bool>,
    /// Number of effect runs currently on the stack.
    depth: u32,
    /// The scope that newly created effects are recorded into.
    active_scope: Option<EffectScope>,
    config: ReactiveConfig,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            active_effect: None,
            should_track: true,
            track_stack: Vec::new(),
            depth: 0,
            active_scope: None,
            config: ReactiveConfig::default(),
        }
    }
}

fn with<R>(f: impl FnOnce(&mut ContextState) -> R) -> R {
    CONTEXT.with(|cell| f(&mut cell.borrow_mut()))
}

// ----------------------------------------------------------------------------
// Active effect
// ----------------------------------------------------------------------------

/// The effect currently executing, if any.
pub fn active_effect() -> Option<ReactiveEffect> {
    with(|state| state.active_effect.clone())
}

pub(crate) fn is_active_effect(effect: &ReactiveEffect) -> bool {
    with(|state| {
        state
            .active_effect
            .as_ref()
            .is_some_and(|active| active.ptr_eq(effect))
    })
}

pub(crate) fn replace_active_effect(effect: Option<ReactiveEffect>) -> Option<ReactiveEffect> {
    with(|state| std::mem::replace(&mut state.active_effect, effect))
}

// ----------------------------------------------------------------------------
// Tracking flag
// ----------------------------------------------------------------------------

/// Whether a read right now would be recorded.
pub fn is_tracking() -> bool {
    with(|state| state.should_track && state.active_effect.is_some())
}

pub(crate) fn should_track() -> bool {
    with(|state| state.should_track)
}

pub(crate) fn replace_should_track(value: bool) -> bool {
    with(|state| std::mem::replace(&mut state.should_track, value))
}

/// Suspend tracking until the matching [`reset_tracking`].
pub fn pause_tracking() {
    with(|state| {
        let previous = state.should_track;
        state.track_stack.push(previous);
        state.should_track = false;
    });
}

/// Force tracking on until the matching [`reset_tracking`].
pub fn enable_tracking() {
    with(|state| {
        let previous = state.should_track;
        state.track_stack.push(previous);
        state.should_track = true;
    });
}

/// Restore the tracking flag saved by the last pause or enable.
///
/// An unbalanced reset turns tracking back on.
pub fn reset_tracking() {
    with(|state| {
        state.should_track = state.track_stack.pop().unwrap_or(true);
    });
}

/// Guard that pauses tracking and resets it when dropped.
///
/// Bulk mutations use this so their internal reads are not recorded.
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct TrackingGuard {
    _private: (),
}

impl TrackingGuard {
    pub fn pause() -> Self {
        pause_tracking();
        Self { _private: () }
    }
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        reset_tracking();
    }
}

/// Run `f` with tracking paused.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = TrackingGuard::pause();
    f()
}

// ----------------------------------------------------------------------------
// Depth counter and marker bit
// ----------------------------------------------------------------------------

/// Marker bit for a nesting depth. Depths past the `u32` width get no bit.
pub(crate) fn marker_bit(depth: u32) -> u32 {
    1u32.checked_shl(depth).unwrap_or(0)
}

/// Enter one more level of effect nesting and return the new depth.
pub(crate) fn enter_depth() -> u32 {
    with(|state| {
        state.depth += 1;
        state.depth
    })
}

pub(crate) fn exit_depth() {
    with(|state| state.depth = state.depth.saturating_sub(1));
}

/// Current depth, its marker bit, and whether that depth uses markers.
pub(crate) fn marker_state() -> (u32, bool) {
    with(|state| {
        let depth = state.depth;
        (marker_bit(depth), depth <= state.config.max_marker_bits)
    })
}

/// Number of effect runs currently nested on this thread.
pub fn effect_depth() -> u32 {
    with(|state| state.depth)
}

// ----------------------------------------------------------------------------
// Scope and configuration
// ----------------------------------------------------------------------------

pub(crate) fn active_scope() -> Option<EffectScope> {
    with(|state| state.active_scope.clone())
}

pub(crate) fn replace_active_scope(scope: Option<EffectScope>) -> Option<EffectScope> {
    with(|state| std::mem::replace(&mut state.active_scope, scope))
}

pub(crate) fn config() -> ReactiveConfig {
    with(|state| state.config.clone())
}

pub(crate) fn set_config(config: ReactiveConfig) {
    with(|state| state.config = config);
}

pub(crate) fn max_marker_bits() -> u32 {
    with(|state| state.config.max_marker_bits)
}

pub(crate) fn warn_on_readonly_mutation() -> bool {
    with(|state| state.config.warn_on_readonly_mutation)
}
