//! Lattice Observe
//!
//! This crate provides the change-tracking core of the Lattice reactive UI
//! framework. It implements:
//!
//! - Observed wrappers over plain records, arrays and maps
//! - Effects that re-run when the slots they read change
//! - Refs, computed values and effect scopes built on the same engine
//!
//! # Architecture
//!
//! - `reactive`: wrappers, effects and the tracking runtime
//! - `config`: per-thread engine configuration
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust
//! use lattice_observe::{effect, reactive, EffectOptions, Key, RawObject, Value};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let state = reactive(&RawObject::record([(Key::from("count"), Value::from(0))]));
//!
//! let seen = Rc::new(Cell::new(0.0));
//! let (s, out) = (state.clone(), seen.clone());
//! let runner = effect(
//!     move || out.set(s.get("count").as_number().unwrap_or_default()),
//!     EffectOptions::new(),
//! );
//!
//! state.set("count", 5);
//! assert_eq!(seen.get(), 5.0);
//!
//! runner.stop();
//! state.set("count", 6);
//! assert_eq!(seen.get(), 5.0);
//! ```

pub mod config;
pub mod error;
pub mod reactive;

pub use config::{configure, ReactiveConfig};
pub use error::{ObserveError, Result};
pub use reactive::{
    computed, effect, reactive, readonly, shallow_reactive, shallow_readonly, stop, Computed,
    EffectOptions, EffectRunner, EffectScope, Key, Observed, RawObject, Ref, Value,
};
