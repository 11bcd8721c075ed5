//! Error types.
//!
//! The tracking engine itself never fails: rejected read-only writes are
//! reported through `tracing` and effect panics propagate unchanged. The
//! fallible edges are configuration loading and converting value graphs to
//! JSON.

use crate::reactive::TargetId;

/// Errors raised by configuration and value conversion.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    #[error("max_marker_bits must be at most {max}, got {got}")]
    InvalidMaxMarkerBits { got: u32, max: u32 },

    #[error("invalid configuration document: {0}")]
    Config(#[from] serde_json::Error),

    #[error("value graph contains a cycle through target {0}")]
    Cycle(TargetId),
}

pub type Result<T> = std::result::Result<T, ObserveError>;
