//! Operation kinds.
//!
//! Every intercepted access is classified either as a read (`track`) or a
//! write (`trigger`). The classification drives which dependency sets a
//! write has to notify.

use std::fmt;

/// Kinds of reads that create a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOpType {
    /// A property value was read.
    Get,
    /// A containment check (`key in obj`) was performed.
    Has,
    /// The key set of the object was enumerated.
    Iterate,
}

/// Kinds of writes that notify dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOpType {
    /// An existing key received a different value.
    Set,
    /// A key that did not exist was created.
    Add,
    /// An existing key was removed.
    Delete,
    /// Every entry of a collection was removed at once.
    Clear,
}

impl fmt::Display for TrackOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackOpType::Get => "get",
            TrackOpType::Has => "has",
            TrackOpType::Iterate => "iterate",
        };
        f.write_str(name)
    }
}

impl fmt::Display for TriggerOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerOpType::Set => "set",
            TriggerOpType::Add => "add",
            TriggerOpType::Delete => "delete",
            TriggerOpType::Clear => "clear",
        };
        f.write_str(name)
    }
}
